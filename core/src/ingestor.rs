use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::errors::IngestionError;
use crate::sink::Sink;
use crate::source::{RawRecord, Source};
use crate::telemetry::RunMetrics;
use crate::transform::Transformer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Reading,
    Transforming,
    Writing,
    Completed,
    Failed,
    Cancelled,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::Failed | PipelineState::Cancelled
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Reading => "reading",
            PipelineState::Transforming => "transforming",
            PipelineState::Writing => "writing",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
            PipelineState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Stops a run before its next read. A chunk already being written is not interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a single `run_once` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub records_written: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub dataset: String,
    pub state: PipelineState,
    pub records_read: usize,
    pub records_written: usize,
    pub chunks_committed: usize,
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// Summary for a run that failed before any pipeline could be built.
    pub fn not_started(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            state: PipelineState::Failed,
            records_read: 0,
            records_written: 0,
            chunks_committed: 0,
            elapsed_ms: 0,
        }
    }
}

/// The ingestor orchestrates the data flow from source -> transformer -> sink
/// for one dataset, one chunk at a time.
pub struct Ingestor<S, T, K> {
    dataset: String,
    source: S,
    transformer: T,
    sink: K,
    chunk_size: usize,
    state: PipelineState,
    metrics: RunMetrics,
    cancel: CancelHandle,
    started_at: Option<Instant>,
}

impl<S, T, K> Ingestor<S, T, K>
where
    S: Source,
    T: Transformer,
    K: Sink<T::Output>,
{
    pub fn new(
        dataset: impl Into<String>,
        source: S,
        transformer: T,
        sink: K,
        chunk_size: usize,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            source,
            transformer,
            sink,
            chunk_size: chunk_size.max(1),
            state: PipelineState::Idle,
            metrics: RunMetrics::default(),
            cancel: CancelHandle::new(),
            started_at: None,
        }
    }

    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            dataset: self.dataset.clone(),
            state: self.state,
            records_read: self.metrics.records_read,
            records_written: self.metrics.records_written,
            chunks_committed: self.metrics.chunks_committed,
            elapsed_ms: self.started_at.map_or(0, |t| t.elapsed().as_millis() as u64),
        }
    }

    /// Runs a single read-transform-write cycle over at most one chunk.
    ///
    /// 1. Pull up to `chunk_size` raw rows from the source.
    /// 2. Transform every row; the first failure fails the run.
    /// 3. Hand the whole chunk to the sink, which commits it atomically.
    ///
    /// A chunk that comes back short means the source is exhausted, so the run
    /// completes right after writing it.
    pub async fn run_once(&mut self) -> Result<ChunkOutcome, IngestionError> {
        if self.state.is_terminal() {
            return Err(IngestionError::Terminated {
                state: self.state.to_string(),
            });
        }
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        if self.cancel.is_cancelled() {
            self.transition(PipelineState::Cancelled);
            info!("Ingestion of {} cancelled", self.dataset);
            return Err(IngestionError::Cancelled);
        }

        self.transition(PipelineState::Reading);
        let raw = match self.source.next_batch(self.chunk_size) {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(e.into())),
        };
        if raw.is_empty() {
            self.transition(PipelineState::Completed);
            return Ok(ChunkOutcome {
                records_written: 0,
                has_more: false,
            });
        }
        self.metrics.records_read += raw.len();
        let has_more = raw.len() == self.chunk_size;

        self.transition(PipelineState::Transforming);
        let records = match self.transform_chunk(&raw) {
            Ok(records) => records,
            Err(e) => return Err(self.fail(e)),
        };

        self.transition(PipelineState::Writing);
        if let Err(e) = self.sink.write_batch(&records).await {
            return Err(self.fail(e.into()));
        }
        self.metrics.records_written += records.len();
        self.metrics.chunks_committed += 1;
        debug!(
            "{}: committed chunk {} ({} records)",
            self.dataset,
            self.metrics.chunks_committed,
            records.len()
        );

        self.transition(if has_more {
            PipelineState::Reading
        } else {
            PipelineState::Completed
        });
        Ok(ChunkOutcome {
            records_written: records.len(),
            has_more,
        })
    }

    /// Drives `run_once` until the run reaches a terminal state.
    pub async fn run(&mut self) -> Result<RunSummary, IngestionError> {
        info!(
            "Starting ingestion of {} in chunks of {}",
            self.dataset, self.chunk_size
        );

        while self.run_once().await?.has_more {}

        let summary = self.summary();
        info!(
            "Finished ingestion of {}: {} records in {} chunks (avg {:.1}/chunk) in {} ms",
            summary.dataset,
            summary.records_written,
            summary.chunks_committed,
            self.metrics.avg_chunk_size(),
            summary.elapsed_ms
        );
        Ok(summary)
    }

    fn transform_chunk(&self, raw: &[RawRecord]) -> Result<Vec<T::Output>, IngestionError> {
        raw.iter()
            .map(|record| self.transformer.transform(record).map_err(IngestionError::from))
            .collect()
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("{}: {} -> {}", self.dataset, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: IngestionError) -> IngestionError {
        self.metrics.chunks_failed += 1;
        self.transition(PipelineState::Failed);
        error!(
            "Ingestion of {} failed after {} committed chunks: {}",
            self.dataset, self.metrics.chunks_committed, err
        );
        err
    }
}
