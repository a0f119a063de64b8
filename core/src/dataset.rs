use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::error;

use crate::clock::Clock;
use crate::config::{DatasetConfig, ProcessingConfig};
use crate::errors::IngestionError;
use crate::ingestor::{CancelHandle, Ingestor, RunSummary};
use crate::record::{MovieRecord, RatingRecord, TagRecord};
use crate::sink::{Sink, SqliteSink, TableRecord};
use crate::source::{CsvSource, Source};
use crate::transform::{MovieTransformer, RatingTransformer, TagTransformer, Transformer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Movies,
    Ratings,
    Tags,
}

impl DatasetKind {
    /// Column names in file order.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            DatasetKind::Movies => &["movieId", "movieTitle", "movieGenres"],
            DatasetKind::Ratings => &["userId", "movieId", "rating", "timestamp"],
            DatasetKind::Tags => &["userId", "movieId", "tag", "timestamp"],
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            DatasetKind::Movies => MovieRecord::TABLE,
            DatasetKind::Ratings => RatingRecord::TABLE,
            DatasetKind::Tags => TagRecord::TABLE,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatasetKind::Movies => "movies",
            DatasetKind::Ratings => "ratings",
            DatasetKind::Tags => "tags",
        };
        f.write_str(name)
    }
}

/// Outcome of one dataset run. The summary is filled in even when the run failed.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub failure: Option<IngestionError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Builds the pipeline for one configured dataset and runs it to a terminal state.
pub async fn run_dataset(
    dataset: &DatasetConfig,
    processing: &ProcessingConfig,
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    cancel: CancelHandle,
) -> RunReport {
    let source = match CsvSource::open(
        &dataset.path,
        dataset.kind.columns(),
        processing.validate_header,
    ) {
        Ok(source) => source,
        Err(e) => {
            error!("Cannot open {} for {}: {}", dataset.path, dataset.name, e);
            return RunReport {
                summary: RunSummary::not_started(&dataset.name),
                failure: Some(e.into()),
            };
        }
    };

    match dataset.kind {
        DatasetKind::Movies => {
            let sink = SqliteSink::<MovieRecord>::new(pool);
            drive(dataset, processing, source, MovieTransformer, sink, cancel).await
        }
        DatasetKind::Ratings => {
            let sink = SqliteSink::<RatingRecord>::new(pool);
            let transformer = RatingTransformer::new(clock);
            drive(dataset, processing, source, transformer, sink, cancel).await
        }
        DatasetKind::Tags => {
            let sink = SqliteSink::<TagRecord>::new(pool);
            let transformer = TagTransformer::new(clock);
            drive(dataset, processing, source, transformer, sink, cancel).await
        }
    }
}

async fn drive<S, T, K>(
    dataset: &DatasetConfig,
    processing: &ProcessingConfig,
    source: S,
    transformer: T,
    sink: K,
    cancel: CancelHandle,
) -> RunReport
where
    S: Source,
    T: Transformer,
    K: Sink<T::Output>,
{
    let mut ingestor = Ingestor::new(
        dataset.name.clone(),
        source,
        transformer,
        sink,
        processing.chunk_size,
    )
    .with_cancel_handle(cancel);

    let failure = ingestor.run().await.err();
    RunReport {
        summary: ingestor.summary(),
        failure,
    }
}
