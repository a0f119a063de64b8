use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ingest_core=info,movielens_loader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Counters for one pipeline run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunMetrics {
    pub records_read: usize,
    pub records_written: usize,
    pub chunks_committed: usize,
    pub chunks_failed: usize,
}

impl RunMetrics {
    pub fn avg_chunk_size(&self) -> f64 {
        if self.chunks_committed == 0 {
            return 0.0;
        }
        self.records_written as f64 / self.chunks_committed as f64
    }
}
