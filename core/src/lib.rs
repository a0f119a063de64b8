//! Chunked ingestion of MovieLens CSV exports into relational tables.
//!
//! A run reads one delimited file ([`source`]), types every row ([`transform`])
//! and writes fixed-size chunks, each in its own transaction ([`sink`]).
//! [`ingestor::Ingestor`] drives the three for a single dataset.

pub mod clock;
pub mod config;
pub mod dataset;
pub mod db;
pub mod errors;
pub mod ingestor;
pub mod record;
pub mod sink;
pub mod source;
pub mod telemetry;
pub mod transform;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::IngestConfig;
pub use dataset::{DatasetKind, RunReport, run_dataset};
pub use errors::{FailureKind, IngestionError, Result};
pub use ingestor::{CancelHandle, Ingestor, PipelineState, RunSummary};
