pub mod csv;

use std::sync::Arc;

use crate::errors::{SourceError, TransformError};

pub use self::csv::CsvSource;

/// One row as read from a source, before any typing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based line the row starts on.
    pub line: u64,
    /// Declared column names, shared by every row of the same source.
    pub columns: Arc<[String]>,
    pub values: Vec<String>,
}

impl RawRecord {
    pub fn new(line: u64, columns: Arc<[String]>, values: Vec<String>) -> Self {
        Self {
            line,
            columns,
            values,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|column| column == name)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
    }

    pub fn require(&self, name: &str) -> Result<&str, TransformError> {
        self.get(name).ok_or_else(|| TransformError::MissingField {
            line: self.line,
            field: name.to_string(),
        })
    }
}

/// Anything that hands out raw rows in file order.
pub trait Source {
    /// Pulls up to `max_records` rows.
    ///
    /// A batch shorter than `max_records` means the source is exhausted; an empty
    /// batch means there was nothing left at all. The first bad row aborts the batch.
    fn next_batch(&mut self, max_records: usize) -> Result<Vec<RawRecord>, SourceError>;
}

impl<I> Source for I
where
    I: Iterator<Item = Result<RawRecord, SourceError>>,
{
    fn next_batch(&mut self, max_records: usize) -> Result<Vec<RawRecord>, SourceError> {
        let mut batch = Vec::with_capacity(max_records);
        while batch.len() < max_records {
            match self.next() {
                Some(record) => batch.push(record?),
                None => break,
            }
        }
        Ok(batch)
    }
}

pub(crate) fn shared_columns(columns: &[&str]) -> Arc<[String]> {
    columns.iter().map(|c| c.to_string()).collect()
}
