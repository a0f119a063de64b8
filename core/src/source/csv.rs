use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, warn};

use crate::errors::SourceError;
use crate::source::{RawRecord, shared_columns};

/// Comma-delimited file reader that drops the first physical line as the header
/// and checks every following row against the declared columns.
///
/// Rows are split off line by line so that a blank line or a stray quote in the
/// header can never hide data rows. A quoted field may still span lines.
pub struct CsvSource<R: Read> {
    input: BufReader<R>,
    tokenizer: ReaderBuilder,
    columns: Arc<[String]>,
    record: StringRecord,
    buf: Vec<u8>,
    /// Physical lines consumed so far.
    line: u64,
    validate_header: bool,
    header_checked: bool,
    exhausted: bool,
}

impl CsvSource<File> {
    pub fn open(
        path: impl AsRef<Path>,
        columns: &[&str],
        validate_header: bool,
    ) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|error| SourceError::Io {
            path: path.display().to_string(),
            error,
        })?;
        debug!("Opened CSV source {}", path.display());
        Ok(Self::from_reader(file, columns, validate_header))
    }
}

impl<R: Read> CsvSource<R> {
    pub fn from_reader(reader: R, columns: &[&str], validate_header: bool) -> Self {
        let mut tokenizer = ReaderBuilder::new();
        tokenizer
            .delimiter(b',')
            .has_headers(false)
            // row width is checked against the declared columns instead
            .flexible(true);

        Self {
            input: BufReader::new(reader),
            tokenizer,
            columns: shared_columns(columns),
            record: StringRecord::new(),
            buf: Vec::new(),
            line: 0,
            validate_header,
            header_checked: false,
            exhausted: false,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Appends one physical line to `buf`. Returns false at end of input.
    fn read_line(&mut self) -> Result<bool, SourceError> {
        let read = self
            .input
            .read_until(b'\n', &mut self.buf)
            .map_err(csv::Error::from)?;
        if read == 0 {
            return Ok(false);
        }
        self.line += 1;
        Ok(true)
    }

    /// Splits the line(s) held in `buf` into `record`.
    fn tokenize(&mut self) -> Result<(), SourceError> {
        let end = trim_terminator(&self.buf);
        let mut reader = self.tokenizer.from_reader(&self.buf[..end]);
        if !reader.read_record(&mut self.record)? {
            self.record.clear();
        }
        Ok(())
    }

    fn check_header(&mut self) -> Result<(), SourceError> {
        self.buf.clear();
        let has_header = self.read_line()?;
        if !self.validate_header {
            return Ok(());
        }
        if !has_header || trim_terminator(&self.buf) == 0 {
            return Err(SourceError::MissingHeader);
        }

        self.tokenize()?;
        let found: Vec<String> = self.record.iter().map(|h| h.trim().to_string()).collect();
        if found.as_slice() != &*self.columns {
            warn!("Header {:?} does not match columns {:?}", found, self.columns);
            return Err(SourceError::HeaderMismatch {
                expected: self.columns.to_vec(),
                found,
            });
        }
        Ok(())
    }

    /// Reads the next row, following a quoted field across line breaks.
    fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError> {
        self.buf.clear();
        if !self.read_line()? {
            return Ok(None);
        }
        let line = self.line;
        while has_open_quote(&self.buf) {
            if !self.read_line()? {
                return Err(SourceError::UnterminatedQuote { line });
            }
        }

        self.tokenize()?;
        if self.record.len() != self.columns.len() {
            return Err(SourceError::MalformedRecord {
                line,
                expected: self.columns.len(),
                found: self.record.len(),
            });
        }

        Ok(Some(RawRecord::new(
            line,
            self.columns.clone(),
            self.record.iter().map(str::to_string).collect(),
        )))
    }
}

/// Length of `line` without its `\n` or `\r\n` terminator.
fn trim_terminator(line: &[u8]) -> usize {
    let mut end = line.len();
    if line[..end].ends_with(b"\n") {
        end -= 1;
    }
    if line[..end].ends_with(b"\r") {
        end -= 1;
    }
    end
}

/// An odd number of quote characters leaves a quoted field open.
fn has_open_quote(line: &[u8]) -> bool {
    line.iter().filter(|&&b| b == b'"').count() % 2 == 1
}

impl<R: Read> Iterator for CsvSource<R> {
    type Item = Result<RawRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        if !self.header_checked {
            self.header_checked = true;
            if let Err(e) = self.check_header() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }

        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.exhausted = true;
                None
            }
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}
