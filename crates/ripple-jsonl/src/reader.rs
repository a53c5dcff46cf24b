//! JSONL reading with line tracking.

use crate::{Result, Warning};
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

/// Async reader for JSONL data.
///
/// Blank lines are skipped. Line numbers are 1-based and count blank lines,
/// so they match what an editor shows.
pub struct JsonlReader<R> {
    reader: BufReader<R>,
    line_number: usize,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> JsonlReader<R> {
    /// Creates a new `JsonlReader` wrapping the given async reader.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_number: 0,
            buffer: Vec::new(),
        }
    }

    /// Returns the line number of the last line read (0 before any read).
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Loads the next non-blank line into the buffer, without its line ending.
    ///
    /// Returns `false` at end of input.
    async fn advance(&mut self) -> Result<bool> {
        loop {
            self.buffer.clear();
            let read = self.reader.read_until(b'\n', &mut self.buffer).await?;
            if read == 0 {
                return Ok(false);
            }
            self.line_number += 1;

            while matches!(self.buffer.last(), Some(b'\n' | b'\r')) {
                self.buffer.pop();
            }
            if !self.buffer.iter().all(u8::is_ascii_whitespace) {
                return Ok(true);
            }
        }
    }

    /// Reads and deserializes the next record.
    ///
    /// Returns `Ok(None)` at end of input.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors and on the first malformed line.
    pub async fn read_record<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        if !self.advance().await? {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&self.buffer)?))
    }

    /// Reads the next record, turning a malformed line into a [`Warning`].
    ///
    /// # Errors
    ///
    /// Only I/O errors are returned as errors.
    pub async fn read_record_resilient<T: DeserializeOwned>(
        &mut self,
    ) -> Result<Option<std::result::Result<T, Warning>>> {
        if !self.advance().await? {
            return Ok(None);
        }
        let line_number = self.line_number;

        if std::str::from_utf8(&self.buffer).is_err() {
            return Ok(Some(Err(Warning::InvalidUtf8 { line_number })));
        }
        Ok(Some(serde_json::from_slice(&self.buffer).map_err(|e| {
            Warning::MalformedJson {
                line_number,
                error: e.to_string(),
            }
        })))
    }
}

/// Loads every parseable record of a JSONL file.
///
/// Malformed lines are skipped and reported as warnings, in file order.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub async fn read_jsonl_resilient<T, P>(path: P) -> Result<(Vec<T>, Vec<Warning>)>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref()).await?;
    let mut reader = JsonlReader::new(file);
    let mut records = Vec::new();
    let mut warnings = Vec::new();

    while let Some(entry) = reader.read_record_resilient().await? {
        match entry {
            Ok(record) => records.push(record),
            Err(warning) => {
                debug!(%warning, "skipping JSONL line");
                warnings.push(warning);
            }
        }
    }

    Ok((records, warnings))
}
