//! Per-worker append-only record store.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, Terminator, WriterBuilder};

use treecensus_core::{CensusError, FileRecord};

/// Write buffer size of a sink.
pub const SINK_BUFFER_SIZE: usize = 64 * 1024;

/// Buffered CSV rows for one worker and one root.
///
/// Rows are UTF-8 without a byte-order mark, `\n`-terminated, with string
/// fields always quoted (embedded quotes doubled) and the size left bare.
/// There is no header; the assembler writes it once per archive entry.
pub struct TempSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: u64,
}

impl TempSink {
    /// Create (or truncate) the sink file at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, CensusError> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| CensusError::io(&path, e))?;
        let writer = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::NonNumeric)
            .terminator(Terminator::Any(b'\n'))
            .buffer_capacity(SINK_BUFFER_SIZE)
            .from_writer(file);

        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    /// Append one record.
    pub fn append(&mut self, record: &FileRecord<'_>) -> Result<(), CensusError> {
        self.writer.serialize(record)?;
        self.rows += 1;
        Ok(())
    }

    /// Rows appended so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Sink file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the sink.
    ///
    /// Returns the sink path if it holds at least one row; an empty sink is
    /// deleted and `None` is returned. The file handle is released before
    /// this returns either way.
    pub fn finish(self) -> Result<Option<PathBuf>, CensusError> {
        let Self { path, writer, rows } = self;
        let file = writer
            .into_inner()
            .map_err(|e| {
                let err = e.error();
                CensusError::io(&path, std::io::Error::new(err.kind(), err.to_string()))
            })?;
        drop(file);

        if rows == 0 {
            fs::remove_file(&path).map_err(|e| CensusError::io(&path, e))?;
            return Ok(None);
        }
        Ok(Some(path))
    }

    /// Close the sink and delete its file, ignoring errors.
    pub fn discard(self) {
        let Self { path, writer, .. } = self;
        drop(writer);
        let _ = fs::remove_file(path);
    }
}

impl std::fmt::Debug for TempSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempSink")
            .field("path", &self.path)
            .field("rows", &self.rows)
            .finish()
    }
}
