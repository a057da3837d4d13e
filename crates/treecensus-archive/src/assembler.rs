//! Merge a root's sinks into one compressed CSV entry.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use treecensus_core::{CensusError, RootTag};

/// Writes `<tag>.zip` holding a single `<tag>.csv` entry.
#[derive(Debug, Clone)]
pub struct ZipAssembler {
    options: SimpleFileOptions,
}

impl ZipAssembler {
    /// Create an assembler using Deflate.
    pub fn new() -> Self {
        Self::with_compression_level(Some(6))
    }

    /// Create an assembler with an explicit Deflate level.
    pub fn with_compression_level(level: Option<i64>) -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(level)
            .large_file(true);
        Self { options }
    }

    /// Assemble a root's archive in `dir`. See [`ZipAssembler::assemble`].
    pub fn assemble_root(
        &self,
        dir: &Path,
        tag: &RootTag,
        header: &str,
        sinks: &[PathBuf],
    ) -> Result<AssembledArchive, CensusError> {
        let path = dir.join(tag.archive_name());
        let rows = self.assemble(&path, &tag.entry_name(), header, sinks)?;
        Ok(AssembledArchive { path, rows })
    }

    /// Write `header` followed by every sink's rows, in the given order, as
    /// one entry of a new archive at `archive_path`.
    ///
    /// Sinks are streamed into the compressor; their content is never held
    /// in memory as a whole. An existing archive at the path is replaced.
    /// On success every sink is deleted and the number of data rows
    /// (header excluded) is returned. On failure the partial archive is
    /// removed and the sinks are left for the caller.
    pub fn assemble(
        &self,
        archive_path: &Path,
        entry_name: &str,
        header: &str,
        sinks: &[PathBuf],
    ) -> Result<u64, CensusError> {
        match self.write_archive(archive_path, entry_name, header, sinks) {
            Ok(rows) => {
                for sink in sinks {
                    if let Err(err) = fs::remove_file(sink) {
                        warn!("Could not remove sink {}: {err}", sink.display());
                    }
                }
                debug!("Wrote {rows} row(s) to {}", archive_path.display());
                Ok(rows)
            }
            Err(err) => {
                let _ = fs::remove_file(archive_path);
                Err(err)
            }
        }
    }

    fn write_archive(
        &self,
        archive_path: &Path,
        entry_name: &str,
        header: &str,
        sinks: &[PathBuf],
    ) -> Result<u64, CensusError> {
        let file = File::create(archive_path).map_err(|e| CensusError::io(archive_path, e))?;
        let mut zip = ZipWriter::new(file);
        zip.start_file(entry_name, self.options)
            .map_err(|e| CensusError::archive(archive_path, e))?;

        let mut entry = RowCounter::new(&mut zip);
        entry
            .write_all(header.as_bytes())
            .and_then(|_| entry.write_all(b"\n"))
            .map_err(|e| CensusError::io(archive_path, e))?;
        let header_rows = entry.rows();

        for sink in sinks {
            let mut input = File::open(sink).map_err(|e| CensusError::io(sink, e))?;
            io::copy(&mut input, &mut entry).map_err(|e| CensusError::io(sink, e))?;
            // Keep the next sink's first row on its own line.
            if !entry.at_line_start() {
                entry
                    .write_all(b"\n")
                    .map_err(|e| CensusError::io(archive_path, e))?;
            }
        }
        let rows = entry.rows() - header_rows;

        let file = zip
            .finish()
            .map_err(|e| CensusError::archive(archive_path, e))?;
        file.sync_all()
            .map_err(|e| CensusError::io(archive_path, e))?;
        Ok(rows)
    }
}

impl Default for ZipAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// A written archive.
#[derive(Debug, Clone)]
pub struct AssembledArchive {
    /// Archive location.
    pub path: PathBuf,
    /// Data rows written, header excluded.
    pub rows: u64,
}

/// Pass-through writer that counts complete CSV rows.
///
/// A row ends at a `\n` outside a quoted field. Escaped quotes (`""`) flip
/// the quote state twice, so they need no special case.
struct RowCounter<W> {
    inner: W,
    rows: u64,
    in_quotes: bool,
    last: Option<u8>,
}

impl<W: Write> RowCounter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            rows: 0,
            in_quotes: false,
            last: None,
        }
    }

    fn rows(&self) -> u64 {
        self.rows
    }

    fn at_line_start(&self) -> bool {
        matches!(self.last, None | Some(b'\n'))
    }
}

impl<W: Write> Write for RowCounter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        for &b in &buf[..n] {
            match b {
                b'"' => self.in_quotes = !self.in_quotes,
                b'\n' if !self.in_quotes => self.rows += 1,
                _ => {}
            }
        }
        if n > 0 {
            self.last = Some(buf[n - 1]);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
