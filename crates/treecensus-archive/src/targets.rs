//! The run's target audit file.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, Terminator, WriterBuilder};

use treecensus_core::{CensusError, TARGETS_HEADER};

/// File name of the target audit inside a run directory.
pub const TARGETS_FILE_NAME: &str = "targets.csv";

/// Write every target path, one quoted row each, under a `Path` header.
///
/// Returns the number of rows written.
pub fn write_targets(path: &Path, targets: &[PathBuf]) -> Result<usize, CensusError> {
    let mut file = File::create(path).map_err(|e| CensusError::io(path, e))?;
    writeln!(file, "{TARGETS_HEADER}").map_err(|e| CensusError::io(path, e))?;

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(file);
    for target in targets {
        writer.write_record([target.to_string_lossy().as_ref()])?;
    }
    writer.flush().map_err(|e| CensusError::io(path, e))?;
    Ok(targets.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_targets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TARGETS_FILE_NAME);
        let targets = vec![PathBuf::from("/data"), PathBuf::from("/data/a \"b\"")];

        assert_eq!(write_targets(&path, &targets).unwrap(), 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Path\n\"/data\"\n\"/data/a \"\"b\"\"\"\n");
    }

    #[test]
    fn test_write_no_targets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TARGETS_FILE_NAME);

        assert_eq!(write_targets(&path, &[]).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Path\n");
    }
}
