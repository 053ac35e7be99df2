//! Where the raw zone reference text comes from.

use std::path::{Path, PathBuf};

use crate::domain::ParkingError;

/// Supplies the raw zone reference CSV.
///
/// Called once at startup and again on every reload.
pub trait ZoneSource: Send + Sync {
    fn read(&self) -> Result<String, ParkingError>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Reads zone data from a file on disk.
#[derive(Debug, Clone)]
pub struct FileZoneSource {
    path: PathBuf,
}

impl FileZoneSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ZoneSource for FileZoneSource {
    fn read(&self) -> Result<String, ParkingError> {
        std::fs::read_to_string(&self.path).map_err(|e| ParkingError::DataUnavailable {
            message: format!("failed to read {}: {}", self.path.display(), e),
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Zone data held in memory.
#[derive(Debug, Clone)]
pub struct InlineZoneSource {
    text: String,
}

impl InlineZoneSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl ZoneSource for InlineZoneSource {
    fn read(&self) -> Result<String, ParkingError> {
        Ok(self.text.clone())
    }

    fn describe(&self) -> String {
        "inline zone data".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_source_reads_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zones.csv");
        std::fs::write(&path, "ParkingZone\n1\n").unwrap();

        let source = FileZoneSource::new(&path);
        assert_eq!(source.read().unwrap(), "ParkingZone\n1\n");
        assert_eq!(source.path(), path.as_path());
    }

    #[test]
    fn missing_file_is_unavailable() {
        let source = FileZoneSource::new("/nonexistent/path/zones.csv");
        let err = source.read().unwrap_err();
        assert!(matches!(err, ParkingError::DataUnavailable { .. }));
        assert!(err.to_string().contains("/nonexistent/path/zones.csv"));
    }
}
