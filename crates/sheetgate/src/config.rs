//! Import options

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ImportError, Result};
use sheetgate_core::Color;
use sheetgate_xlsx::ReadLimits;

/// Archive limits as they appear in configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveLimits {
    pub max_entries: usize,
    pub max_entry_size: u64,
    pub max_total_size: u64,
    pub max_compression_ratio: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        let limits = ReadLimits::default();
        Self {
            max_entries: limits.max_entries,
            max_entry_size: limits.max_entry_size,
            max_total_size: limits.max_total_size,
            max_compression_ratio: limits.max_compression_ratio,
        }
    }
}

impl From<&ArchiveLimits> for ReadLimits {
    fn from(limits: &ArchiveLimits) -> Self {
        ReadLimits {
            max_entries: limits.max_entries,
            max_entry_size: limits.max_entry_size,
            max_total_size: limits.max_total_size,
            max_compression_ratio: limits.max_compression_ratio,
        }
    }
}

/// Options shared by every import run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Maximum number of data rows per file
    pub max_rows: usize,
    /// Slack added to the pre-count threshold for stray rows
    pub row_count_buffer: u64,
    /// Maximum upload size in bytes
    pub max_file_bytes: u64,
    pub limits: ArchiveLimits,
    /// Root directory for error reports
    pub report_dir: PathBuf,
    /// Rows the report writer keeps in memory
    pub report_window: usize,
    /// ARGB hex fill for error cells
    pub highlight_color: String,
    /// Footer text written below the data of an error report
    pub disclaimer: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            max_rows: 10_000,
            row_count_buffer: 10,
            max_file_bytes: 50 * 1024 * 1024,
            limits: ArchiveLimits::default(),
            report_dir: std::env::temp_dir().join("sheetgate-reports"),
            report_window: 100,
            highlight_color: "FFFFC7CE".to_string(),
            disclaimer: "This file was regenerated for error review. \
                Formatting may differ from the original."
                .to_string(),
        }
    }
}

impl ImportOptions {
    /// Parse options from JSON; absent keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read options from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Archive limits for the reader
    pub fn read_limits(&self) -> ReadLimits {
        ReadLimits::from(&self.limits)
    }

    /// Parsed highlight color
    pub fn highlight(&self) -> Result<Color> {
        Color::from_hex(&self.highlight_color).ok_or_else(|| {
            ImportError::Config(format!(
                "highlight_color '{}' is not an RGB or ARGB hex color",
                self.highlight_color
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options =
            ImportOptions::from_json(r#"{"max_rows": 50, "limits": {"max_entries": 20}}"#).unwrap();
        assert_eq!(options.max_rows, 50);
        assert_eq!(options.row_count_buffer, 10);
        assert_eq!(options.read_limits().max_entries, 20);
        assert_eq!(
            options.read_limits().max_compression_ratio,
            ReadLimits::default().max_compression_ratio
        );
    }

    #[test]
    fn test_highlight_color() {
        let options = ImportOptions::default();
        assert_eq!(options.highlight().unwrap(), Color::argb(0xFF, 0xFF, 0xC7, 0xCE));

        let bad = ImportOptions {
            highlight_color: "pink".into(),
            ..ImportOptions::default()
        };
        assert!(bad.highlight().is_err());
    }
}
