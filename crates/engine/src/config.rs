//! Export configuration via `scenecast.toml`
//!
//! Every field has a default, so an empty file (or no file at all) gives a
//! working session writing hex-encoded arrays into one file per category.

use crate::writer::{EncodingMode, WriterOptions};
use scenecast_core::{Category, ExportError, ExportResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file name looked up in the output directory.
pub const CONFIG_FILE_NAME: &str = "scenecast.toml";

/// Extension of every destination file.
pub const DESTINATION_EXTENSION: &str = "scn";

/// Export configuration loaded from `scenecast.toml`.
///
/// # Example
///
/// ```toml
/// output_dir = "out"
/// file_prefix = "shot010"
/// encoding = "deflate"
/// worker_threads = 4
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportConfig {
    /// Directory receiving the destination files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// File name prefix of every destination.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Array encoding: `"literal"`, `"hex"` or `"deflate"`.
    #[serde(default = "default_encoding_str")]
    pub encoding: String,
    /// Break literal lists every `n` elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal_wrap: Option<usize>,
    /// Minimum array length for background encoding.
    #[serde(default = "default_async_threshold")]
    pub async_threshold: usize,
    /// Encode workers; 0 encodes synchronously on the caller.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Maximum queued encode tasks before encoding falls back inline.
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
    /// Poll interval while draining pending encodes, in microseconds.
    #[serde(default = "default_flush_poll_micros")]
    pub flush_poll_micros: u64,
    /// One destination file per category, or everything in the main file.
    #[serde(default = "default_true")]
    pub separate_files: bool,
    /// Always diff attribute by attribute, even when attribute counts differ.
    #[serde(default)]
    pub exhaustive_diff: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_file_prefix() -> String {
    "scene".to_string()
}

fn default_encoding_str() -> String {
    "hex".to_string()
}

fn default_async_threshold() -> usize {
    1000
}

fn default_worker_threads() -> usize {
    2
}

fn default_max_queue_depth() -> usize {
    4096
}

fn default_flush_poll_micros() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_prefix: default_file_prefix(),
            encoding: default_encoding_str(),
            literal_wrap: None,
            async_threshold: default_async_threshold(),
            worker_threads: default_worker_threads(),
            max_queue_depth: default_max_queue_depth(),
            flush_poll_micros: default_flush_poll_micros(),
            separate_files: true,
            exhaustive_diff: false,
        }
    }
}

impl ExportConfig {
    /// Default config rooted at `output_dir`
    pub fn in_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Parse the encoding string.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Config` for anything but the three mode names.
    pub fn encoding_mode(&self) -> ExportResult<EncodingMode> {
        self.encoding.parse()
    }

    /// Writer options derived from this config
    pub fn writer_options(&self) -> ExportResult<WriterOptions> {
        Ok(WriterOptions {
            mode: self.encoding_mode()?,
            literal_wrap: self.literal_wrap,
            async_threshold: self.async_threshold,
            poll_interval: Duration::from_micros(self.flush_poll_micros),
        })
    }

    /// Path of the main destination (the settings file)
    pub fn main_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.file_prefix, DESTINATION_EXTENSION))
    }

    /// Path of the destination receiving `category`.
    ///
    /// Settings always go to the main file; so does everything else when
    /// `separate_files` is off.
    pub fn destination_path(&self, category: Category) -> PathBuf {
        if category == Category::Settings || !self.separate_files {
            return self.main_path();
        }
        self.output_dir.join(format!(
            "{}_{}.{}",
            self.file_prefix,
            category.as_str(),
            DESTINATION_EXTENSION
        ))
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# scenecast export configuration
#
# Directory and file prefix of the destination files.
# The main file is <prefix>.scn; with separate_files every other category
# goes to <prefix>_<category>.scn and is included from the main file.
output_dir = "."
file_prefix = "scene"
separate_files = true

# Array encoding: "literal", "hex" (default) or "deflate"
#   "literal" = comma-separated lists
#   "hex"     = hex string of the raw little-endian bytes
#   "deflate" = hex string of the DEFLATE-compressed bytes
encoding = "hex"

# Break literal lists every N elements (default: no wrapping)
# literal_wrap = 16

# Arrays with at least this many elements are encoded in the background
async_threshold = 1000

# Encode worker threads (0 = encode on the calling thread)
worker_threads = 2
max_queue_depth = 4096

# Poll interval in microseconds while waiting for background encodes
flush_poll_micros = 100

# Diff attribute by attribute even when the attribute count changed
exhaustive_diff = false
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or names an
    /// unknown encoding.
    pub fn from_file(path: &Path) -> ExportResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExportError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: ExportConfig = toml::from_str(&content).map_err(|e| {
            ExportError::config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.encoding_mode()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> ExportResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> ExportResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ExportError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
