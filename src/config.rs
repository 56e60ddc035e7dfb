// ConfigWriter renders structured configuration into ecosystem-native
// manifest formats. Writes merge with existing content (unrelated keys
// survive) and go through an atomic temp-file-and-rename.

use std::path::Path;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::filesystem::FileSystem;

pub struct ConfigWriter;

impl ConfigWriter {
    /// Merge `incoming` into the TOML manifest at `path` and write it
    /// atomically. Missing files start from an empty document.
    pub fn write_toml_merged(path: &Path, incoming: toml::Value) -> Result<()> {
        let mut document = Self::read_toml_or_empty(path)?;
        FileSystem::merge_toml(&mut document, incoming);

        let rendered =
            toml::to_string_pretty(&document).map_err(|e| ConfigError::WriteFailed {
                path: path.to_path_buf(),
                message: format!("TOML serialization failed: {e}"),
            })?;

        debug!(path = %path.display(), "Writing TOML manifest");
        FileSystem::atomic_write(path, rendered.as_bytes())
    }

    /// Merge `incoming` into the JSON manifest at `path` and write it
    /// atomically.
    pub fn write_json_merged(path: &Path, incoming: serde_json::Value) -> Result<()> {
        let mut document = Self::read_json_or_empty(path)?;
        FileSystem::merge_json(&mut document, incoming);

        let rendered =
            serde_json::to_string_pretty(&document).map_err(|e| ConfigError::WriteFailed {
                path: path.to_path_buf(),
                message: format!("JSON serialization failed: {e}"),
            })?;

        debug!(path = %path.display(), "Writing JSON manifest");
        FileSystem::atomic_write(path, rendered.as_bytes())
    }

    /// Write opaque module text (e.g. a JS config export). Text configs
    /// cannot be merged structurally, so the write is a full replacement,
    /// still atomic.
    pub fn write_module_text(path: &Path, text: &str) -> Result<()> {
        debug!(path = %path.display(), "Writing module text config");
        FileSystem::atomic_write(path, text.as_bytes())
    }

    /// Parse the TOML manifest at `path`, for verification passes
    pub fn read_toml(path: &Path) -> Result<toml::Value> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::IOError {
            message: format!("Failed to read manifest: {e}"),
            path: Some(path.to_path_buf()),
        })?;
        toml::from_str(&contents)
            .map_err(|e| {
                ConfigError::InvalidManifest {
                    path: path.to_path_buf(),
                    format: "TOML".to_string(),
                    message: e.to_string(),
                }
                .into()
            })
    }

    /// Parse the JSON manifest at `path`, for verification passes
    pub fn read_json(path: &Path) -> Result<serde_json::Value> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::IOError {
            message: format!("Failed to read manifest: {e}"),
            path: Some(path.to_path_buf()),
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| {
                ConfigError::InvalidManifest {
                    path: path.to_path_buf(),
                    format: "JSON".to_string(),
                    message: e.to_string(),
                }
                .into()
            })
    }

    fn read_toml_or_empty(path: &Path) -> Result<toml::Value> {
        if path.exists() {
            Self::read_toml(path)
        } else {
            Ok(toml::Value::Table(toml::map::Map::new()))
        }
    }

    fn read_json_or_empty(path: &Path) -> Result<serde_json::Value> {
        if path.exists() {
            Self::read_json(path)
        } else {
            Ok(serde_json::json!({}))
        }
    }
}
