// Filesystem utilities: atomic manifest writes, deep merges for JSON/TOML
// documents, exist-ok skeleton creation, and best-effort project cleanup.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ConfigError, Result};

pub struct FileSystem;

impl FileSystem {
    /// Atomically write content to a file. Writes a temporary file in the
    /// same directory and renames it so a failed write leaves the target
    /// untouched.
    pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::IOError {
                message: format!("Failed to create parent directory: {e}"),
                path: Some(parent.to_path_buf()),
            })?;
        }

        let temp_path = path.with_extension(format!(
            "{}.tmp.{}",
            path.extension().and_then(|s| s.to_str()).unwrap_or(""),
            std::process::id()
        ));

        {
            let mut temp_file = fs::File::create(&temp_path).map_err(|e| ConfigError::IOError {
                message: format!("Failed to create temporary file: {e}"),
                path: Some(temp_path.clone()),
            })?;

            temp_file
                .write_all(content)
                .map_err(|e| ConfigError::IOError {
                    message: format!("Failed to write to temporary file: {e}"),
                    path: Some(temp_path.clone()),
                })?;

            temp_file.flush().map_err(|e| ConfigError::IOError {
                message: format!("Failed to flush temporary file: {e}"),
                path: Some(temp_path.clone()),
            })?;
        }

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            ConfigError::IOError {
                message: format!("Failed to rename temporary file: {e}"),
                path: Some(path.to_path_buf()),
            }
            .into()
        })
    }

    /// Recursively merge `incoming` into `base` for JSON documents. Objects
    /// merge key-wise with incoming values winning on conflict; everything
    /// else is replaced. Unrelated keys in `base` survive.
    pub fn merge_json(base: &mut serde_json::Value, incoming: serde_json::Value) {
        match (base, incoming) {
            (serde_json::Value::Object(base_map), serde_json::Value::Object(incoming_map)) => {
                for (key, value) in incoming_map {
                    match base_map.get_mut(&key) {
                        Some(existing) => Self::merge_json(existing, value),
                        None => {
                            base_map.insert(key, value);
                        }
                    }
                }
            }
            (slot, value) => *slot = value,
        }
    }

    /// Recursively merge `incoming` into `base` for TOML documents, with
    /// the same table-wise semantics as merge_json. Dependency tables keyed
    /// by package name stay idempotent under re-merge.
    pub fn merge_toml(base: &mut toml::Value, incoming: toml::Value) {
        match (base, incoming) {
            (toml::Value::Table(base_table), toml::Value::Table(incoming_table)) => {
                for (key, value) in incoming_table {
                    match base_table.get_mut(&key) {
                        Some(existing) => Self::merge_toml(existing, value),
                        None => {
                            base_table.insert(key, value);
                        }
                    }
                }
            }
            (slot, value) => *slot = value,
        }
    }

    /// Create the canonical directory skeleton for an ecosystem. Existing
    /// directories are left alone so re-running setup is idempotent.
    pub fn create_skeleton(root: &Path, subdirs: &[&str]) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        for subdir in subdirs {
            let dir = root.join(subdir);
            fs::create_dir_all(&dir).map_err(|e| ConfigError::IOError {
                message: format!("Failed to create skeleton directory: {e}"),
                path: Some(dir.clone()),
            })?;
            created.push(dir);
        }
        Ok(created)
    }

    /// True when the path does not exist or is an empty directory
    pub fn is_empty_or_absent(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(true);
        }
        if !path.is_dir() {
            return Ok(false);
        }
        let mut entries = fs::read_dir(path).map_err(|e| ConfigError::IOError {
            message: format!("Failed to read directory: {e}"),
            path: Some(path.to_path_buf()),
        })?;
        Ok(entries.next().is_none())
    }

    /// Remove everything the orchestrator created under the project path.
    /// Never returns an error: cleanup runs while propagating an earlier
    /// failure, so its own problems are logged and swallowed.
    pub fn cleanup_project(path: &Path) {
        if !path.exists() {
            return;
        }

        let entry_count = walkdir::WalkDir::new(path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .count();
        debug!(
            path = %path.display(),
            entries = entry_count,
            "Cleaning up project path after failure"
        );

        if let Err(e) = fs::remove_dir_all(path) {
            warn!(
                path = %path.display(),
                error = %e,
                "Cleanup of project path failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_creates_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("manifest.json");

        FileSystem::atomic_write(&target, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "{}");

        // No temp files left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("settings.json");

        FileSystem::atomic_write(&target, b"old").unwrap();
        FileSystem::atomic_write(&target, b"new").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn test_merge_json_preserves_unrelated_keys() {
        let mut base = serde_json::json!({
            "name": "demo",
            "scripts": {"lint": "eslint ."},
            "dependencies": {"react": "^18.0.0"}
        });
        let incoming = serde_json::json!({
            "dependencies": {"web3": "^4.0.0"}
        });

        FileSystem::merge_json(&mut base, incoming);
        assert_eq!(base["name"], "demo");
        assert_eq!(base["scripts"]["lint"], "eslint .");
        assert_eq!(base["dependencies"]["react"], "^18.0.0");
        assert_eq!(base["dependencies"]["web3"], "^4.0.0");
    }

    #[test]
    fn test_merge_json_is_idempotent() {
        let mut base = serde_json::json!({"dependencies": {}});
        let incoming = serde_json::json!({"dependencies": {"ethers": "^6.0.0"}});

        FileSystem::merge_json(&mut base, incoming.clone());
        FileSystem::merge_json(&mut base, incoming);
        assert_eq!(base["dependencies"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_merge_toml_tables() {
        let mut base: toml::Value = toml::from_str(
            r#"
[package]
name = "demo"

[dependencies]
serde = "1.0"
"#,
        )
        .unwrap();

        let incoming: toml::Value = toml::from_str(
            r#"
[dependencies]
tokio = "1.0"
"#,
        )
        .unwrap();

        FileSystem::merge_toml(&mut base, incoming);
        let deps = base["dependencies"].as_table().unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(base["package"]["name"].as_str(), Some("demo"));
    }

    #[test]
    fn test_create_skeleton_exist_ok() {
        let dir = tempdir().unwrap();
        FileSystem::create_skeleton(dir.path(), &["src", "tests"]).unwrap();
        FileSystem::create_skeleton(dir.path(), &["src", "tests"]).unwrap();

        assert!(dir.path().join("src").is_dir());
        assert!(dir.path().join("tests").is_dir());
    }

    #[test]
    fn test_is_empty_or_absent() {
        let dir = tempdir().unwrap();
        assert!(FileSystem::is_empty_or_absent(&dir.path().join("missing")).unwrap());
        assert!(FileSystem::is_empty_or_absent(dir.path()).unwrap());

        fs::write(dir.path().join("file.txt"), "content").unwrap();
        assert!(!FileSystem::is_empty_or_absent(dir.path()).unwrap());
    }

    #[test]
    fn test_cleanup_project_removes_tree() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("project");
        fs::create_dir_all(project.join("rust/src")).unwrap();
        fs::write(project.join("rust/Cargo.toml"), "[package]").unwrap();

        FileSystem::cleanup_project(&project);
        assert!(!project.exists());
    }

    #[test]
    fn test_cleanup_project_missing_path_is_noop() {
        let dir = tempdir().unwrap();
        FileSystem::cleanup_project(&dir.path().join("never-created"));
    }
}
