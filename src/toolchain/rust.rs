// Rust/Cargo toolchain setup: toolchain pin, Cargo manifest, canonical
// crate skeleton, cargo-driven dependency installs, and a local
// verification pass over the generated manifests.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::ConfigWriter;
use crate::error::{Result, SetupStep};
use crate::filesystem::FileSystem;
use crate::installer::{DependencyInstaller, PackageManagerCommand};
use crate::process::ProcessRunner;
use crate::requirements::{LanguageId, ToolchainOptions};

use super::traits::{ensure_tool, options_record_toml, SetupConfig, ToolchainResult, ToolchainSetup};

pub struct RustToolchain {
    runner: Arc<dyn ProcessRunner>,
}

impl RustToolchain {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    fn toolchain_pin(options: &ToolchainOptions) -> toml::Value {
        let mut toolchain = toml::map::Map::new();
        toolchain.insert(
            "channel".to_string(),
            toml::Value::String(options.channel.as_str().to_string()),
        );

        let mut root = toml::map::Map::new();
        root.insert("toolchain".to_string(), toml::Value::Table(toolchain));
        toml::Value::Table(root)
    }

    fn cargo_manifest(project_name: &str, options: &ToolchainOptions) -> toml::Value {
        let mut package = toml::map::Map::new();
        package.insert(
            "name".to_string(),
            toml::Value::String(project_name.to_string()),
        );
        package.insert(
            "version".to_string(),
            toml::Value::String("0.1.0".to_string()),
        );
        package.insert(
            "edition".to_string(),
            toml::Value::String("2021".to_string()),
        );

        let mut release_profile = toml::map::Map::new();
        release_profile.insert(
            "opt-level".to_string(),
            toml::Value::Integer(i64::from(options.optimization_level)),
        );
        let mut profile = toml::map::Map::new();
        profile.insert("release".to_string(), toml::Value::Table(release_profile));

        // Dependency tables are keyed by package name, so re-merging the
        // same manifest never duplicates entries.
        let mut features = toml::map::Map::new();
        for feature in &options.features {
            features.insert(feature.clone(), toml::Value::Array(Vec::new()));
        }

        let mut root = toml::map::Map::new();
        root.insert("package".to_string(), toml::Value::Table(package));
        root.insert("profile".to_string(), toml::Value::Table(profile));
        root.insert(
            "dependencies".to_string(),
            toml::Value::Table(toml::map::Map::new()),
        );
        if !features.is_empty() {
            root.insert("features".to_string(), toml::Value::Table(features));
        }
        toml::Value::Table(root)
    }
}

#[async_trait]
impl ToolchainSetup for RustToolchain {
    fn language(&self) -> LanguageId {
        LanguageId::Rust
    }

    fn tool_binary(&self) -> &str {
        "cargo"
    }

    async fn setup(&self, project_path: &Path, config: &SetupConfig) -> Result<ToolchainResult> {
        let mut result = ToolchainResult::new(self.language().as_str());

        // (a) host tool presence, before anything is written
        let version = ensure_tool(&self.runner, self.tool_binary(), self.language()).await?;
        result.record_step_ok(SetupStep::ToolCheck, &version);

        let root = project_path.join(self.language().as_str());
        let project_name = project_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("project")
            .to_string();

        // (b) manifests: toolchain pin, Cargo manifest, options record
        let pin_path = root.join("rust-toolchain.toml");
        let manifest_path = root.join("Cargo.toml");
        let options_path = project_path.join("rust.config.toml");

        let write = ConfigWriter::write_toml_merged(&pin_path, Self::toolchain_pin(&config.options))
            .and_then(|_| {
                ConfigWriter::write_toml_merged(
                    &manifest_path,
                    Self::cargo_manifest(&project_name, &config.options),
                )
            })
            .and_then(|_| {
                ConfigWriter::write_toml_merged(&options_path, options_record_toml(&config.options))
            });
        if let Err(err) = write {
            result.record_step_failed(SetupStep::ManifestWrite, err.to_string());
            return Ok(result);
        }
        result.record_step_ok(SetupStep::ManifestWrite, "Cargo.toml, rust-toolchain.toml");
        result.record_artifact("manifest", &manifest_path);
        result.record_artifact("toolchain_pin", &pin_path);
        result.record_artifact("options", &options_path);

        // (c) canonical crate skeleton, exist-ok
        match FileSystem::create_skeleton(&root, &["src", "tests", "target"]) {
            Ok(_) => {
                result.record_step_ok(SetupStep::Skeleton, "src, tests, target");
                result.record_artifact("source_dir", root.join("src"));
            }
            Err(err) => {
                result.record_step_failed(SetupStep::Skeleton, err.to_string());
                return Ok(result);
            }
        }

        // (d) dependency install, one subprocess per package
        let installer = DependencyInstaller::new(
            self.runner.clone(),
            PackageManagerCommand::cargo(),
            config.options.install_timeout,
        );
        let report = installer.install(&root, &config.dependencies).await?;
        if report.all_installed() {
            result.record_step_ok(
                SetupStep::DependencyInstall,
                format!("{} packages", report.packages.len()),
            );
        } else {
            result.record_step_failed(
                SetupStep::DependencyInstall,
                format!("failed packages: {}", report.failed_packages().join(", ")),
            );
            return Ok(result);
        }

        // (e) local verification: manifests parse, skeleton exists
        let mut issues = Vec::new();
        if let Err(err) = ConfigWriter::read_toml(&manifest_path) {
            issues.push(format!("Cargo.toml does not parse: {err}"));
        }
        if let Err(err) = ConfigWriter::read_toml(&pin_path) {
            issues.push(format!("rust-toolchain.toml does not parse: {err}"));
        }
        for dir in ["src", "tests"] {
            if !root.join(dir).is_dir() {
                issues.push(format!("missing skeleton directory: {dir}"));
            }
        }

        if issues.is_empty() {
            result.record_step_ok(SetupStep::Verification, "manifests parse, skeleton present");
        } else {
            debug!(language = "rust", issues = ?issues, "Local verification failed");
            result.record_step_failed(SetupStep::Verification, issues.join("; "));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::FakeProcessRunner;
    use crate::requirements::PackageSpec;
    use tempfile::tempdir;

    fn setup_config() -> SetupConfig {
        SetupConfig::new(ToolchainOptions::default(), vec![PackageSpec::new("serde")])
    }

    #[tokio::test]
    async fn test_rust_setup_produces_manifests_and_skeleton() {
        let runner: Arc<dyn ProcessRunner> = Arc::new(FakeProcessRunner::new());
        let toolchain = RustToolchain::new(runner);
        let dir = tempdir().unwrap();

        let result = toolchain.setup(dir.path(), &setup_config()).await.unwrap();
        assert!(result.is_success());

        let root = dir.path().join("rust");
        assert!(root.join("Cargo.toml").exists());
        assert!(root.join("rust-toolchain.toml").exists());
        assert!(root.join("src").is_dir());
        assert!(root.join("tests").is_dir());
        assert!(dir.path().join("rust.config.toml").exists());

        let manifest = ConfigWriter::read_toml(&root.join("Cargo.toml")).unwrap();
        assert_eq!(manifest["package"]["edition"].as_str(), Some("2021"));
        assert_eq!(
            manifest["profile"]["release"]["opt-level"].as_integer(),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_rust_setup_missing_cargo_fails_fast() {
        let fake = Arc::new(FakeProcessRunner::new());
        fake.remove_command("cargo");
        let toolchain = RustToolchain::new(fake);
        let dir = tempdir().unwrap();

        let result = toolchain.setup(dir.path(), &setup_config()).await;
        assert!(result.is_err());
        // Fast fail: nothing was written
        assert!(!dir.path().join("rust").exists());
    }

    #[tokio::test]
    async fn test_rust_setup_rerun_is_idempotent() {
        let runner: Arc<dyn ProcessRunner> = Arc::new(FakeProcessRunner::new());
        let toolchain = RustToolchain::new(runner);
        let dir = tempdir().unwrap();
        let config = setup_config();

        toolchain.setup(dir.path(), &config).await.unwrap();
        let first = ConfigWriter::read_toml(&dir.path().join("rust/Cargo.toml")).unwrap();
        let first_count = first["dependencies"].as_table().unwrap().len();

        toolchain.setup(dir.path(), &config).await.unwrap();
        let second = ConfigWriter::read_toml(&dir.path().join("rust/Cargo.toml")).unwrap();
        assert_eq!(
            second["dependencies"].as_table().unwrap().len(),
            first_count
        );
    }

    #[tokio::test]
    async fn test_rust_setup_install_failure_marks_step() {
        let fake = Arc::new(FakeProcessRunner::new());
        fake.fail_matching("add serde", "failed to fetch registry");
        let toolchain = RustToolchain::new(fake);
        let dir = tempdir().unwrap();

        let result = toolchain.setup(dir.path(), &setup_config()).await.unwrap();
        assert!(!result.is_success());
        assert!(result
            .diagnostics
            .iter()
            .any(|line| line.contains("dependency install: failed")));
    }

    #[tokio::test]
    async fn test_rust_nightly_channel_is_pinned() {
        let runner: Arc<dyn ProcessRunner> = Arc::new(FakeProcessRunner::new());
        let toolchain = RustToolchain::new(runner);
        let dir = tempdir().unwrap();

        let mut options = ToolchainOptions::default();
        options.channel = crate::requirements::Channel::Nightly;
        let config = SetupConfig::new(options, vec![]);

        toolchain.setup(dir.path(), &config).await.unwrap();
        let pin = ConfigWriter::read_toml(&dir.path().join("rust/rust-toolchain.toml")).unwrap();
        assert_eq!(pin["toolchain"]["channel"].as_str(), Some("nightly"));
    }
}
