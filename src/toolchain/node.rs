// Node toolchain setup backing the nodejs, react, and web3 ecosystems.
// The three flavors share npm, package.json merging, and the skeleton
// shape; react and web3 add their ecosystem baseline packages.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::config::ConfigWriter;
use crate::error::{Result, SetupStep};
use crate::filesystem::FileSystem;
use crate::installer::{DependencyInstaller, PackageManagerCommand};
use crate::process::ProcessRunner;
use crate::requirements::{LanguageId, PackageSpec};

use super::traits::{ensure_tool, options_record_json, SetupConfig, ToolchainResult, ToolchainSetup};

/// Which npm-backed ecosystem this setup serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFlavor {
    Plain,
    React,
    Web3,
}

impl NodeFlavor {
    fn language(&self) -> LanguageId {
        match self {
            NodeFlavor::Plain => LanguageId::Nodejs,
            NodeFlavor::React => LanguageId::React,
            NodeFlavor::Web3 => LanguageId::Web3,
        }
    }

    /// Ecosystem baseline packages installed in addition to the declared
    /// dependencies
    fn baseline_packages(&self) -> Vec<PackageSpec> {
        match self {
            NodeFlavor::Plain => vec![],
            NodeFlavor::React => vec![
                PackageSpec::new("react"),
                PackageSpec::new("react-dom"),
            ],
            NodeFlavor::Web3 => vec![
                PackageSpec::new("web3"),
                PackageSpec::new("ethers"),
            ],
        }
    }

    fn skeleton(&self) -> &'static [&'static str] {
        match self {
            NodeFlavor::Plain => &["src", "test", "dist"],
            NodeFlavor::React => &["src", "src/components", "test", "public", "dist"],
            NodeFlavor::Web3 => &["src", "test", "dist", "abi"],
        }
    }
}

pub struct NodeToolchain {
    runner: Arc<dyn ProcessRunner>,
    flavor: NodeFlavor,
}

impl NodeToolchain {
    pub fn new(runner: Arc<dyn ProcessRunner>, flavor: NodeFlavor) -> Self {
        Self { runner, flavor }
    }

    fn package_json(&self, project_name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": format!("{}-{}", project_name, self.flavor.language().as_str()),
            "version": "0.1.0",
            "private": true,
            "scripts": {
                "build": "node scripts/build.js",
                "test": "node --test test/"
            },
            // Dependency objects are keyed by package name; npm installs
            // update them in place without duplicating entries.
            "dependencies": {},
            "devDependencies": {}
        })
    }
}

#[async_trait]
impl ToolchainSetup for NodeToolchain {
    fn language(&self) -> LanguageId {
        self.flavor.language()
    }

    fn tool_binary(&self) -> &str {
        "npm"
    }

    async fn setup(&self, project_path: &Path, config: &SetupConfig) -> Result<ToolchainResult> {
        let mut result = ToolchainResult::new(self.language().as_str());

        let version = ensure_tool(&self.runner, self.tool_binary(), self.language()).await?;
        result.record_step_ok(SetupStep::ToolCheck, &version);

        let root = project_path.join(self.language().as_str());
        let project_name = project_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("project")
            .to_string();

        // (b) package.json merged with any existing content, plus the
        // root-level options record
        let manifest_path = root.join("package.json");
        let options_path =
            project_path.join(format!("{}.config.json", self.language().as_str()));

        let write = ConfigWriter::write_json_merged(&manifest_path, self.package_json(&project_name))
            .and_then(|_| {
                ConfigWriter::write_json_merged(&options_path, options_record_json(&config.options))
            });
        if let Err(err) = write {
            result.record_step_failed(SetupStep::ManifestWrite, err.to_string());
            return Ok(result);
        }
        result.record_step_ok(SetupStep::ManifestWrite, "package.json");
        result.record_artifact("manifest", &manifest_path);
        result.record_artifact("options", &options_path);

        // (c) skeleton, exist-ok
        match FileSystem::create_skeleton(&root, self.flavor.skeleton()) {
            Ok(_) => {
                result.record_step_ok(SetupStep::Skeleton, self.flavor.skeleton().join(", "));
                result.record_artifact("source_dir", root.join("src"));
            }
            Err(err) => {
                result.record_step_failed(SetupStep::Skeleton, err.to_string());
                return Ok(result);
            }
        }

        // (d) npm installs: ecosystem baseline first, then declared packages
        let installer = DependencyInstaller::new(
            self.runner.clone(),
            PackageManagerCommand::npm(),
            config.options.install_timeout,
        );
        let mut packages = self.flavor.baseline_packages();
        packages.extend(config.dependencies.iter().cloned());

        let report = installer.install(&root, &packages).await?;
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

        // (e) local verification
        let mut issues = Vec::new();
        if let Err(err) = ConfigWriter::read_json(&manifest_path) {
            issues.push(format!("package.json does not parse: {err}"));
        }
        for dir in self.flavor.skeleton() {
            if !root.join(dir).is_dir() {
                issues.push(format!("missing skeleton directory: {dir}"));
            }
        }
        if issues.is_empty() {
            result.record_step_ok(SetupStep::Verification, "manifest parses, skeleton present");
        } else {
            result.record_step_failed(SetupStep::Verification, issues.join("; "));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::FakeProcessRunner;
    use crate::requirements::ToolchainOptions;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_node_setup_plain() {
        let fake = Arc::new(FakeProcessRunner::new());
        let toolchain = NodeToolchain::new(fake, NodeFlavor::Plain);
        let dir = tempdir().unwrap();

        let config = SetupConfig::new(
            ToolchainOptions::default(),
            vec![PackageSpec::new("express")],
        );
        let result = toolchain.setup(dir.path(), &config).await.unwrap();
        assert!(result.is_success());

        let root = dir.path().join("nodejs");
        assert!(root.join("package.json").exists());
        assert!(root.join("src").is_dir());
        assert!(root.join("test").is_dir());

        let manifest = ConfigWriter::read_json(&root.join("package.json")).unwrap();
        assert_eq!(manifest["private"], true);
    }

    #[tokio::test]
    async fn test_react_flavor_installs_baseline() {
        let fake = Arc::new(FakeProcessRunner::new());
        let toolchain = NodeToolchain::new(fake.clone(), NodeFlavor::React);
        let dir = tempdir().unwrap();

        let config = SetupConfig::new(ToolchainOptions::default(), vec![]);
        let result = toolchain.setup(dir.path(), &config).await.unwrap();
        assert!(result.is_success());

        assert_eq!(fake.invocation_count_matching("npm install react"), 2); // react + react-dom
        assert!(dir.path().join("react/src/components").is_dir());
        assert!(dir.path().join("react/public").is_dir());
    }

    #[tokio::test]
    async fn test_web3_flavor_language_and_baseline() {
        let fake = Arc::new(FakeProcessRunner::new());
        let toolchain = NodeToolchain::new(fake.clone(), NodeFlavor::Web3);
        assert_eq!(toolchain.language(), LanguageId::Web3);

        let dir = tempdir().unwrap();
        let config = SetupConfig::new(ToolchainOptions::default(), vec![]);
        toolchain.setup(dir.path(), &config).await.unwrap();

        assert_eq!(fake.invocation_count_matching("npm install web3"), 1);
        assert_eq!(fake.invocation_count_matching("npm install ethers"), 1);
        assert!(dir.path().join("web3/abi").is_dir());
    }

    #[tokio::test]
    async fn test_node_package_json_merge_preserves_existing() {
        let fake = Arc::new(FakeProcessRunner::new());
        let toolchain = NodeToolchain::new(fake, NodeFlavor::Plain);
        let dir = tempdir().unwrap();

        let root = dir.path().join("nodejs");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(
            root.join("package.json"),
            r#"{"author": "someone", "dependencies": {"left-pad": "^1.3.0"}}"#,
        )
        .unwrap();

        let config = SetupConfig::new(ToolchainOptions::default(), vec![]);
        toolchain.setup(dir.path(), &config).await.unwrap();

        let manifest = ConfigWriter::read_json(&root.join("package.json")).unwrap();
        assert_eq!(manifest["author"], "someone");
        assert_eq!(manifest["dependencies"]["left-pad"], "^1.3.0");
        assert_eq!(manifest["version"], "0.1.0");
    }
}
