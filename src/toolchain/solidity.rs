// Solidity/Hardhat toolchain setup: npm-backed like the node flavors,
// with a hardhat.config.js module text and a contracts-centric skeleton.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::config::ConfigWriter;
use crate::error::{Result, SetupStep};
use crate::filesystem::FileSystem;
use crate::installer::{DependencyInstaller, PackageManagerCommand};
use crate::process::ProcessRunner;
use crate::requirements::{LanguageId, PackageSpec, ToolchainOptions};

use super::traits::{ensure_tool, options_record_json, SetupConfig, ToolchainResult, ToolchainSetup};

pub struct SolidityToolchain {
    runner: Arc<dyn ProcessRunner>,
}

impl SolidityToolchain {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    fn hardhat_config(options: &ToolchainOptions) -> String {
        // Hardhat config is JS module text, so it is replaced atomically
        // rather than merged.
        format!(
            r#"require("@nomicfoundation/hardhat-toolbox");

/** @type import('hardhat/config').HardhatUserConfig */
module.exports = {{
  solidity: {{
    version: "0.8.24",
    settings: {{
      optimizer: {{
        enabled: {enabled},
        runs: {runs}
      }}
    }}
  }},
  paths: {{
    sources: "./contracts",
    tests: "./test",
    artifacts: "./artifacts"
  }}
}};
"#,
            enabled = options.optimization_level > 0,
            runs = u32::from(options.optimization_level) * 100,
        )
    }

    fn package_json(project_name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": format!("{project_name}-solidity"),
            "version": "0.1.0",
            "private": true,
            "scripts": {
                "compile": "hardhat compile",
                "test": "hardhat test"
            },
            "devDependencies": {}
        })
    }
}

#[async_trait]
impl ToolchainSetup for SolidityToolchain {
    fn language(&self) -> LanguageId {
        LanguageId::Solidity
    }

    fn tool_binary(&self) -> &str {
        "npx"
    }

    async fn setup(&self, project_path: &Path, config: &SetupConfig) -> Result<ToolchainResult> {
        let mut result = ToolchainResult::new(self.language().as_str());

        // Hardhat runs through npx, which ships with npm; checking npx
        // covers the whole chain.
        let version = ensure_tool(&self.runner, self.tool_binary(), self.language()).await?;
        result.record_step_ok(SetupStep::ToolCheck, &version);

        let root = project_path.join(self.language().as_str());
        let project_name = project_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("project")
            .to_string();

        // (b) hardhat config text, package.json, options record
        let hardhat_path = root.join("hardhat.config.js");
        let manifest_path = root.join("package.json");
        let options_path = project_path.join("solidity.config.json");

        let write = ConfigWriter::write_module_text(
            &hardhat_path,
            &Self::hardhat_config(&config.options),
        )
        .and_then(|_| {
            ConfigWriter::write_json_merged(&manifest_path, Self::package_json(&project_name))
        })
        .and_then(|_| {
            ConfigWriter::write_json_merged(&options_path, options_record_json(&config.options))
        });
        if let Err(err) = write {
            result.record_step_failed(SetupStep::ManifestWrite, err.to_string());
            return Ok(result);
        }
        result.record_step_ok(SetupStep::ManifestWrite, "hardhat.config.js, package.json");
        result.record_artifact("hardhat_config", &hardhat_path);
        result.record_artifact("manifest", &manifest_path);
        result.record_artifact("options", &options_path);

        // (c) contracts-centric skeleton, exist-ok
        match FileSystem::create_skeleton(&root, &["contracts", "scripts", "test", "artifacts"]) {
            Ok(_) => {
                result.record_step_ok(SetupStep::Skeleton, "contracts, scripts, test, artifacts");
                result.record_artifact("contracts_dir", root.join("contracts"));
            }
            Err(err) => {
                result.record_step_failed(SetupStep::Skeleton, err.to_string());
                return Ok(result);
            }
        }

        // (d) hardhat toolchain plus declared packages, all dev-group
        let installer = DependencyInstaller::new(
            self.runner.clone(),
            PackageManagerCommand::npm(),
            config.options.install_timeout,
        );
        let mut packages = vec![
            PackageSpec::new("hardhat").development(),
            PackageSpec::new("@nomicfoundation/hardhat-toolbox").development(),
        ];
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
        if !hardhat_path.exists() {
            issues.push("hardhat.config.js missing".to_string());
        }
        if let Err(err) = ConfigWriter::read_json(&manifest_path) {
            issues.push(format!("package.json does not parse: {err}"));
        }
        if !root.join("contracts").is_dir() {
            issues.push("missing skeleton directory: contracts".to_string());
        }
        if issues.is_empty() {
            result.record_step_ok(SetupStep::Verification, "config present, skeleton present");
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
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_solidity_setup_produces_hardhat_project() {
        let fake = Arc::new(FakeProcessRunner::new());
        let toolchain = SolidityToolchain::new(fake.clone());
        let dir = tempdir().unwrap();

        let config = SetupConfig::new(ToolchainOptions::default(), vec![]);
        let result = toolchain.setup(dir.path(), &config).await.unwrap();
        assert!(result.is_success());

        let root = dir.path().join("solidity");
        let hardhat = std::fs::read_to_string(root.join("hardhat.config.js")).unwrap();
        assert!(hardhat.contains("module.exports"));
        assert!(hardhat.contains("./contracts"));
        assert!(root.join("contracts").is_dir());
        assert!(root.join("artifacts").is_dir());

        assert_eq!(fake.invocation_count_matching("--save-dev hardhat"), 1);
    }

    #[tokio::test]
    async fn test_solidity_optimizer_reflects_options() {
        let fake = Arc::new(FakeProcessRunner::new());
        let toolchain = SolidityToolchain::new(fake);
        let dir = tempdir().unwrap();

        let mut options = ToolchainOptions::default();
        options.optimization_level = 0;
        let config = SetupConfig::new(options, vec![]);
        toolchain.setup(dir.path(), &config).await.unwrap();

        let hardhat =
            std::fs::read_to_string(dir.path().join("solidity/hardhat.config.js")).unwrap();
        assert!(hardhat.contains("enabled: false"));
    }

    #[tokio::test]
    async fn test_solidity_missing_npx_fails_fast() {
        let fake = Arc::new(FakeProcessRunner::new());
        fake.remove_command("npx");
        let toolchain = SolidityToolchain::new(fake);
        let dir = tempdir().unwrap();

        let config = SetupConfig::new(ToolchainOptions::default(), vec![]);
        assert!(toolchain.setup(dir.path(), &config).await.is_err());
        assert!(!dir.path().join("solidity").exists());
    }

    #[tokio::test]
    async fn test_solidity_hardhat_install_failure_marked() {
        let fake = Arc::new(FakeProcessRunner::new());
        fake.fail_matching("--save-dev hardhat", "registry timeout");
        let toolchain = SolidityToolchain::new(fake);
        let dir = tempdir().unwrap();

        let config = SetupConfig::new(ToolchainOptions::default(), vec![]);
        let result = toolchain.setup(dir.path(), &config).await.unwrap();
        assert!(!result.is_success());
        assert!(result
            .diagnostics
            .iter()
            .any(|line| line.contains("dependency install: failed")));
    }
}
