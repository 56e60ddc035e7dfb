// Python toolchain setup: interpreter check, virtualenv creation,
// pyproject plus name-keyed requirements files, and pip installs run
// inside the venv.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ConfigWriter;
use crate::error::{Result, SetupStep};
use crate::filesystem::FileSystem;
use crate::installer::{DependencyInstaller, PackageManagerCommand};
use crate::process::{ProcessConfig, ProcessRunner};
use crate::requirements::{DependencyGroup, LanguageId, PackageSpec, ToolchainOptions};

use super::traits::{ensure_tool, options_record_toml, SetupConfig, ToolchainResult, ToolchainSetup};

pub struct PythonToolchain {
    runner: Arc<dyn ProcessRunner>,
}

impl PythonToolchain {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    fn venv_python(venv: &Path) -> PathBuf {
        if cfg!(windows) {
            venv.join("Scripts").join("python.exe")
        } else {
            venv.join("bin").join("python")
        }
    }

    fn pyproject(project_name: &str, options: &ToolchainOptions) -> toml::Value {
        let mut project = toml::map::Map::new();
        project.insert(
            "name".to_string(),
            toml::Value::String(project_name.to_string()),
        );
        project.insert(
            "version".to_string(),
            toml::Value::String("0.1.0".to_string()),
        );
        project.insert(
            "requires-python".to_string(),
            toml::Value::String(">=3.9".to_string()),
        );

        if !options.features.is_empty() {
            let mut extras = toml::map::Map::new();
            for feature in &options.features {
                extras.insert(feature.clone(), toml::Value::Array(Vec::new()));
            }
            project.insert(
                "optional-dependencies".to_string(),
                toml::Value::Table(extras),
            );
        }

        let mut root = toml::map::Map::new();
        root.insert("project".to_string(), toml::Value::Table(project));
        toml::Value::Table(root)
    }

    /// Rewrite a requirements file treating it as a mapping keyed by
    /// package name, so re-running setup never duplicates entries.
    fn write_requirements(path: &Path, packages: &[&PackageSpec]) -> Result<()> {
        let mut entries: BTreeMap<String, String> = BTreeMap::new();

        if path.exists() {
            let existing = std::fs::read_to_string(path).map_err(|e| {
                crate::error::ConfigError::IOError {
                    message: format!("Failed to read requirements file: {e}"),
                    path: Some(path.to_path_buf()),
                }
            })?;
            for line in existing.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let name = line
                    .split(['=', '>', '<', '~', '!', ';', ' '])
                    .next()
                    .unwrap_or(line)
                    .to_string();
                entries.insert(name, line.to_string());
            }
        }

        for package in packages {
            let line = match &package.version {
                Some(version) => format!("{}=={}", package.name, version),
                None => package.name.clone(),
            };
            entries.insert(package.name.clone(), line);
        }

        let mut rendered = entries.values().cloned().collect::<Vec<_>>().join("\n");
        rendered.push('\n');
        FileSystem::atomic_write(path, rendered.as_bytes())
    }
}

#[async_trait]
impl ToolchainSetup for PythonToolchain {
    fn language(&self) -> LanguageId {
        LanguageId::Python
    }

    fn tool_binary(&self) -> &str {
        "python3"
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

        // (b) manifests: pyproject pin, options record, keyed requirements
        let pyproject_path = root.join("pyproject.toml");
        let requirements_path = root.join("requirements.txt");
        let dev_requirements_path = root.join("requirements-dev.txt");
        let options_path = project_path.join("python.config.toml");

        let (required, development): (Vec<_>, Vec<_>) = config
            .dependencies
            .iter()
            .partition(|pkg| pkg.group == DependencyGroup::Required);

        let write = ConfigWriter::write_toml_merged(
            &pyproject_path,
            Self::pyproject(&project_name, &config.options),
        )
        .and_then(|_| Self::write_requirements(&requirements_path, &required))
        .and_then(|_| Self::write_requirements(&dev_requirements_path, &development))
        .and_then(|_| {
            ConfigWriter::write_toml_merged(&options_path, options_record_toml(&config.options))
        });
        if let Err(err) = write {
            result.record_step_failed(SetupStep::ManifestWrite, err.to_string());
            return Ok(result);
        }
        result.record_step_ok(
            SetupStep::ManifestWrite,
            "pyproject.toml, requirements files",
        );
        result.record_artifact("manifest", &pyproject_path);
        result.record_artifact("requirements", &requirements_path);
        result.record_artifact("options", &options_path);

        // (c) skeleton plus virtual environment
        if let Err(err) = FileSystem::create_skeleton(&root, &["src", "tests"]) {
            result.record_step_failed(SetupStep::Skeleton, err.to_string());
            return Ok(result);
        }
        let venv_path = root.join(".venv");
        let venv = self
            .runner
            .run(
                ProcessConfig::new(self.tool_binary())
                    .with_args(vec![
                        "-m".to_string(),
                        "venv".to_string(),
                        venv_path.to_string_lossy().to_string(),
                    ])
                    .with_timeout(config.options.install_timeout),
            )
            .await;
        match venv {
            Ok(run) if run.success() => {
                result.record_step_ok(SetupStep::Skeleton, "src, tests, .venv");
                result.record_artifact("venv", &venv_path);
            }
            Ok(run) => {
                result.record_step_failed(
                    SetupStep::Skeleton,
                    format!("venv creation failed: {}", run.stderr.trim()),
                );
                return Ok(result);
            }
            Err(err) => {
                result.record_step_failed(SetupStep::Skeleton, err.to_string());
                return Ok(result);
            }
        }

        // (d) pip installs through the venv interpreter
        let venv_python = Self::venv_python(&venv_path);
        let installer = DependencyInstaller::new(
            self.runner.clone(),
            PackageManagerCommand::pip(venv_python.to_string_lossy().to_string()),
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

        // (e) local verification
        let mut issues = Vec::new();
        if let Err(err) = ConfigWriter::read_toml(&pyproject_path) {
            issues.push(format!("pyproject.toml does not parse: {err}"));
        }
        for dir in ["src", "tests"] {
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
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_python_setup_writes_keyed_requirements() {
        let fake = Arc::new(FakeProcessRunner::new());
        let toolchain = PythonToolchain::new(fake);
        let dir = tempdir().unwrap();

        let config = SetupConfig::new(
            ToolchainOptions::default(),
            vec![
                PackageSpec::new("requests").with_version("2.31.0"),
                PackageSpec::new("pytest").development(),
            ],
        );

        let result = toolchain.setup(dir.path(), &config).await.unwrap();
        assert!(result.is_success());

        let root = dir.path().join("python");
        let requirements = std::fs::read_to_string(root.join("requirements.txt")).unwrap();
        assert!(requirements.contains("requests==2.31.0"));
        assert!(!requirements.contains("pytest"));

        let dev = std::fs::read_to_string(root.join("requirements-dev.txt")).unwrap();
        assert!(dev.contains("pytest"));
    }

    #[tokio::test]
    async fn test_python_requirements_rerun_no_duplicates() {
        let fake = Arc::new(FakeProcessRunner::new());
        let toolchain = PythonToolchain::new(fake);
        let dir = tempdir().unwrap();

        let config = SetupConfig::new(
            ToolchainOptions::default(),
            vec![PackageSpec::new("flask")],
        );

        toolchain.setup(dir.path(), &config).await.unwrap();
        toolchain.setup(dir.path(), &config).await.unwrap();

        let requirements =
            std::fs::read_to_string(dir.path().join("python/requirements.txt")).unwrap();
        let flask_lines = requirements
            .lines()
            .filter(|line| line.starts_with("flask"))
            .count();
        assert_eq!(flask_lines, 1);
    }

    #[tokio::test]
    async fn test_python_venv_created_through_runner() {
        let fake = Arc::new(FakeProcessRunner::new());
        let toolchain = PythonToolchain::new(fake.clone());
        let dir = tempdir().unwrap();

        let config = SetupConfig::new(ToolchainOptions::default(), vec![]);
        toolchain.setup(dir.path(), &config).await.unwrap();

        assert_eq!(fake.invocation_count_matching("-m venv"), 1);
    }

    #[tokio::test]
    async fn test_python_missing_interpreter() {
        let fake = Arc::new(FakeProcessRunner::new());
        fake.remove_command("python3");
        let toolchain = PythonToolchain::new(fake);
        let dir = tempdir().unwrap();

        let config = SetupConfig::new(ToolchainOptions::default(), vec![]);
        assert!(toolchain.setup(dir.path(), &config).await.is_err());
    }
}
