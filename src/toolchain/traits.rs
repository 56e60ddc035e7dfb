// ToolchainSetup trait: the interface every language ecosystem implements
// to take a project path through tool check, manifest writes, skeleton
// creation, dependency install, and local verification.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, SetupStep, ToolchainError};
use crate::process::{ProcessConfig, ProcessRunner};
use crate::requirements::{LanguageId, PackageSpec, ToolchainOptions};

/// Everything one language's setup needs beyond the project path
#[derive(Debug, Clone)]
pub struct SetupConfig {
    pub options: ToolchainOptions,
    pub dependencies: Vec<PackageSpec>,
}

impl SetupConfig {
    pub fn new(options: ToolchainOptions, dependencies: Vec<PackageSpec>) -> Self {
        Self {
            options,
            dependencies,
        }
    }
}

/// Outcome of one setup phase (a language, or the shared base-dependency
/// phase). Immutable once produced; one per language per orchestration run.
#[derive(Debug, Clone)]
pub struct ToolchainResult {
    pub language: String,
    pub status: SetupStatus,
    pub artifacts: HashMap<String, PathBuf>,
    pub diagnostics: Vec<String>,
    /// First step that failed, when status is Failed
    pub failed_step: Option<SetupStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStatus {
    Success,
    Failed,
}

impl ToolchainResult {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            status: SetupStatus::Success,
            artifacts: HashMap::new(),
            diagnostics: Vec::new(),
            failed_step: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SetupStatus::Success
    }

    pub fn record_artifact(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.artifacts.insert(name.into(), path.into());
    }

    pub fn record_step_ok(&mut self, step: SetupStep, detail: impl AsRef<str>) {
        self.diagnostics
            .push(format!("{step}: ok ({})", detail.as_ref()));
    }

    /// Mark the result failed, attributing the failure to a step
    pub fn record_step_failed(&mut self, step: SetupStep, detail: impl AsRef<str>) {
        self.status = SetupStatus::Failed;
        if self.failed_step.is_none() {
            self.failed_step = Some(step);
        }
        self.diagnostics
            .push(format!("{step}: failed ({})", detail.as_ref()));
    }
}

/// Per-language toolchain setup pipeline
#[async_trait]
pub trait ToolchainSetup: Send + Sync {
    /// Which language this setup serves
    fn language(&self) -> LanguageId;

    /// The ecosystem's base tool binary, checked for presence before any
    /// file is written
    fn tool_binary(&self) -> &str;

    /// Run the full setup sequence for this language under `project_path`.
    /// Step failures after the tool check are surfaced as a Failed result
    /// with the step named in diagnostics, not as an opaque error.
    async fn setup(&self, project_path: &Path, config: &SetupConfig) -> Result<ToolchainResult>;
}

/// Recognized options rendered as a TOML record for `<lang>.config.toml`
pub fn options_record_toml(options: &ToolchainOptions) -> toml::Value {
    let mut root = toml::map::Map::new();
    root.insert(
        "channel".to_string(),
        toml::Value::String(options.channel.as_str().to_string()),
    );
    root.insert(
        "optimization_level".to_string(),
        toml::Value::Integer(i64::from(options.optimization_level)),
    );
    root.insert(
        "features".to_string(),
        toml::Value::Array(
            options
                .features
                .iter()
                .map(|feature| toml::Value::String(feature.clone()))
                .collect(),
        ),
    );
    toml::Value::Table(root)
}

/// Recognized options rendered as a JSON record for `<lang>.config.json`
pub fn options_record_json(options: &ToolchainOptions) -> serde_json::Value {
    serde_json::json!({
        "channel": options.channel.as_str(),
        "optimization_level": options.optimization_level,
        "features": options.features.iter().collect::<Vec<_>>(),
    })
}

/// Confirm a host tool responds to `--version` through the runner.
/// Returns the trimmed version line for diagnostics.
pub async fn ensure_tool(
    runner: &Arc<dyn ProcessRunner>,
    binary: &str,
    language: LanguageId,
) -> Result<String> {
    let not_found = |detail: String| ToolchainError::ToolExecutableNotFound {
        tool: binary.to_string(),
        language: language.to_string(),
        suggestion: Some(detail),
    };

    let config = ProcessConfig::new(binary).with_args(vec!["--version"]);
    match runner.run(config).await {
        Ok(result) if result.success() => Ok(result.stdout.trim().to_string()),
        Ok(result) => Err(not_found(format!(
            "{binary} --version exited with {:?}: {}",
            result.exit_code,
            result.stderr.trim()
        ))
        .into()),
        Err(err) => {
            // Distinguish "not installed" from "present but broken"
            let hint = match which::which(binary) {
                Ok(path) => format!(
                    "{binary} found at {} but could not be executed: {err}",
                    path.display()
                ),
                Err(_) => format!("{binary} is not on PATH; install the {language} toolchain"),
            };
            Err(not_found(hint).into())
        }
    }
}
