// ToolchainOrchestrator drives a multi-language project setup as one
// transaction-like operation: validate, base dependencies, per-language
// setups, cross-language integration, verification, and full cleanup of
// the project path on fatal failure.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::ConfigWriter;
use crate::error::{
    ConfigError, ForgeError, RequirementsError, Result, SetupStep, ToolchainError,
};
use crate::filesystem::FileSystem;
use crate::logging::utils as log_utils;
use crate::process::{ProcessConfig, ProcessRunner};
use crate::requirements::{LanguageId, RequirementSet};
use crate::toolchain::{toolchain_for, SetupConfig, ToolchainResult};

/// Cross-language settings derived from the succeeded setups. Serialized
/// to build.config.json and the shared workspace settings; never
/// independently persisted beyond those files.
#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    pub build_order: Vec<LanguageId>,
    pub optimization_level: String,
    pub coverage_target: u8,
}

/// Aggregate outcome of one orchestration run. Fully populated on
/// success; on fatal failure the caller gets an error instead, with
/// cleanup already performed.
#[derive(Debug)]
pub struct OrchestrationResult {
    pub dependencies: ToolchainResult,
    pub toolchains: Vec<(LanguageId, ToolchainResult)>,
    pub integration: IntegrationConfig,
    pub verification: BTreeMap<String, bool>,
}

impl OrchestrationResult {
    pub fn toolchain(&self, language: LanguageId) -> Option<&ToolchainResult> {
        self.toolchains
            .iter()
            .find(|(id, _)| *id == language)
            .map(|(_, result)| result)
    }

    /// Failed verification checks as reportable errors. Non-fatal; the
    /// orchestrator never raises these, callers decide how loudly to
    /// surface them.
    pub fn verification_failures(&self) -> Vec<ToolchainError> {
        self.verification
            .iter()
            .filter(|(_, passed)| !**passed)
            .map(|(check, _)| ToolchainError::VerificationFailed {
                language: "project".to_string(),
                check: check.clone(),
                details: self
                    .toolchains
                    .iter()
                    .flat_map(|(_, result)| result.diagnostics.iter().cloned())
                    .collect(),
            })
            .collect()
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Shared host tools verified before any language-specific work
    pub base_tools: Vec<String>,
    /// Test coverage target recorded in the shared workspace settings
    pub coverage_target: u8,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            base_tools: vec!["git".to_string(), "make".to_string()],
            coverage_target: 80,
        }
    }
}

pub struct ToolchainOrchestrator {
    runner: Arc<dyn ProcessRunner>,
    config: OrchestratorConfig,
}

impl ToolchainOrchestrator {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(runner: Arc<dyn ProcessRunner>, config: OrchestratorConfig) -> Self {
        Self { runner, config }
    }

    /// Run the full multi-language setup. Either returns a fully populated
    /// result (the verification map may contain failures) or an error with
    /// the project path already cleaned up.
    pub async fn setup_project_toolchains(
        &self,
        project_path: &Path,
        requirements: &RequirementSet,
    ) -> Result<OrchestrationResult> {
        // Step 1: validation, strictly before any side effect
        requirements.validate()?;
        if project_path.exists() && !project_path.is_dir() {
            return Err(RequirementsError::ProjectPathUnusable {
                path: project_path.to_path_buf(),
                message: "exists but is not a directory".to_string(),
            }
            .into());
        }
        if !FileSystem::is_empty_or_absent(project_path)? {
            return Err(RequirementsError::ProjectPathNotEmpty {
                path: project_path.to_path_buf(),
                suggestion: Some("Point polyforge at an empty or new directory".to_string()),
            }
            .into());
        }

        log_utils::log_orchestration_start(project_path, requirements.languages.len());

        std::fs::create_dir_all(project_path).map_err(|e| ConfigError::IOError {
            message: format!("Failed to create project path: {e}"),
            path: Some(project_path.to_path_buf()),
        })?;

        // Step 2: shared base dependencies, fatal on failure
        let dependencies = match self.check_base_dependencies().await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "Base dependency check failed, cleaning up project path");
                FileSystem::cleanup_project(project_path);
                return Err(err);
            }
        };

        // Step 3: per-language setups, in caller order
        let mut toolchains: Vec<(LanguageId, ToolchainResult)> = Vec::new();
        for language in &requirements.languages {
            let span = log_utils::toolchain_setup_span(language.as_str(), project_path);
            let _guard = span.enter();
            let started = Instant::now();

            let toolchain = toolchain_for(*language, self.runner.clone());
            let setup_config = SetupConfig::new(
                requirements.options.clone(),
                requirements.dependencies.clone(),
            );

            match toolchain.setup(project_path, &setup_config).await {
                Ok(result) if result.is_success() => {
                    log_utils::log_setup_completion(
                        language.as_str(),
                        true,
                        started.elapsed().as_millis(),
                    );
                    toolchains.push((*language, result));
                }
                Ok(result) => {
                    log_utils::log_setup_completion(
                        language.as_str(),
                        false,
                        started.elapsed().as_millis(),
                    );
                    let step = result.failed_step.unwrap_or(SetupStep::Verification);
                    let message = result
                        .diagnostics
                        .last()
                        .cloned()
                        .unwrap_or_else(|| "setup failed".to_string());
                    return Err(self.fail_with_cleanup(
                        project_path,
                        language.as_str(),
                        step,
                        message,
                    ));
                }
                Err(err) => {
                    log_utils::log_setup_completion(
                        language.as_str(),
                        false,
                        started.elapsed().as_millis(),
                    );
                    warn!(
                        language = %language.as_str(),
                        error = %err,
                        "Fatal setup failure, cleaning up project path"
                    );
                    FileSystem::cleanup_project(project_path);
                    return Err(err);
                }
            }
        }

        // Step 4: cross-language integration, pure config synthesis
        let integration = IntegrationConfig {
            build_order: toolchains.iter().map(|(id, _)| *id).collect(),
            optimization_level: requirements.options.optimization_level.to_string(),
            coverage_target: self.config.coverage_target,
        };
        if let Err(err) = self.write_integration(project_path, &integration) {
            return Err(self.fail_with_cleanup(
                project_path,
                "integration",
                SetupStep::ManifestWrite,
                err.to_string(),
            ));
        }

        // Step 5: verification, diagnostic not gating
        let verification = self.verify_project(project_path, &toolchains, &dependencies);

        info!(
            project = %project_path.display(),
            languages = toolchains.len(),
            "Toolchain orchestration completed"
        );

        Ok(OrchestrationResult {
            dependencies,
            toolchains,
            integration,
            verification,
        })
    }

    /// Verify shared host tools respond before any language work starts
    async fn check_base_dependencies(&self) -> Result<ToolchainResult> {
        let mut result = ToolchainResult::new("base");

        for tool in &self.config.base_tools {
            let config = ProcessConfig::new(tool).with_args(vec!["--version"]);
            match self.runner.run(config).await {
                Ok(run) if run.success() => {
                    result.record_step_ok(SetupStep::ToolCheck, run.stdout.trim());
                }
                Ok(run) => {
                    result.record_step_failed(
                        SetupStep::ToolCheck,
                        format!("{tool}: {}", run.stderr.trim()),
                    );
                    return Err(ToolchainError::ToolExecutableNotFound {
                        tool: tool.clone(),
                        language: "base".to_string(),
                        suggestion: Some(format!("{tool} --version exited nonzero")),
                    }
                    .into());
                }
                Err(err) => {
                    result.record_step_failed(SetupStep::ToolCheck, err.to_string());
                    return Err(ToolchainError::ToolExecutableNotFound {
                        tool: tool.clone(),
                        language: "base".to_string(),
                        suggestion: Some(err.to_string()),
                    }
                    .into());
                }
            }
        }

        Ok(result)
    }

    /// Write the consolidated build-order manifest and merge the shared
    /// workspace editor settings. Runs only after all setups succeed; the
    /// only step that writes at the project root.
    fn write_integration(&self, project_path: &Path, integration: &IntegrationConfig) -> Result<()> {
        let build_config = serde_json::json!({
            "build_order": integration
                .build_order
                .iter()
                .map(|language| language.as_str())
                .collect::<Vec<_>>(),
            "optimization_level": integration.optimization_level,
            "generated_at": chrono::Utc::now().to_rfc3339(),
        });
        ConfigWriter::write_json_merged(&project_path.join("build.config.json"), build_config)?;

        let workspace_settings = serde_json::json!({
            "editor.formatOnSave": true,
            "files.exclude": {
                "**/target": true,
                "**/node_modules": true,
                "**/.venv": true,
                "**/artifacts": true,
            },
            "polyforge.testCoverageTarget": integration.coverage_target,
        });
        ConfigWriter::write_json_merged(
            &project_path.join(".vscode").join("settings.json"),
            workspace_settings,
        )
    }

    /// Fixed diagnostic check set. Failures land in the verification map
    /// and never abort the run.
    fn verify_project(
        &self,
        project_path: &Path,
        toolchains: &[(LanguageId, ToolchainResult)],
        dependencies: &ToolchainResult,
    ) -> BTreeMap<String, bool> {
        let mut verification = BTreeMap::new();

        let dependency_check = dependencies.is_success()
            && toolchains.iter().all(|(_, result)| {
                result
                    .artifacts
                    .get("manifest")
                    .map(|manifest| manifest.exists())
                    .unwrap_or(false)
            });

        let build_verification = project_path.join("build.config.json").exists()
            && toolchains
                .iter()
                .all(|(language, _)| build_artifact_dir(project_path, *language).exists());

        let test_environment = toolchains
            .iter()
            .all(|(language, _)| test_dir(project_path, *language).is_dir());

        for (name, passed) in [
            ("Dependency Check", dependency_check),
            ("Build Verification", build_verification),
            ("Test Environment", test_environment),
        ] {
            log_utils::log_verification(name, passed);
            verification.insert(name.to_string(), passed);
        }

        verification
    }

    /// Remove everything under the project path, then build the umbrella
    /// error. Cleanup problems are logged, never propagated; the original
    /// failure is the one the caller sees.
    fn fail_with_cleanup(
        &self,
        project_path: &Path,
        language: &str,
        step: SetupStep,
        message: String,
    ) -> ForgeError {
        warn!(
            language = %language,
            step = %step,
            "Fatal setup failure, cleaning up project path"
        );
        FileSystem::cleanup_project(project_path);

        ToolchainError::SetupFailed {
            language: language.to_string(),
            step,
            message,
        }
        .into()
    }
}

/// Where a language's build output lives under the project path
fn build_artifact_dir(project_path: &Path, language: LanguageId) -> PathBuf {
    let root = project_path.join(language.as_str());
    match language {
        LanguageId::Rust => root.join("target"),
        LanguageId::Python => root.join(".venv"),
        LanguageId::Solidity => root.join("artifacts"),
        LanguageId::Nodejs | LanguageId::React | LanguageId::Web3 => root.join("dist"),
    }
}

/// Where a language's tests live under the project path
fn test_dir(project_path: &Path, language: LanguageId) -> PathBuf {
    let root = project_path.join(language.as_str());
    match language {
        LanguageId::Rust | LanguageId::Python => root.join("tests"),
        _ => root.join("test"),
    }
}
