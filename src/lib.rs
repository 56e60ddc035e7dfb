// polyforge - Library module
// Core functionality for multi-language project toolchain orchestration

pub mod cli;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod installer;
pub mod logging;
pub mod orchestrator;
pub mod process;
pub mod requirements;
pub mod toolchain;

// Re-export main types for easier access
pub use config::ConfigWriter;
pub use error::{
    exit_codes, ConfigError, ForgeError, InstallError, ProcessError, RequirementsError, Result,
    SetupStep, ToolchainError,
};
pub use filesystem::FileSystem;
pub use installer::{
    DependencyInstaller, InstallReport, InstallStatus, PackageInstall, PackageManagerCommand,
};
pub use logging::{init_logging, ColorConfig, LogConfig, LogFormat};
pub use orchestrator::{
    IntegrationConfig, OrchestrationResult, OrchestratorConfig, ToolchainOrchestrator,
};
pub use process::{
    FakeProcessRunner, ProcessConfig, ProcessResult, ProcessRunner, SystemProcessRunner,
};
pub use requirements::{
    Channel, DependencyGroup, LanguageId, PackageSpec, RequirementSet, ToolchainOptions,
};
pub use toolchain::{
    toolchain_for, NodeFlavor, SetupConfig, SetupStatus, ToolchainResult, ToolchainSetup,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

// Build information (set by build script)
pub const BUILD_DATE: &str = env!("BUILD_DATE");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");
pub const GIT_BRANCH: &str = env!("GIT_BRANCH");
pub const RUST_VERSION: &str = env!("RUST_VERSION");

/// Get formatted version string with build information
pub fn version_info() -> String {
    format!(
        "{NAME} {VERSION} (commit: {GIT_COMMIT}, branch: {GIT_BRANCH}, built: {BUILD_DATE}, rustc: {RUST_VERSION})"
    )
}
