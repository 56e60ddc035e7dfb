// Error handling framework for polyforge
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForgeError>;

/// Main error type for polyforge with per-subsystem hierarchy
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("Invalid requirements: {0}")]
    Requirements(#[from] Box<RequirementsError>),

    #[error("Toolchain setup failed: {0}")]
    Toolchain(#[from] Box<ToolchainError>),

    #[error("Dependency installation failed: {0}")]
    Install(#[from] Box<InstallError>),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<ConfigError>),

    #[error("Process execution failed: {0}")]
    Process(#[from] Box<ProcessError>),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Requirement-set validation errors. These are raised before any side
/// effect happens, so the project path is guaranteed untouched.
#[derive(Debug, Error)]
pub enum RequirementsError {
    #[error("Unsupported language: {language}")]
    UnsupportedLanguage {
        language: String,
        supported: Vec<String>,
    },

    #[error("Requirement set declares no languages")]
    EmptyLanguages,

    #[error("Language declared more than once: {language}")]
    DuplicateLanguage { language: String },

    #[error("Project path is not empty: {path}")]
    ProjectPathNotEmpty {
        path: PathBuf,
        suggestion: Option<String>,
    },

    #[error("Project path is not usable: {path}")]
    ProjectPathUnusable { path: PathBuf, message: String },

    #[error("Invalid requirements file: {message}")]
    InvalidFile {
        message: String,
        file_path: Option<PathBuf>,
    },
}

/// Per-language toolchain setup errors with language/step context
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("Required tool not found on host: {tool}")]
    ToolExecutableNotFound {
        tool: String,
        language: String,
        suggestion: Option<String>,
    },

    #[error("Toolchain setup failed for {language} during {step}: {message}")]
    SetupFailed {
        language: String,
        step: SetupStep,
        message: String,
    },

    #[error("Verification failed for {language}: {check}")]
    VerificationFailed {
        language: String,
        check: String,
        details: Vec<String>,
    },
}

/// The five internal steps of a per-language setup. Failures carry the
/// step so the orchestrator can report where the pipeline broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    ToolCheck,
    ManifestWrite,
    Skeleton,
    DependencyInstall,
    Verification,
}

impl std::fmt::Display for SetupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SetupStep::ToolCheck => "tool check",
            SetupStep::ManifestWrite => "manifest write",
            SetupStep::Skeleton => "skeleton creation",
            SetupStep::DependencyInstall => "dependency install",
            SetupStep::Verification => "verification",
        };
        f.write_str(name)
    }
}

/// Package installation errors with captured subprocess output
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Install command failed for package {package}")]
    CommandFailed {
        package: String,
        manager: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Install timed out for package {package} after {duration:?}")]
    Timeout { package: String, duration: Duration },
}

/// Manifest/config rendering and writing errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to write manifest: {path}")]
    WriteFailed { path: PathBuf, message: String },

    #[error("Existing manifest is not valid {format}: {path}")]
    InvalidManifest {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("IO operation failed: {message}")]
    IOError {
        message: String,
        path: Option<PathBuf>,
    },
}

/// Subprocess management errors
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn process: {command}")]
    SpawnFailed { command: String, error: String },

    #[error("Process execution failed: {command}")]
    ExecutionFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Process timed out after {duration:?}: {command}")]
    Timeout { command: String, duration: Duration },

    #[error("Failed to capture process output: {message}")]
    OutputCaptureFailed { message: String, command: String },
}

/// Standard exit codes for the CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const REQUIREMENTS_ERROR: i32 = 2;
    pub const TOOLCHAIN_ERROR: i32 = 3;
    pub const INSTALL_ERROR: i32 = 4;
    pub const CONFIG_ERROR: i32 = 5;
    pub const TIMEOUT_ERROR: i32 = 6;
    pub const PROCESS_ERROR: i32 = 7;
}

impl ForgeError {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ForgeError::Requirements(_) => exit_codes::REQUIREMENTS_ERROR,
            ForgeError::Toolchain(_) => exit_codes::TOOLCHAIN_ERROR,
            ForgeError::Install(install_err) => match install_err.as_ref() {
                InstallError::Timeout { .. } => exit_codes::TIMEOUT_ERROR,
                _ => exit_codes::INSTALL_ERROR,
            },
            ForgeError::Config(_) => exit_codes::CONFIG_ERROR,
            ForgeError::Process(process_err) => match process_err.as_ref() {
                ProcessError::Timeout { .. } => exit_codes::TIMEOUT_ERROR,
                _ => exit_codes::PROCESS_ERROR,
            },
            ForgeError::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }
}

// Ergonomic conversions so `?` works without manual boxing
impl From<RequirementsError> for ForgeError {
    fn from(err: RequirementsError) -> Self {
        ForgeError::Requirements(Box::new(err))
    }
}

impl From<ToolchainError> for ForgeError {
    fn from(err: ToolchainError) -> Self {
        ForgeError::Toolchain(Box::new(err))
    }
}

impl From<InstallError> for ForgeError {
    fn from(err: InstallError) -> Self {
        ForgeError::Install(Box::new(err))
    }
}

impl From<ConfigError> for ForgeError {
    fn from(err: ConfigError) -> Self {
        ForgeError::Config(Box::new(err))
    }
}

impl From<ProcessError> for ForgeError {
    fn from(err: ProcessError) -> Self {
        ForgeError::Process(Box::new(err))
    }
}
