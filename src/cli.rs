// CLI interface for polyforge using clap
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};

use crate::error::{RequirementsError, Result};
use crate::orchestrator::ToolchainOrchestrator;
use crate::process::SystemProcessRunner;
use crate::requirements::{Channel, LanguageId, PackageSpec, RequirementSet};

#[derive(Parser)]
#[command(
    name = "polyforge",
    about = "polyforge - a multi-language project toolchain orchestrator",
    version = crate::VERSION,
    long_about = "polyforge sets up coordinated development environments for Rust, Python, Node.js and Solidity projects: manifests, skeletons, dependency installs and cross-language build configuration in one transactional run."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Control color output (auto, always, never)
    #[arg(long, global = true, value_name = "WHEN")]
    pub color: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ChannelArg {
    Stable,
    Nightly,
}

impl From<ChannelArg> for Channel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Stable => Channel::Stable,
            ChannelArg::Nightly => Channel::Nightly,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up project toolchains in the given directory
    Setup {
        /// Project directory (must be empty or not yet exist)
        path: PathBuf,

        /// Languages to set up (python, rust, solidity, nodejs, react, web3)
        #[arg(short, long, value_name = "LANG", num_args = 1..)]
        language: Vec<String>,

        /// Extra dependencies as name or name@version
        #[arg(short, long, value_name = "PKG")]
        dependency: Vec<String>,

        /// Optional feature flags recorded in manifests
        #[arg(short, long, value_name = "FEATURE")]
        feature: Vec<String>,

        /// Requirements file to load instead of command-line flags
        #[arg(long, value_name = "FILE")]
        requirements: Option<PathBuf>,

        /// Rust toolchain channel
        #[arg(long, value_enum, default_value = "stable")]
        channel: ChannelArg,

        /// Optimization level recorded in build configuration
        #[arg(long, default_value = "2")]
        opt_level: u8,
    },

    /// Validate a requirements file without touching the filesystem
    Validate {
        /// Requirements file to check
        #[arg(long, value_name = "FILE", default_value = "polyforge.yaml")]
        requirements: PathBuf,
    },

    /// Generate shell completion scripts
    GenerateCompletion {
        /// Shell to generate completion for
        shell: Shell,
    },
}

impl Cli {
    pub fn run(&self) -> Result<i32> {
        self.init_logging();

        match &self.command {
            Some(Commands::Setup {
                path,
                language,
                dependency,
                feature,
                requirements,
                channel,
                opt_level,
            }) => {
                let requirement_set = match requirements {
                    Some(file) => RequirementSet::load_file(file)?,
                    None => build_requirements(language, dependency, feature, *channel, *opt_level)?,
                };

                let runtime = tokio::runtime::Runtime::new().map_err(|e| {
                    crate::error::ProcessError::SpawnFailed {
                        command: "tokio runtime".to_string(),
                        error: e.to_string(),
                    }
                })?;

                let runner = Arc::new(SystemProcessRunner::new());
                let orchestrator = ToolchainOrchestrator::new(runner);
                let result =
                    runtime.block_on(orchestrator.setup_project_toolchains(path, &requirement_set))?;

                if !self.quiet {
                    println!("Project ready at {}", path.display());
                    println!(
                        "Build order: {}",
                        result
                            .integration
                            .build_order
                            .iter()
                            .map(|l| l.as_str())
                            .collect::<Vec<_>>()
                            .join(" -> ")
                    );
                    for (check, passed) in &result.verification {
                        println!("  {} {}", if *passed { "ok " } else { "FAIL" }, check);
                    }
                }

                let failures = result.verification_failures();
                for failure in &failures {
                    eprintln!("Warning: {failure}");
                }
                Ok(if failures.is_empty() { 0 } else { 1 })
            }
            Some(Commands::Validate { requirements }) => {
                let requirement_set = RequirementSet::load_file(requirements)?;
                requirement_set.validate()?;
                if !self.quiet {
                    println!(
                        "{} is valid ({} languages, {} dependencies)",
                        requirements.display(),
                        requirement_set.languages.len(),
                        requirement_set.dependencies.len()
                    );
                }
                Ok(0)
            }
            Some(Commands::GenerateCompletion { shell }) => {
                let mut cmd = Self::command();
                let name = cmd.get_name().to_string();
                generate(*shell, &mut cmd, name, &mut std::io::stdout());
                Ok(0)
            }
            None => {
                Self::command()
                    .print_help()
                    .map_err(|e| crate::error::ConfigError::IOError {
                        message: e.to_string(),
                        path: None,
                    })?;
                Ok(0)
            }
        }
    }

    fn init_logging(&self) {
        use crate::logging::{init_logging, LogConfig};

        let log_config = LogConfig::from_cli(self.verbose, self.quiet, self.color.clone());

        if let Err(e) = init_logging(log_config) {
            eprintln!("Failed to initialize logging: {e}");
            // Continue execution even if logging fails
        }
    }
}

fn build_requirements(
    languages: &[String],
    dependencies: &[String],
    features: &[String],
    channel: ChannelArg,
    opt_level: u8,
) -> Result<RequirementSet> {
    let mut parsed_languages = Vec::with_capacity(languages.len());
    for raw in languages {
        parsed_languages.push(LanguageId::from_str(raw)?);
    }

    let mut requirement_set = RequirementSet::new(parsed_languages);
    requirement_set.options.channel = channel.into();
    requirement_set.options.optimization_level = opt_level;
    requirement_set.features = features.iter().cloned().collect();
    requirement_set.options.features = requirement_set.features.clone();

    for raw in dependencies {
        requirement_set.dependencies.push(parse_dependency(raw)?);
    }

    requirement_set.validate()?;
    Ok(requirement_set)
}

/// Parse "name" or "name@version" into a package spec
fn parse_dependency(raw: &str) -> Result<PackageSpec> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RequirementsError::InvalidFile {
            message: "Empty dependency specifier".to_string(),
            file_path: None,
        }
        .into());
    }

    // "@scope/pkg@1.2.3" keeps the leading scope separator. The scan walks
    // char boundaries, so multi-byte package names are safe to slice.
    match trimmed.char_indices().skip(1).find(|(_, c)| *c == '@') {
        Some((index, _)) => {
            let (name, version) = trimmed.split_at(index);
            Ok(PackageSpec::new(name).with_version(&version[1..]))
        }
        None => Ok(PackageSpec::new(trimmed)),
    }
}
