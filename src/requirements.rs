// Requirement set model: which languages to set up, which packages to
// install, and the recognized per-toolchain options.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{RequirementsError, Result};

/// The fixed set of supported language ecosystems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageId {
    Python,
    Rust,
    Solidity,
    Nodejs,
    React,
    Web3,
}

impl LanguageId {
    pub const ALL: [LanguageId; 6] = [
        LanguageId::Python,
        LanguageId::Rust,
        LanguageId::Solidity,
        LanguageId::Nodejs,
        LanguageId::React,
        LanguageId::Web3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageId::Python => "python",
            LanguageId::Rust => "rust",
            LanguageId::Solidity => "solidity",
            LanguageId::Nodejs => "nodejs",
            LanguageId::React => "react",
            LanguageId::Web3 => "web3",
        }
    }

    pub fn supported_names() -> Vec<String> {
        Self::ALL.iter().map(|lang| lang.as_str().to_string()).collect()
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageId {
    type Err = RequirementsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" => Ok(LanguageId::Python),
            "rust" => Ok(LanguageId::Rust),
            "solidity" => Ok(LanguageId::Solidity),
            "nodejs" | "node" => Ok(LanguageId::Nodejs),
            "react" => Ok(LanguageId::React),
            "web3" => Ok(LanguageId::Web3),
            other => Err(RequirementsError::UnsupportedLanguage {
                language: other.to_string(),
                supported: LanguageId::supported_names(),
            }),
        }
    }
}

/// Toolchain channel pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Stable,
    Nightly,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Stable => "stable",
            Channel::Nightly => "nightly",
        }
    }
}

/// Recognized per-language setup options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainOptions {
    #[serde(default)]
    pub channel: Channel,
    #[serde(default = "default_optimization_level")]
    pub optimization_level: u8,
    #[serde(default)]
    pub features: BTreeSet<String>,
    /// Per-invocation timeout for package manager subprocesses
    #[serde(default = "default_install_timeout", with = "duration_secs")]
    pub install_timeout: Duration,
}

fn default_optimization_level() -> u8 {
    2
}

fn default_install_timeout() -> Duration {
    Duration::from_secs(300)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

impl Default for ToolchainOptions {
    fn default() -> Self {
        Self {
            channel: Channel::Stable,
            optimization_level: default_optimization_level(),
            features: BTreeSet::new(),
            install_timeout: default_install_timeout(),
        }
    }
}

/// A declared dependency, partitioned into required vs development groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub group: DependencyGroup,
    /// Critical packages abort the setup when their install fails instead
    /// of being recorded and skipped.
    #[serde(default)]
    pub critical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DependencyGroup {
    #[default]
    Required,
    Development,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            group: DependencyGroup::Required,
            critical: false,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn development(mut self) -> Self {
        self.group = DependencyGroup::Development;
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }
}

/// The orchestration input: languages in caller order, shared dependencies,
/// and feature flags. Input-only; never mutated by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RequirementSet {
    pub languages: Vec<LanguageId>,
    #[serde(default)]
    pub dependencies: Vec<PackageSpec>,
    #[serde(default)]
    pub features: BTreeSet<String>,
    #[serde(default)]
    pub options: ToolchainOptions,
}

impl RequirementSet {
    pub fn new(languages: Vec<LanguageId>) -> Self {
        Self {
            languages,
            dependencies: Vec::new(),
            features: BTreeSet::new(),
            options: ToolchainOptions::default(),
        }
    }

    /// Load a requirement set from a YAML file
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| RequirementsError::InvalidFile {
                message: format!("Failed to read requirements file: {e}"),
                file_path: Some(path.to_path_buf()),
            })?;

        let requirements: RequirementSet =
            serde_yaml::from_str(&contents).map_err(|e| RequirementsError::InvalidFile {
                message: format!("Invalid YAML: {e}"),
                file_path: Some(path.to_path_buf()),
            })?;

        requirements.validate()?;
        Ok(requirements)
    }

    /// Structural validation. Runs before any side effect; a failure here
    /// guarantees the project path is untouched.
    pub fn validate(&self) -> Result<()> {
        if self.languages.is_empty() {
            return Err(RequirementsError::EmptyLanguages.into());
        }

        let mut seen = BTreeSet::new();
        for language in &self.languages {
            if !seen.insert(*language) {
                return Err(RequirementsError::DuplicateLanguage {
                    language: language.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Dependencies split into (required, development)
    pub fn partitioned_dependencies(&self) -> (Vec<PackageSpec>, Vec<PackageSpec>) {
        self.dependencies
            .iter()
            .cloned()
            .partition(|pkg| pkg.group == DependencyGroup::Required)
    }
}
