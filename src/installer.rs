// Dependency installation through external package manager binaries.
// Installs run one subprocess per package so partial failure is always
// attributable, and capture raw output for diagnostics.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{InstallError, ForgeError, ProcessError, Result};
use crate::process::{ProcessConfig, ProcessRunner};
use crate::requirements::{DependencyGroup, PackageSpec};

/// Invocation shape of one ecosystem's package manager
#[derive(Debug, Clone)]
pub struct PackageManagerCommand {
    /// Label used in reports and error messages ("cargo", "pip", "npm")
    pub manager: String,
    /// Binary to invoke
    pub binary: String,
    /// Arguments before the package name for a required install
    pub install_prefix: Vec<String>,
    /// Arguments before the package name for a development install.
    /// Falls back to install_prefix when the ecosystem has no dev group.
    pub dev_install_prefix: Option<Vec<String>>,
    /// Arguments before the package name for the best-effort version query
    pub version_query_prefix: Option<Vec<String>>,
    /// Separator between package name and pinned version ("@", "==")
    pub version_separator: String,
}

impl PackageManagerCommand {
    pub fn cargo() -> Self {
        Self {
            manager: "cargo".to_string(),
            binary: "cargo".to_string(),
            install_prefix: vec!["add".to_string()],
            dev_install_prefix: Some(vec!["add".to_string(), "--dev".to_string()]),
            version_query_prefix: Some(vec![
                "pkgid".to_string(),
                "--quiet".to_string(),
            ]),
            version_separator: "@".to_string(),
        }
    }

    pub fn pip(python_binary: impl Into<String>) -> Self {
        let python = python_binary.into();
        Self {
            manager: "pip".to_string(),
            binary: python.clone(),
            install_prefix: vec!["-m".to_string(), "pip".to_string(), "install".to_string()],
            dev_install_prefix: None,
            version_query_prefix: Some(vec![
                "-m".to_string(),
                "pip".to_string(),
                "show".to_string(),
            ]),
            version_separator: "==".to_string(),
        }
    }

    pub fn npm() -> Self {
        Self {
            manager: "npm".to_string(),
            binary: "npm".to_string(),
            install_prefix: vec!["install".to_string()],
            dev_install_prefix: Some(vec!["install".to_string(), "--save-dev".to_string()]),
            version_query_prefix: Some(vec!["list".to_string(), "--depth=0".to_string()]),
            version_separator: "@".to_string(),
        }
    }

    fn render_package_arg(&self, package: &PackageSpec) -> String {
        match &package.version {
            Some(version) => format!("{}{}{}", package.name, self.version_separator, version),
            None => package.name.clone(),
        }
    }
}

/// Outcome of one package's install attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStatus {
    Installed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PackageInstall {
    pub status: InstallStatus,
    /// Best-effort: a failed version probe leaves this absent without
    /// downgrading a successful install.
    pub version: Option<String>,
    /// Exit code of the install subprocess, when one ran to completion
    pub exit_code: Option<i32>,
    pub raw_output: String,
}

/// Per-package results of one install pass
#[derive(Debug, Default)]
pub struct InstallReport {
    pub packages: HashMap<String, PackageInstall>,
}

impl InstallReport {
    pub fn all_installed(&self) -> bool {
        self.packages
            .values()
            .all(|install| install.status == InstallStatus::Installed)
    }

    pub fn failed_packages(&self) -> Vec<&str> {
        self.packages
            .iter()
            .filter(|(_, install)| install.status == InstallStatus::Failed)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Installs named packages through an external package manager
pub struct DependencyInstaller {
    runner: Arc<dyn ProcessRunner>,
    command: PackageManagerCommand,
    timeout: Duration,
}

impl DependencyInstaller {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        command: PackageManagerCommand,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            command,
            timeout,
        }
    }

    pub fn manager_name(&self) -> &str {
        &self.command.manager
    }

    /// Install each package with its own subprocess. Failures for
    /// non-critical packages are recorded and iteration continues;
    /// a critical package failure propagates immediately.
    pub async fn install(
        &self,
        target_path: &Path,
        packages: &[PackageSpec],
    ) -> Result<InstallReport> {
        let mut report = InstallReport::default();

        for package in packages {
            let span =
                crate::logging::utils::install_span(&self.command.manager, &package.name);
            let _guard = span.enter();

            let install = match self.install_one(target_path, package).await {
                Ok(install) => install,
                Err(err) => {
                    if package.critical {
                        return Err(err);
                    }
                    // Runner-level failure (spawn, timeout) for an optional
                    // package: record it, keep going.
                    warn!(
                        package = %package.name,
                        error = %err,
                        "Package install failed"
                    );
                    PackageInstall {
                        status: InstallStatus::Failed,
                        version: None,
                        exit_code: None,
                        raw_output: err.to_string(),
                    }
                }
            };

            if install.status == InstallStatus::Failed && package.critical {
                return Err(InstallError::CommandFailed {
                    package: package.name.clone(),
                    manager: self.command.manager.clone(),
                    exit_code: install.exit_code,
                    stderr: install.raw_output,
                }
                .into());
            }

            report.packages.insert(package.name.clone(), install);
        }

        Ok(report)
    }

    async fn install_one(
        &self,
        target_path: &Path,
        package: &PackageSpec,
    ) -> Result<PackageInstall> {
        let prefix = match (package.group, &self.command.dev_install_prefix) {
            (DependencyGroup::Development, Some(dev_prefix)) => dev_prefix.clone(),
            _ => self.command.install_prefix.clone(),
        };

        let mut args = prefix;
        args.push(self.command.render_package_arg(package));

        let config = ProcessConfig::new(&self.command.binary)
            .with_args(args)
            .with_working_dir(target_path)
            .with_timeout(self.timeout);

        let result = match self.runner.run(config).await {
            Ok(result) => result,
            Err(ForgeError::Process(process_err)) => {
                // Timeouts become a per-package install error so the caller
                // sees which package hung.
                if let ProcessError::Timeout { duration, .. } = process_err.as_ref() {
                    return Err(InstallError::Timeout {
                        package: package.name.clone(),
                        duration: *duration,
                    }
                    .into());
                }
                return Err(ForgeError::Process(process_err));
            }
            Err(other) => return Err(other),
        };

        if !result.success() {
            debug!(
                package = %package.name,
                exit_code = ?result.exit_code,
                "Install command exited nonzero"
            );
            return Ok(PackageInstall {
                status: InstallStatus::Failed,
                version: None,
                exit_code: result.exit_code,
                raw_output: result.stderr,
            });
        }

        let version = self.probe_version(target_path, package).await;

        Ok(PackageInstall {
            status: InstallStatus::Installed,
            version,
            exit_code: result.exit_code,
            raw_output: result.stdout,
        })
    }

    /// Secondary query for the installed version. Best-effort only; any
    /// failure here leaves the version absent.
    async fn probe_version(&self, target_path: &Path, package: &PackageSpec) -> Option<String> {
        let prefix = self.command.version_query_prefix.as_ref()?;

        let mut args = prefix.clone();
        args.push(package.name.clone());

        let config = ProcessConfig::new(&self.command.binary)
            .with_args(args)
            .with_working_dir(target_path)
            .with_timeout(self.timeout);

        let result = self.runner.run(config).await.ok()?;
        if !result.success() {
            return None;
        }

        parse_version(&result.stdout)
    }
}

/// Pull the first dotted version number out of package manager output.
/// Full semver strings are normalized through the semver crate; bare
/// major.minor pairs pass through as captured.
pub fn parse_version(output: &str) -> Option<String> {
    let version_regex = regex::Regex::new(r"(\d+\.\d+(?:\.\d+)?(?:[-+][0-9A-Za-z.-]+)?)").ok()?;
    let candidate = version_regex
        .captures(output)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())?;

    match semver::Version::parse(&candidate) {
        Ok(version) => Some(version.to_string()),
        Err(_) => Some(candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::FakeProcessRunner;
    use tempfile::tempdir;

    fn installer_with(runner: Arc<FakeProcessRunner>) -> DependencyInstaller {
        DependencyInstaller::new(runner, PackageManagerCommand::npm(), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_install_reports_per_package() {
        let runner = Arc::new(FakeProcessRunner::new());
        let installer = installer_with(runner.clone());
        let dir = tempdir().unwrap();

        let report = installer
            .install(
                dir.path(),
                &[PackageSpec::new("express"), PackageSpec::new("lodash")],
            )
            .await
            .unwrap();

        assert!(report.all_installed());
        assert_eq!(report.packages.len(), 2);
        // One install subprocess per package, not batched
        assert_eq!(runner.invocation_count_matching("npm install express"), 1);
        assert_eq!(runner.invocation_count_matching("npm install lodash"), 1);
    }

    #[tokio::test]
    async fn test_noncritical_failure_is_recorded_not_raised() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.fail_matching("install left-pad", "E404 not found");
        let installer = installer_with(runner);
        let dir = tempdir().unwrap();

        let report = installer
            .install(
                dir.path(),
                &[PackageSpec::new("left-pad"), PackageSpec::new("express")],
            )
            .await
            .unwrap();

        assert!(!report.all_installed());
        assert_eq!(report.failed_packages(), vec!["left-pad"]);
        let failed = &report.packages["left-pad"];
        assert_eq!(failed.status, InstallStatus::Failed);
        assert!(failed.raw_output.contains("E404"));
        // The failure did not stop the next package
        assert_eq!(
            report.packages["express"].status,
            InstallStatus::Installed
        );
    }

    #[tokio::test]
    async fn test_critical_failure_propagates() {
        let runner = Arc::new(FakeProcessRunner::new());
        runner.fail_matching("install hardhat", "network unreachable");
        let installer = installer_with(runner);
        let dir = tempdir().unwrap();

        let err = installer
            .install(dir.path(), &[PackageSpec::new("hardhat").critical()])
            .await
            .unwrap_err();

        // The propagated error carries the observed exit code and stderr
        match err {
            crate::error::ForgeError::Install(install_err) => match *install_err {
                InstallError::CommandFailed {
                    ref package,
                    exit_code,
                    ref stderr,
                    ..
                } => {
                    assert_eq!(package, "hardhat");
                    assert_eq!(exit_code, Some(1));
                    assert!(stderr.contains("network unreachable"));
                }
                other => panic!("Expected CommandFailed, got {other:?}"),
            },
            other => panic!("Expected install error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dev_group_uses_dev_prefix() {
        let runner = Arc::new(FakeProcessRunner::new());
        let installer = installer_with(runner.clone());
        let dir = tempdir().unwrap();

        installer
            .install(dir.path(), &[PackageSpec::new("jest").development()])
            .await
            .unwrap();

        assert_eq!(
            runner.invocation_count_matching("npm install --save-dev jest"),
            1
        );
    }

    #[tokio::test]
    async fn test_version_probe_failure_keeps_install_success() {
        let runner = Arc::new(FakeProcessRunner::new());
        // Install succeeds; the follow-up version query fails
        runner.fail_matching("list --depth=0 express", "ELSPROBLEMS");
        let installer = installer_with(runner);
        let dir = tempdir().unwrap();

        let report = installer
            .install(dir.path(), &[PackageSpec::new("express")])
            .await
            .unwrap();

        let install = &report.packages["express"];
        assert_eq!(install.status, InstallStatus::Installed);
        assert!(install.version.is_none());
    }

    #[tokio::test]
    async fn test_version_pin_rendered_into_argument() {
        let runner = Arc::new(FakeProcessRunner::new());
        let installer = installer_with(runner.clone());
        let dir = tempdir().unwrap();

        installer
            .install(
                dir.path(),
                &[PackageSpec::new("react").with_version("18.2.0")],
            )
            .await
            .unwrap();

        assert_eq!(
            runner.invocation_count_matching("npm install react@18.2.0"),
            1
        );
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("npm 10.2.4"), Some("10.2.4".to_string()));
        assert_eq!(
            parse_version("Version: 2.31.0\nSummary: HTTP"),
            Some("2.31.0".to_string())
        );
        assert_eq!(parse_version("no digits here"), None);
    }
}
