//! Workspace build driver.
//!
//! This module provides:
//! - [`Mode`] - the closed set of build modes and their cargo subcommands
//! - [`WorkspaceBuild`] - one two-pass cargo invocation against a workspace
//! - [`artifacts`] - executable extraction from cargo's JSON message stream
//! - [`kernel`] / [`userland`] - the two workspaces of the tree
//!
//! Every build runs cargo twice. The first pass prints human readable
//! diagnostics and decides success. Only after it succeeds is the same
//! command repeated with `--message-format=json` to collect the produced
//! executables; that pass is silent.

pub mod artifacts;
pub mod kernel;
pub mod userland;

use anyhow::{Context, Result};
use log::{debug, error};
use std::path::PathBuf;

use crate::process::Cmd;
use crate::request::Operation;

pub use artifacts::{extract_artifacts, ArtifactSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Build,
    Check,
    Test,
    Document,
}

impl Mode {
    pub fn for_operation(operation: Operation) -> Self {
        match operation {
            Operation::Check => Mode::Check,
            Operation::Test => Mode::Test,
            Operation::Document => Mode::Document,
            _ => Mode::Build,
        }
    }

    /// Cargo subcommand and the flags the mode implies.
    pub fn subcommand_args(self, tests: TestStrategy) -> Vec<String> {
        let args: Vec<&str> = match (self, tests) {
            (Mode::Build, _) => vec!["build"],
            (Mode::Check, _) => vec!["check"],
            (Mode::Document, _) => vec!["doc"],
            (Mode::Test, TestStrategy::NoRun) => vec!["test", "--no-run"],
            (Mode::Test, TestStrategy::Package(package)) => vec!["build", "--package", package],
        };
        args.into_iter().map(String::from).collect()
    }
}

/// How a workspace produces its test binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStrategy {
    /// `cargo test --no-run`.
    NoRun,
    /// Build a dedicated test package.
    Package(&'static str),
}

/// A fully described cargo invocation against one workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceBuild {
    pub cargo: PathBuf,
    pub workspace: PathBuf,
    pub mode: Mode,
    pub tests: TestStrategy,
    pub release: bool,
    pub features: Vec<String>,
    /// Workspace specific arguments (package, target, config overrides).
    pub extra_args: Vec<String>,
}

impl WorkspaceBuild {
    pub fn args(&self) -> Vec<String> {
        let mut args = self.mode.subcommand_args(self.tests);
        args.extend(self.extra_args.iter().cloned());
        if self.release {
            args.push("--release".to_string());
        }
        if !self.features.is_empty() {
            args.push("--features".to_string());
            args.push(self.features.join(","));
        }
        args
    }

    /// Run both passes. `Ok(None)` means the human readable pass failed.
    pub fn run(&self) -> Result<Option<ArtifactSet>> {
        let args = self.args();

        let status = Cmd::new(&self.cargo)
            .args(&args)
            .dir(&self.workspace)
            .status()
            .with_context(|| format!("failed to execute '{}'", self.cargo.display()))?;

        if !status.success() {
            error!(
                "cargo {} failed in {}",
                args[0],
                self.workspace.display()
            );
            return Ok(None);
        }

        let result = Cmd::new(&self.cargo)
            .args(&args)
            .arg("--message-format=json")
            .dir(&self.workspace)
            .discard_stderr()
            .allow_fail()
            .run()?;

        if !result.success() {
            error!(
                "cargo {} --message-format=json failed in {}",
                args[0],
                self.workspace.display()
            );
            return Ok(None);
        }

        let artifacts = extract_artifacts(&result.stdout);
        debug!(
            "{} executable(s) from {}",
            artifacts.len(),
            self.workspace.display()
        );
        Ok(Some(artifacts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(mode: Mode, tests: TestStrategy) -> WorkspaceBuild {
        WorkspaceBuild {
            cargo: PathBuf::from("cargo"),
            workspace: PathBuf::from("src"),
            mode,
            tests,
            release: true,
            features: vec!["ci".into(), "kmemleak".into()],
            extra_args: vec!["--package".into(), "aero_kernel".into()],
        }
    }

    #[test]
    fn test_mode_table() {
        assert_eq!(Mode::Build.subcommand_args(TestStrategy::NoRun), ["build"]);
        assert_eq!(Mode::Check.subcommand_args(TestStrategy::NoRun), ["check"]);
        assert_eq!(Mode::Document.subcommand_args(TestStrategy::NoRun), ["doc"]);
        assert_eq!(
            Mode::Test.subcommand_args(TestStrategy::NoRun),
            ["test", "--no-run"]
        );
        assert_eq!(
            Mode::Test.subcommand_args(TestStrategy::Package("utest")),
            ["build", "--package", "utest"]
        );
    }

    #[test]
    fn test_mode_for_operation() {
        assert_eq!(Mode::for_operation(Operation::Test), Mode::Test);
        assert_eq!(Mode::for_operation(Operation::FullBuild), Mode::Build);
        assert_eq!(Mode::for_operation(Operation::RunWithoutRebuild), Mode::Build);
    }

    #[test]
    fn test_args_order() {
        let build = sample(Mode::Check, TestStrategy::NoRun);
        assert_eq!(
            build.args(),
            [
                "check",
                "--package",
                "aero_kernel",
                "--release",
                "--features",
                "ci,kmemleak"
            ]
        );
    }

    #[test]
    fn test_debug_build_has_no_release_flag() {
        let mut build = sample(Mode::Build, TestStrategy::NoRun);
        build.release = false;
        build.features.clear();
        assert_eq!(build.args(), ["build", "--package", "aero_kernel"]);
    }

    #[test]
    fn test_failed_first_pass_returns_none() {
        let temp = tempfile::TempDir::new().unwrap();
        let build = WorkspaceBuild {
            cargo: PathBuf::from("false"),
            workspace: temp.path().to_path_buf(),
            mode: Mode::Build,
            tests: TestStrategy::NoRun,
            release: false,
            features: Vec::new(),
            extra_args: Vec::new(),
        };
        assert!(build.run().unwrap().is_none());
    }

    #[test]
    fn test_second_pass_collects_executables() {
        use std::os::unix::fs::PermissionsExt;

        // Stand-in cargo: silent for the human pass, prints records when
        // asked for JSON.
        let temp = tempfile::TempDir::new().unwrap();
        let fake = temp.path().join("fake-cargo");
        std::fs::write(
            &fake,
            "#!/bin/sh\n\
             for a in \"$@\"; do\n\
               if [ \"$a\" = \"--message-format=json\" ]; then\n\
                 echo '{\"reason\":\"compiler-artifact\",\"executable\":\"/w/init\"}'\n\
                 echo '{\"reason\":\"build-finished\",\"success\":true}'\n\
               fi\n\
             done\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let build = WorkspaceBuild {
            cargo: fake,
            workspace: temp.path().to_path_buf(),
            mode: Mode::Build,
            tests: TestStrategy::NoRun,
            release: true,
            features: Vec::new(),
            extra_args: Vec::new(),
        };
        let artifacts = build.run().unwrap().unwrap();
        assert_eq!(artifacts, [PathBuf::from("/w/init")]);
    }
}
