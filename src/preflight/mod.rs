//! Preflight checks for build validation.
//!
//! Validates that the host has the tools a full build drives before the
//! first stage runs, so a missing `xorriso` is reported up front and not
//! after a twenty minute kernel build.
//!
//! # Example
//!
//! ```rust
//! use aero_build::preflight::{command_exists, check_required_tools};
//!
//! if !command_exists("xorriso") {
//!     println!("xorriso not installed");
//! }
//!
//! let tools = &[("cpio", "cpio"), ("git", "git")];
//! if let Err(e) = check_required_tools(tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Result};

use crate::request::{Arch, BuildRequest};

/// Check if a command exists on PATH.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Tools every image build needs.
///
/// Each tuple is (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("cargo", "rustup"),
    ("git", "git"),
    ("xorriso", "xorriso"),
    ("cpio", "cpio"),
    ("make", "make"),
];

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools<S: AsRef<str>>(tools: &[(S, &str)]) -> Result<()> {
    let missing: Vec<String> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool.as_ref()))
        .map(|(tool, package)| format!("  {} (install: {})", tool.as_ref(), package))
        .collect();

    if !missing.is_empty() {
        bail!("Missing required host tools:\n{}", missing.join("\n"));
    }

    Ok(())
}

/// Tools a full build of `request` will invoke.
pub fn pipeline_tools(request: &BuildRequest) -> Vec<(String, &'static str)> {
    let mut tools: Vec<(String, &'static str)> = REQUIRED_TOOLS
        .iter()
        .map(|(tool, package)| (tool.to_string(), *package))
        .collect();

    if !request.no_run {
        if let Ok(arch) = Arch::from_target(&request.target) {
            tools.push((format!("qemu-system-{}", arch.as_str()), "qemu"));
        }
    }
    tools
}

/// Check every tool in [`pipeline_tools`].
pub fn check_pipeline_tools(request: &BuildRequest) -> Result<()> {
    check_required_tools(&pipeline_tools(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{test_request, Operation};

    #[test]
    fn test_command_exists() {
        assert!(command_exists("ls"));
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_check_required_tools_success() {
        let tools = &[("ls", "coreutils"), ("cat", "coreutils")];
        assert!(check_required_tools(tools).is_ok());
    }

    #[test]
    fn test_check_required_tools_lists_every_missing_tool() {
        let tools = &[
            ("nonexistent_command_xyz", "fake-package"),
            ("ls", "coreutils"),
            ("nonexistent_command_abc", "other-package"),
        ];
        let msg = check_required_tools(tools).unwrap_err().to_string();
        assert!(msg.contains("nonexistent_command_xyz (install: fake-package)"));
        assert!(msg.contains("nonexistent_command_abc (install: other-package)"));
        assert!(!msg.contains("ls (install"));
    }

    #[test]
    fn test_pipeline_tools_include_emulator_unless_no_run() {
        let mut request = test_request(Operation::FullBuild);
        let tools = pipeline_tools(&request);
        assert!(tools.iter().any(|(t, _)| t == "qemu-system-x86_64"));

        request.no_run = true;
        let tools = pipeline_tools(&request);
        assert!(!tools.iter().any(|(t, _)| t.starts_with("qemu-system")));
        assert!(tools.iter().any(|(t, _)| t == "xorriso"));
    }
}
