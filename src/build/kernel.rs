//! Kernel workspace build.
//!
//! The kernel is built from `src/` against a JSON target description at
//! `src/.cargo/{target}.json`.
//!
//! ```rust,ignore
//! use aero_build::build::{kernel, Mode};
//!
//! let artifacts = kernel::build_kernel(&layout, &request, Mode::Build)?;
//! ```

use anyhow::Result;
use log::info;
use std::path::PathBuf;

use super::{ArtifactSet, Mode, TestStrategy, WorkspaceBuild};
use crate::layout::Layout;
use crate::request::BuildRequest;

pub const KERNEL_PACKAGE: &str = "aero_kernel";

pub fn kernel_build(layout: &Layout, request: &BuildRequest, mode: Mode) -> WorkspaceBuild {
    WorkspaceBuild {
        cargo: PathBuf::from("cargo"),
        workspace: layout.kernel_workspace(),
        mode,
        tests: TestStrategy::NoRun,
        release: request.release(),
        features: request.features.clone(),
        extra_args: vec![
            "--package".to_string(),
            KERNEL_PACKAGE.to_string(),
            "--target".to_string(),
            Layout::kernel_target_spec(&request.target),
        ],
    }
}

/// Build the kernel. `Ok(None)` when cargo reported failure.
pub fn build_kernel(
    layout: &Layout,
    request: &BuildRequest,
    mode: Mode,
) -> Result<Option<ArtifactSet>> {
    info!("building kernel for {}", request.target);
    kernel_build(layout, request, mode).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{test_request, Operation};

    #[test]
    fn test_kernel_args() {
        let layout = Layout::new("/aero");
        let mut request = test_request(Operation::FullBuild);
        request.features = vec!["ci".into()];

        let build = kernel_build(&layout, &request, Mode::Build);
        assert_eq!(build.workspace, PathBuf::from("/aero/src"));
        assert_eq!(
            build.args(),
            [
                "build",
                "--package",
                "aero_kernel",
                "--target",
                ".cargo/x86_64-aero_os.json",
                "--release",
                "--features",
                "ci"
            ]
        );
    }

    #[test]
    fn test_kernel_test_mode_uses_no_run() {
        let layout = Layout::new("/aero");
        let mut request = test_request(Operation::Test);
        request.debug = true;

        let args = kernel_build(&layout, &request, Mode::Test).args();
        assert_eq!(&args[..2], ["test", "--no-run"]);
        assert!(!args.contains(&"--release".to_string()));
    }
}
