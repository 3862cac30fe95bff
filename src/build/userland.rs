//! Userland workspace build with the sysroot's cross toolchain.

use anyhow::Result;
use log::{debug, info};
use std::path::{Path, PathBuf};

use super::{ArtifactSet, Mode, TestStrategy, WorkspaceBuild};
use crate::layout::Layout;
use crate::request::BuildRequest;

pub const USERLAND_TARGET: &str = "x86_64-unknown-aero-system";
pub const TEST_PACKAGE: &str = "utest";

const HOST_CARGO: &str = "host-cargo/bin/cargo";
const HOST_RUSTC: &str = "host-rust/bin/rustc";
const HOST_GCC: &str = "host-gcc/bin/x86_64-aero-gcc";
const HOST_BINUTILS: &str = "host-binutils/x86_64-aero/bin";
const MLIBC_PACKAGE: &str = "mlibc";

/// Tool paths inside the sysroot used to cross-compile the userland.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossToolchain {
    pub cargo: PathBuf,
    pub rustc: PathBuf,
    pub linker: PathBuf,
    pub binutils: PathBuf,
    pub libc_sysroot: PathBuf,
}

impl CrossToolchain {
    /// Resolve the toolchain from the sysroot. `None` when the sysroot has
    /// no host cargo built yet.
    pub fn discover(layout: &Layout) -> Option<Self> {
        let tools = layout.sysroot_tools();
        let cargo = tools.join(HOST_CARGO);
        if !cargo.exists() {
            return None;
        }
        Some(Self::at(&tools, &layout.sysroot_packages(), cargo))
    }

    fn at(tools: &Path, packages: &Path, cargo: PathBuf) -> Self {
        Self {
            cargo,
            rustc: tools.join(HOST_RUSTC),
            linker: tools.join(HOST_GCC),
            binutils: tools.join(HOST_BINUTILS),
            libc_sysroot: packages.join(MLIBC_PACKAGE),
        }
    }

    /// `--config` overrides that point cargo at the cross tools. Static,
    /// non-PIE linking against mlibc.
    pub fn cargo_args(&self) -> Vec<String> {
        vec![
            "--target".to_string(),
            USERLAND_TARGET.to_string(),
            "--config".to_string(),
            format!("build.rustc = '{}'", self.rustc.display()),
            "--config".to_string(),
            format!("build.target = '{}'", USERLAND_TARGET),
            "--config".to_string(),
            format!(
                "build.rustflags = ['-C', 'link-args=-no-pie -B {} --sysroot {}', '-lc']",
                self.binutils.display(),
                self.libc_sysroot.display()
            ),
            "--config".to_string(),
            format!(
                "target.{}.linker = '{}'",
                USERLAND_TARGET,
                self.linker.display()
            ),
            "-Z".to_string(),
            "unstable-options".to_string(),
        ]
    }
}

pub fn userland_build(
    layout: &Layout,
    request: &BuildRequest,
    mode: Mode,
    toolchain: Option<&CrossToolchain>,
) -> WorkspaceBuild {
    let (cargo, extra_args) = match toolchain {
        Some(tc) => (tc.cargo.clone(), tc.cargo_args()),
        None => (PathBuf::from("cargo"), Vec::new()),
    };

    WorkspaceBuild {
        cargo,
        workspace: layout.userland_workspace(),
        mode,
        tests: TestStrategy::Package(TEST_PACKAGE),
        release: request.release(),
        features: Vec::new(),
        extra_args,
    }
}

/// Build the userland. `Ok(None)` when cargo reported failure.
pub fn build_userland(
    layout: &Layout,
    request: &BuildRequest,
    mode: Mode,
) -> Result<Option<ArtifactSet>> {
    let toolchain = CrossToolchain::discover(layout);
    if toolchain.is_none() {
        debug!("no host-cargo in the sysroot, building userland with the host cargo");
    }
    info!("building userland");
    userland_build(layout, request, mode, toolchain.as_ref()).run()
}
