//! Top-level pipeline state machine.
//!
//! One [`Operation`] selects one path through the stages. Paths are
//! one-shot: the first failing stage ends the run and no later stage is
//! attempted.
//!
//! Stages are reached through the [`Stages`] trait so the sequencing can be
//! exercised without cargo, xorriso or qemu. [`HostStages`] is the real
//! implementation.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::artifact;
use crate::assets;
use crate::build::{kernel, userland, ArtifactSet, Mode};
use crate::capability;
use crate::docs;
use crate::layout::Layout;
use crate::preflight;
use crate::qemu;
use crate::request::{Arch, BuildRequest, FirmwareMode, Operation};
use crate::sysroot;

/// How a run ended when no hard error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Cleaned,
    SysrootReady,
    AssetsUpdated,
    Documented(PathBuf),
    /// Check or test builds finished.
    Verified,
    ImageBuilt(PathBuf),
    Launched(PathBuf),
    /// A workspace build or the image assembly failed.
    BuildFailed,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::BuildFailed)
    }
}

/// The side-effecting stages the orchestrator sequences.
pub trait Stages {
    fn preflight(&mut self) -> Result<()>;
    fn ensure_assets(&mut self) -> Result<()>;
    fn update_assets(&mut self) -> Result<()>;
    fn ensure_sysroot(&mut self) -> Result<()>;
    fn bootstrap_sysroot(&mut self, minimal: bool) -> Result<()>;
    fn build_userland(&mut self, mode: Mode) -> Result<Option<ArtifactSet>>;
    fn build_kernel(&mut self, mode: Mode) -> Result<Option<ArtifactSet>>;
    fn assemble(&mut self, kernel: &Path, user: &[PathBuf]) -> Result<Option<PathBuf>>;
    fn launch(&mut self, iso: &Path) -> Result<()>;
    fn clean(&mut self) -> Result<()>;
    fn publish_docs(&mut self) -> Result<PathBuf>;
    fn existing_iso(&self) -> Option<PathBuf>;
}

/// Run the operation selected by `request`.
pub fn run(stages: &mut impl Stages, request: &BuildRequest) -> Result<Outcome> {
    match request.operation {
        Operation::Clean => {
            stages.clean()?;
            Ok(Outcome::Cleaned)
        }
        Operation::SysrootOnly => {
            stages.bootstrap_sysroot(false)?;
            Ok(Outcome::SysrootReady)
        }
        Operation::UpdateAssets => {
            stages.update_assets()?;
            Ok(Outcome::AssetsUpdated)
        }
        Operation::Document => document(stages),
        Operation::Check | Operation::Test => {
            check_or_test(stages, Mode::for_operation(request.operation))
        }
        Operation::RunWithoutRebuild => only_run(stages, request),
        Operation::FullBuild => full_build(stages, request),
    }
}

fn document(stages: &mut impl Stages) -> Result<Outcome> {
    stages.ensure_sysroot()?;
    if stages.build_kernel(Mode::Document)?.is_none() {
        return Ok(Outcome::BuildFailed);
    }
    let out = stages.publish_docs()?;
    Ok(Outcome::Documented(out))
}

fn check_or_test(stages: &mut impl Stages, mode: Mode) -> Result<Outcome> {
    stages.ensure_sysroot()?;
    if stages.build_userland(mode)?.is_none() {
        return Ok(Outcome::BuildFailed);
    }
    if stages.build_kernel(mode)?.is_none() {
        return Ok(Outcome::BuildFailed);
    }
    Ok(Outcome::Verified)
}

/// Launch the existing ISO, or build one first when there is none. A
/// present ISO is never checked for staleness. UEFI boots still need the
/// firmware image, so the asset cache is checked first.
fn only_run(stages: &mut impl Stages, request: &BuildRequest) -> Result<Outcome> {
    match stages.existing_iso() {
        Some(iso) => {
            info!("running existing {}", iso.display());
            if request.firmware == FirmwareMode::Uefi {
                stages.ensure_assets()?;
            }
            stages.launch(&iso)?;
            Ok(Outcome::Launched(iso))
        }
        None => {
            info!("no image built yet, running a full build first");
            full_build(stages, request)
        }
    }
}

fn full_build(stages: &mut impl Stages, request: &BuildRequest) -> Result<Outcome> {
    let started = Instant::now();
    stages.preflight()?;
    stages.ensure_assets()?;
    stages.ensure_sysroot()?;

    let user = match stages.build_userland(Mode::Build)? {
        Some(set) if !set.is_empty() => set,
        _ => {
            error!("userland build failed");
            return Ok(Outcome::BuildFailed);
        }
    };

    let kernel = match stages.build_kernel(Mode::Build)? {
        Some(set) if !set.is_empty() => set[0].clone(),
        _ => {
            error!("kernel build failed");
            return Ok(Outcome::BuildFailed);
        }
    };
    debug!("kernel executable {}", kernel.display());

    let iso = match stages.assemble(&kernel, &user)? {
        Some(iso) => iso,
        None => return Ok(Outcome::BuildFailed),
    };
    info!("build took {:?}", started.elapsed());

    if request.no_run {
        return Ok(Outcome::ImageBuilt(iso));
    }
    stages.launch(&iso)?;
    Ok(Outcome::Launched(iso))
}

/// Stages backed by the real tools.
pub struct HostStages<'a> {
    layout: &'a Layout,
    request: &'a BuildRequest,
}

impl<'a> HostStages<'a> {
    pub fn new(layout: &'a Layout, request: &'a BuildRequest) -> Self {
        Self { layout, request }
    }
}

impl Stages for HostStages<'_> {
    fn preflight(&mut self) -> Result<()> {
        preflight::check_pipeline_tools(self.request)
    }

    fn ensure_assets(&mut self) -> Result<()> {
        match Arch::from_target(&self.request.target) {
            Ok(arch) => assets::ensure_bundled(self.layout, arch),
            Err(e) => {
                // Fatal later, when the emulator command is assembled.
                warn!("{}, no firmware will be fetched", e);
                assets::clone_limine(&self.layout.limine_dir())
            }
        }
    }

    fn update_assets(&mut self) -> Result<()> {
        let arch = match Arch::from_target(&self.request.target) {
            Ok(arch) => Some(arch),
            Err(e) => {
                warn!("{}, no firmware will be fetched", e);
                None
            }
        };
        assets::update_bundled(self.layout, arch)
    }

    fn ensure_sysroot(&mut self) -> Result<()> {
        Ok(sysroot::ensure_minimal(self.layout)?)
    }

    fn bootstrap_sysroot(&mut self, minimal: bool) -> Result<()> {
        Ok(sysroot::bootstrap(self.layout, minimal)?)
    }

    fn build_userland(&mut self, mode: Mode) -> Result<Option<ArtifactSet>> {
        userland::build_userland(self.layout, self.request, mode)
    }

    fn build_kernel(&mut self, mode: Mode) -> Result<Option<ArtifactSet>> {
        kernel::build_kernel(self.layout, self.request, mode)
    }

    fn assemble(&mut self, kernel: &Path, user: &[PathBuf]) -> Result<Option<PathBuf>> {
        artifact::assemble(self.layout, kernel, user, self.request.firmware)
    }

    fn launch(&mut self, iso: &Path) -> Result<()> {
        let report = capability::detect();
        qemu::launch(self.layout, iso, &report, self.request)
    }

    fn clean(&mut self) -> Result<()> {
        clean(self.layout, &self.request.target)
    }

    fn publish_docs(&mut self) -> Result<PathBuf> {
        docs::publish_docs(self.layout, &self.request.target)
    }

    fn existing_iso(&self) -> Option<PathBuf> {
        let iso = self.layout.iso_path();
        iso.exists().then_some(iso)
    }
}

/// Remove the kernel and userland cargo output. The sysroot is kept.
pub fn clean(layout: &Layout, target: &str) -> Result<()> {
    for dir in [layout.kernel_target_dir(target), layout.userland_target_dir()] {
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("removing '{}'", dir.display()))?;
            info!("removed {}", dir.display());
        }
    }
    Ok(())
}
