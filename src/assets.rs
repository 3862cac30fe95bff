//! Bundled asset cache: UEFI firmware and the Limine binary release.
//!
//! Idempotent by presence. An asset that exists on disk is never fetched
//! again and its content is not verified; [`update_bundled`] is the way to
//! replace stale copies. Downloads and refreshed clones go to a `.part` path
//! that is renamed into place once complete, so an interrupted transfer never
//! leaves something that looks finished.

use anyhow::{Context, Result};
use log::{debug, info};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::artifact::filesystem::atomic_move;
use crate::layout::Layout;
use crate::process::Cmd;
use crate::request::Arch;

pub const OVMF_URL: &str = "https://github.com/rust-osdev/ovmf-prebuilt/releases/latest/download";
pub const LIMINE_URL: &str = "https://github.com/limine-bootloader/limine";
pub const LIMINE_BRANCH: &str = "v4.x-branch-binary";

/// Make sure the firmware image for `arch` and the Limine checkout exist.
pub fn ensure_bundled(layout: &Layout, arch: Arch) -> Result<()> {
    let ovmf_dir = layout.ovmf_dir();
    fs::create_dir_all(&ovmf_dir)
        .with_context(|| format!("creating bundled directory '{}'", ovmf_dir.display()))?;

    fetch_ovmf(&ovmf_dir, arch.firmware_file())?;
    clone_limine(&layout.limine_dir())?;
    Ok(())
}

/// Download `file` from the OVMF release into `dir` unless it is present.
pub fn fetch_ovmf(dir: &Path, file: &str) -> Result<PathBuf> {
    let target = dir.join(file);
    if target.exists() {
        debug!("bundled {} already downloaded", file);
        return Ok(target);
    }
    download(OVMF_URL, dir, file)
}

/// Download `{base_url}/{file}` into `dir`, replacing any existing copy.
///
/// The body goes to `<file>.part` first; the finished file only appears
/// under its real name once the transfer completed.
pub fn download(base_url: &str, dir: &Path, file: &str) -> Result<PathBuf> {
    let target = dir.join(file);
    let url = format!("{}/{}", base_url, file);
    info!("downloading {}", url);

    let partial = dir.join(format!("{}.part", file));
    let response = ureq::get(&url)
        .call()
        .with_context(|| format!("downloading '{}'", url))?;
    let mut reader = response.into_body().into_reader();
    let mut out = File::create(&partial)
        .with_context(|| format!("creating '{}'", partial.display()))?;
    io::copy(&mut reader, &mut out).with_context(|| format!("writing '{}'", partial.display()))?;
    out.sync_all()?;
    drop(out);

    atomic_move(&partial, &target)?;
    Ok(target)
}

/// Shallow clone of the Limine binary branch into `dest` unless present.
pub fn clone_limine(dest: &Path) -> Result<()> {
    if dest.exists() {
        debug!("bundled limine already cloned");
        return Ok(());
    }

    info!("cloning limine into {}", dest.display());
    limine_clone_cmd(LIMINE_URL, dest)
        .error_msg("git clone of limine failed. Install git and check network access.")
        .run_interactive()?;
    Ok(())
}

/// Replace the Limine checkout at `dest` with a fresh clone of `url`.
///
/// The clone lands in `<dest>.part` and only replaces `dest` once it
/// succeeded, so a failed refresh keeps the old checkout.
pub fn refresh_limine(url: &str, dest: &Path) -> Result<()> {
    let mut staging = dest.as_os_str().to_os_string();
    staging.push(".part");
    let staging = PathBuf::from(staging);
    if staging.exists() {
        fs::remove_dir_all(&staging)
            .with_context(|| format!("removing stale '{}'", staging.display()))?;
    }

    info!("refreshing limine in {}", dest.display());
    limine_clone_cmd(url, &staging)
        .error_msg("git clone of limine failed. Install git and check network access.")
        .run_interactive()?;

    if dest.exists() {
        fs::remove_dir_all(dest).with_context(|| format!("removing '{}'", dest.display()))?;
    }
    fs::rename(&staging, dest)
        .with_context(|| format!("moving '{}' into place", staging.display()))?;
    Ok(())
}

/// Fetch the firmware for `arch` and the Limine checkout again, even when
/// both are already present.
pub fn update_bundled(layout: &Layout, arch: Option<Arch>) -> Result<()> {
    let ovmf_dir = layout.ovmf_dir();
    fs::create_dir_all(&ovmf_dir)
        .with_context(|| format!("creating bundled directory '{}'", ovmf_dir.display()))?;

    if let Some(arch) = arch {
        download(OVMF_URL, &ovmf_dir, arch.firmware_file())?;
    }
    refresh_limine(LIMINE_URL, &layout.limine_dir())
}

fn limine_clone_cmd(url: &str, dest: &Path) -> Cmd {
    Cmd::new("git")
        .args(["clone", "--branch", LIMINE_BRANCH, "--depth", "1", url])
        .arg_path(dest)
}
