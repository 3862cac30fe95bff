//! Limine bootloader files, configuration and installer.

use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use super::filesystem::copy_file;
use crate::error::PipelineError;
use crate::process::Cmd;
use crate::request::FirmwareMode;

pub const CONFIG_NAME: &str = "limine.cfg";

pub const CONFIG_TEMPLATE: &str = r#"TIMEOUT=0
VERBOSE=yes

:aero
PROTOCOL=limine
KASLR=no
KERNEL_PATH=boot:///aero.elf
CMDLINE=term-background=background theme-background=0x50000000

MODULE_PATH=boot:///term_background.bmp
MODULE_CMDLINE=background

MODULE_PATH=boot:///initramfs.cpio
MODULE_CMDLINE=initramfs
"#;

/// Stage binaries placed at the ISO root. All are required.
pub const BOOT_FILES: &[&str] = &["limine.sys", "limine-cd.bin", "limine-cd-efi.bin"];

/// El Torito images referenced by xorriso, relative to the ISO root.
pub const CD_BOOT_IMAGE: &str = "limine-cd.bin";
pub const EFI_BOOT_IMAGE: &str = "limine-cd-efi.bin";

/// EFI loaders copied to `EFI/BOOT/`, one per architecture Limine supports.
pub const EFI_LOADERS: &[&str] = &["BOOTX64.EFI", "BOOTAA64.EFI"];

/// Copy the bootloader stages and EFI loaders into `iso_root`.
///
/// A missing EFI loader is fatal only for UEFI boots; for legacy boots it
/// is reported and skipped.
pub fn copy_boot_files(limine_dir: &Path, iso_root: &Path, firmware: FirmwareMode) -> Result<()> {
    for name in BOOT_FILES {
        copy_file(&limine_dir.join(name), &iso_root.join(name))?;
    }

    let efi_boot = iso_root.join("EFI").join("BOOT");
    for name in EFI_LOADERS {
        let src = limine_dir.join(name);
        if !src.exists() && firmware == FirmwareMode::Legacy {
            warn!("limine checkout has no {}, UEFI boot will not work", name);
            continue;
        }
        copy_file(&src, &efi_boot.join(name))?;
    }
    Ok(())
}

pub fn write_config(iso_root: &Path) -> Result<PathBuf> {
    let path = iso_root.join(CONFIG_NAME);
    fs::write(&path, CONFIG_TEMPLATE)
        .with_context(|| format!("writing bootloader config '{}'", path.display()))?;
    Ok(path)
}

/// Installer binary name for a host OS as reported by `std::env::consts::OS`.
pub fn installer_name(os: &str) -> &'static str {
    match os {
        "windows" => "limine-deploy.exe",
        _ => "limine-deploy",
    }
}

/// Path of the installer, building it from the checkout if it is missing.
///
/// A failed build is [`PipelineError::InstallerBuild`], which the caller
/// treats as fatal for the whole process.
pub fn ensure_installer(limine_dir: &Path) -> Result<PathBuf> {
    build_installer_with(limine_dir, "make")
}

fn build_installer_with(limine_dir: &Path, make: &str) -> Result<PathBuf> {
    let installer = limine_dir.join(installer_name(std::env::consts::OS));
    if installer.exists() {
        return Ok(installer);
    }

    info!("building {}", installer.display());
    let result = Cmd::new(make)
        .arg("-C")
        .arg_path(limine_dir)
        .allow_fail()
        .run()
        .map_err(|err| PipelineError::InstallerBuild {
            stderr: format!("{:#}", err),
        })?;
    if !result.success() {
        return Err(PipelineError::InstallerBuild {
            stderr: result.stderr,
        }
        .into());
    }
    Ok(installer)
}

/// Embed Limine's stage 2 into the finished ISO.
pub fn install(installer: &Path, iso: &Path) -> Result<()> {
    Cmd::new(installer)
        .arg_path(iso)
        .error_msg("Failed to install Limine")
        .run()?;
    Ok(())
}
