//! Bootable ISO assembly.
//!
//! Assembly is never incremental: the ISO root is rebuilt from scratch on
//! every run. Each step depends on the previous one; the first failure stops
//! assembly and leaves the scratch directories for the next run to recreate.

use anyhow::Result;
use log::{error, info};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::filesystem::{copy_file, recreate_dir};
use super::{cpio, disk, initramfs, limine};
use crate::error::PipelineError;
use crate::layout::{Layout, BACKGROUND_NAME, INITRAMFS_NAME, KERNEL_NAME};
use crate::process::{ensure_exists, Cmd};
use crate::request::FirmwareMode;

/// Arguments for `xorriso -as mkisofs` producing a hybrid BIOS/UEFI image
/// with a protective MBR.
pub fn xorriso_args(iso_root: &Path, iso: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-as",
        "mkisofs",
        "-b",
        limine::CD_BOOT_IMAGE,
        "-no-emul-boot",
        "-boot-load-size",
        "4",
        "-boot-info-table",
        "--efi-boot",
        limine::EFI_BOOT_IMAGE,
        "-efi-boot-part",
        "--efi-boot-image",
        "--protective-msdos-label",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(iso_root.as_os_str().to_os_string());
    args.push("-o".into());
    args.push(iso.as_os_str().to_os_string());
    args
}

/// Every input must exist before anything is touched.
fn check_inputs(kernel: &Path, user_artifacts: &[PathBuf]) -> Result<()> {
    ensure_exists(kernel, "kernel executable")?;
    for artifact in user_artifacts {
        ensure_exists(artifact, "userland executable")?;
    }
    Ok(())
}

/// Copy freshly built userland executables into the sysroot's `usr/bin`.
/// The sysroot keeps them for later builds.
pub fn install_user_artifacts(layout: &Layout, user_artifacts: &[PathBuf]) -> Result<()> {
    let bin = layout.system_root().join("usr").join("bin");
    for artifact in user_artifacts {
        let name = artifact
            .file_name()
            .ok_or_else(|| PipelineError::MissingArtifact(artifact.clone()))?;
        copy_file(artifact, &bin.join(name))?;
    }
    Ok(())
}

fn build_iso_root(
    layout: &Layout,
    kernel: &Path,
    user_artifacts: &[PathBuf],
    firmware: FirmwareMode,
) -> Result<PathBuf> {
    let iso_root = layout.iso_root();
    recreate_dir(&iso_root)?;

    copy_file(kernel, &iso_root.join(KERNEL_NAME))?;
    copy_file(&layout.background_image(), &iso_root.join(BACKGROUND_NAME))?;
    limine::copy_boot_files(&layout.limine_dir(), &iso_root, firmware)?;

    install_user_artifacts(layout, user_artifacts)?;

    let initramfs_root = initramfs::populate(layout)?;
    let files = initramfs::find_regular_files(&initramfs_root)?;
    cpio::archive_list(&initramfs_root, &files, &iso_root.join(INITRAMFS_NAME))?;

    limine::write_config(&iso_root)?;
    Ok(iso_root)
}

fn master_iso(iso_root: &Path, iso: &Path) -> Result<()> {
    Cmd::new("xorriso")
        .args(xorriso_args(iso_root, iso))
        .error_msg("Failed to create the ISO image")
        .run()?;
    Ok(())
}

/// Log a stage failure and turn it into the `None` sentinel. Only an
/// installer build failure is passed up as an error.
fn stage<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            if let Some(PipelineError::InstallerBuild { .. }) = err.downcast_ref::<PipelineError>() {
                return Err(err);
            }
            error!("{:#}", err);
            if let Some(PipelineError::ToolInvocation { stderr, .. }) =
                err.downcast_ref::<PipelineError>()
            {
                if !stderr.trim().is_empty() {
                    error!("{}", stderr.trim_end());
                }
            }
            Ok(None)
        }
    }
}

/// Assemble `build/aero.iso` from the kernel and userland executables.
///
/// Returns `Ok(None)` when any step fails, including a missing input.
/// `Err` is reserved for [`PipelineError::InstallerBuild`].
pub fn assemble(
    layout: &Layout,
    kernel: &Path,
    user_artifacts: &[PathBuf],
    firmware: FirmwareMode,
) -> Result<Option<PathBuf>> {
    if stage(check_inputs(kernel, user_artifacts))?.is_none() {
        return Ok(None);
    }

    info!("assembling {}", layout.iso_path().display());
    let iso_root = match stage(build_iso_root(layout, kernel, user_artifacts, firmware))? {
        Some(root) => root,
        None => return Ok(None),
    };

    let iso = layout.iso_path();
    if stage(master_iso(&iso_root, &iso))?.is_none() {
        return Ok(None);
    }

    let installer = match stage(limine::ensure_installer(&layout.limine_dir()))? {
        Some(installer) => installer,
        None => return Ok(None),
    };
    if stage(limine::install(&installer, &iso))?.is_none() {
        return Ok(None);
    }

    if stage(disk::ensure_disk_image(layout))?.is_none() {
        return Ok(None);
    }

    Ok(Some(iso))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_kernel_fails_before_touching_anything() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        let user = temp.path().join("init");
        fs::write(&user, "").unwrap();

        let result = assemble(
            &layout,
            &temp.path().join("missing/aero_kernel"),
            &[user],
            FirmwareMode::Legacy,
        )
        .unwrap();

        assert!(result.is_none());
        assert!(!layout.iso_root().exists());
        assert!(!layout.system_root().exists());
    }

    #[test]
    fn test_missing_user_artifact_fails() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        let kernel = temp.path().join("aero_kernel");
        fs::write(&kernel, "").unwrap();

        let result = assemble(
            &layout,
            &kernel,
            &[temp.path().join("gone")],
            FirmwareMode::Legacy,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_missing_bootloader_checkout_stops_assembly() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        let kernel = temp.path().join("aero_kernel");
        fs::write(&kernel, "elf").unwrap();
        fs::create_dir_all(layout.background_image().parent().unwrap()).unwrap();
        fs::write(layout.background_image(), "bmp").unwrap();

        let result = assemble(&layout, &kernel, &[], FirmwareMode::Legacy).unwrap();

        assert!(result.is_none());
        assert_eq!(
            fs::read_to_string(layout.iso_root().join(KERNEL_NAME)).unwrap(),
            "elf"
        );
        assert!(!layout.iso_path().exists());
    }

    #[test]
    fn test_install_user_artifacts() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        let built = temp.path().join("userland/target/release/init");
        fs::create_dir_all(built.parent().unwrap()).unwrap();
        fs::write(&built, "init").unwrap();

        install_user_artifacts(&layout, &[built]).unwrap();

        assert_eq!(
            fs::read_to_string(layout.system_root().join("usr/bin/init")).unwrap(),
            "init"
        );
    }

    #[test]
    fn test_xorriso_args() {
        let args = xorriso_args(Path::new("build/iso_root"), Path::new("build/aero.iso"));
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args.join(" "),
            "-as mkisofs -b limine-cd.bin -no-emul-boot -boot-load-size 4 -boot-info-table \
             --efi-boot limine-cd-efi.bin -efi-boot-part --efi-boot-image \
             --protective-msdos-label build/iso_root -o build/aero.iso"
        );
    }

    #[test]
    fn test_stage_passes_installer_build_up() {
        let err: Result<()> = Err(PipelineError::InstallerBuild {
            stderr: String::new(),
        }
        .into());
        assert!(stage(err).is_err());

        let err: Result<()> = Err(PipelineError::MissingArtifact(PathBuf::from("x")).into());
        assert!(stage(err).unwrap().is_none());
    }
}
