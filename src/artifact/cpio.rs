//! CPIO archive creation for the initramfs.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::process::Cmd;

/// Archive `files` (relative to `root`) into `output` in newc format.
///
/// The file list is fed to `cpio -o` on stdin and the archive is written
/// straight to `output`. Limine loads newc archives as modules.
///
/// ```rust,ignore
/// use aero_build::artifact::cpio::archive_list;
///
/// let files = find_regular_files(&root)?;
/// archive_list(&root, &files, &iso_root.join("initramfs.cpio"))?;
/// ```
pub fn archive_list(root: &Path, files: &[PathBuf], output: &Path) -> Result<()> {
    Cmd::new("cpio")
        .args(["-o", "-H", "newc"])
        .dir(root)
        .stdin(file_list(files))
        .stdout_file(output)
        .error_msg("cpio failed. Install cpio.")
        .run()?;

    Ok(())
}

fn file_list(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| f.to_string_lossy())
        .collect::<Vec<_>>()
        .join("\n")
}
