//! Initramfs root population.
//!
//! The initramfs content is recomputed on every build from the sysroot's
//! installed `usr/{bin,lib,include}` trees plus the `base-files` overlay.
//! Nothing is persisted between builds apart from the sysroot itself.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::filesystem::{copy_file, recreate_dir};
use crate::layout::Layout;

/// Sysroot subtrees mirrored into the initramfs. Each is skipped when the
/// sysroot does not have it.
pub const SYSROOT_SUBTREES: &[&str] = &["usr/bin", "usr/lib", "usr/include"];

/// Regular files below `root`, relative to it, without a leading `./`.
///
/// Directories and symlinks are not listed. Order is sorted by path so the
/// archive layout is stable between builds.
pub fn find_regular_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking '{}'", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("'{}' escaped '{}'", entry.path().display(), root.display()))?;
        files.push(rel.to_path_buf());
    }
    Ok(files)
}

/// Copy every regular file of `src` to the same relative path under `dest`.
pub fn copy_tree_files(src: &Path, dest: &Path) -> Result<usize> {
    let files = find_regular_files(src)?;
    for rel in &files {
        copy_file(&src.join(rel), &dest.join(rel))?;
    }
    Ok(files.len())
}

/// Recreate `build/initramfs_root` and fill it. Returns the root.
pub fn populate(layout: &Layout) -> Result<PathBuf> {
    let root = layout.initramfs_root();
    recreate_dir(&root)?;

    let system_root = layout.system_root();
    for subtree in SYSROOT_SUBTREES {
        let src = system_root.join(subtree);
        if !src.exists() {
            debug!("sysroot has no {}, skipping", subtree);
            continue;
        }
        let count = copy_tree_files(&src, &root.join(subtree))?;
        debug!("copied {} file(s) from sysroot {}", count, subtree);
    }

    let base_files = layout.base_files();
    let count = copy_tree_files(&base_files, &root)
        .with_context(|| format!("applying base files from '{}'", base_files.display()))?;
    debug!("applied {} base file(s)", count);

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_regular_files_is_relative_and_files_only() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("etc/empty")).unwrap();
        fs::create_dir_all(root.join("usr/bin")).unwrap();
        fs::write(root.join("etc/hostname"), "aero").unwrap();
        fs::write(root.join("usr/bin/init"), "").unwrap();
        std::os::unix::fs::symlink("init", root.join("usr/bin/sh")).unwrap();

        let files = find_regular_files(root).unwrap();
        assert_eq!(
            files,
            [PathBuf::from("etc/hostname"), PathBuf::from("usr/bin/init")]
        );
        assert!(files.iter().all(|f| !f.starts_with(".")));
    }

    #[test]
    fn test_populate_merges_sysroot_and_base_files() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());

        let bin = layout.system_root().join("usr/bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("bash"), "bash").unwrap();
        // usr/lib and usr/include are absent and must be skipped.

        fs::create_dir_all(layout.base_files().join("etc")).unwrap();
        fs::write(layout.base_files().join("etc/passwd"), "root:x:0:0").unwrap();

        let stale = layout.initramfs_root().join("stale");
        fs::create_dir_all(&stale).unwrap();

        let root = populate(&layout).unwrap();

        assert_eq!(fs::read_to_string(root.join("usr/bin/bash")).unwrap(), "bash");
        assert_eq!(fs::read_to_string(root.join("etc/passwd")).unwrap(), "root:x:0:0");
        assert!(!root.join("usr/lib").exists());
        assert!(!stale.exists());
    }

    #[test]
    fn test_populate_requires_base_files() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        assert!(populate(&layout).is_err());
    }
}
