//! Filesystem utilities shared by the asset cache, the image assembler and
//! the documentation publisher.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Delete `dir` if present, then create it empty.
pub fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("removing existing directory '{}'", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("creating directory '{}'", dir.display()))?;
    Ok(())
}

/// Copy `file` to `dest`, creating the parent directory of `dest`.
pub fn copy_file(file: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory '{}'", parent.display()))?;
    }
    fs::copy(file, dest)
        .with_context(|| format!("copying '{}' to '{}'", file.display(), dest.display()))?;
    Ok(())
}

/// Recursively copy a directory into `dst`, merging with existing content.
///
/// Symlinks are preserved, not followed. Files already in `dst` are
/// overwritten.
///
/// ```rust,ignore
/// use aero_build::artifact::filesystem::copy_dir_recursive;
///
/// copy_dir_recursive(Path::new("web"), Path::new("build/web"))?;
/// ```
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    if !dst.exists() {
        fs::create_dir_all(dst)
            .with_context(|| format!("Failed to create directory: {}", dst.display()))?;
    }

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            let target = fs::read_link(&src_path)?;
            if dst_path.exists() || dst_path.is_symlink() {
                fs::remove_file(&dst_path)?;
            }
            symlink(&target, &dst_path)
                .with_context(|| format!("Failed to create symlink: {}", dst_path.display()))?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)
                .with_context(|| format!("Failed to copy file: {}", src_path.display()))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
pub(crate) fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub(crate) fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Move a finished file into place by renaming, with fallback to copy+delete
/// across filesystems.
pub fn atomic_move(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(src, dst)
                .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
            fs::remove_file(src).with_context(|| format!("Failed to remove {}", src.display()))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_recreate_dir_drops_old_content() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("iso_root");
        fs::create_dir_all(dir.join("stale")).unwrap();
        fs::write(dir.join("stale/file"), "old").unwrap();

        recreate_dir(&dir).unwrap();

        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_copy_file_creates_parent() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("BOOTX64.EFI");
        fs::write(&src, "efi").unwrap();
        let dest = temp.path().join("iso/EFI/BOOT/BOOTX64.EFI");

        copy_file(&src, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest).unwrap(), "efi");
    }

    #[test]
    fn test_copy_dir_recursive_merges() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");

        fs::create_dir_all(src.join("subdir")).unwrap();
        fs::write(src.join("file.txt"), "hello").unwrap();
        fs::write(src.join("subdir/nested.txt"), "world").unwrap();
        std::os::unix::fs::symlink("file.txt", src.join("link")).unwrap();

        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("existing.txt"), "kept").unwrap();
        fs::write(dst.join("file.txt"), "replaced").unwrap();

        copy_dir_recursive(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("file.txt")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(dst.join("existing.txt")).unwrap(), "kept");
        assert!(dst.join("subdir/nested.txt").exists());
        assert!(dst.join("link").is_symlink());
    }

    #[test]
    fn test_atomic_move() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("OVMF-pure-efi.fd.part");
        let dst = temp.path().join("OVMF-pure-efi.fd");

        fs::write(&src, "firmware").unwrap();
        atomic_move(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "firmware");
    }
}
