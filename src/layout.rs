//! Fixed directory and file layout of the source tree.
//!
//! All paths are resolved against an explicit source root instead of the
//! process working directory.

use std::path::{Path, PathBuf};

pub const BUILD_DIR: &str = "build";
pub const BUNDLED_DIR: &str = "bundled";
pub const SYSROOT_DIR: &str = "sysroot";
pub const SYSROOT_CARGO_HOME: &str = "sysroot/cargo-home";
pub const EXTRA_FILES: &str = "extra-files";
pub const BASE_FILES_DIR: &str = "base-files";
pub const CONFIG_FILE: &str = "aero-build.toml";

/// Filename of the kernel inside the ISO root.
pub const KERNEL_NAME: &str = "aero.elf";
pub const ISO_NAME: &str = "aero.iso";
pub const INITRAMFS_NAME: &str = "initramfs.cpio";
pub const BACKGROUND_NAME: &str = "term_background.bmp";
pub const DISK_IMAGE_NAME: &str = "disk.img";

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    // Workspaces

    pub fn kernel_workspace(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn userland_workspace(&self) -> PathBuf {
        self.root.join("userland")
    }

    /// Target spec path relative to the kernel workspace.
    pub fn kernel_target_spec(target: &str) -> String {
        format!(".cargo/{}.json", target)
    }

    pub fn kernel_target_dir(&self, target: &str) -> PathBuf {
        self.kernel_workspace().join("target").join(target)
    }

    pub fn userland_target_dir(&self) -> PathBuf {
        self.userland_workspace().join("target")
    }

    pub fn doc_dir(&self, target: &str) -> PathBuf {
        self.kernel_target_dir(target).join("doc")
    }

    pub fn background_image(&self) -> PathBuf {
        self.kernel_workspace().join(".cargo").join(BACKGROUND_NAME)
    }

    // Bundled assets

    pub fn bundled_dir(&self) -> PathBuf {
        self.root.join(BUNDLED_DIR)
    }

    pub fn ovmf_dir(&self) -> PathBuf {
        self.bundled_dir().join("ovmf")
    }

    pub fn limine_dir(&self) -> PathBuf {
        self.bundled_dir().join("limine")
    }

    // Sysroot

    pub fn sysroot_dir(&self) -> PathBuf {
        self.root.join(SYSROOT_DIR)
    }

    pub fn sysroot_cargo_home(&self) -> PathBuf {
        self.root.join(SYSROOT_CARGO_HOME)
    }

    pub fn sysroot_tools(&self) -> PathBuf {
        self.sysroot_dir().join("tools")
    }

    pub fn sysroot_packages(&self) -> PathBuf {
        self.sysroot_dir().join("packages")
    }

    pub fn system_root(&self) -> PathBuf {
        self.sysroot_dir().join("system-root")
    }

    pub fn bootstrap_descriptor(&self) -> PathBuf {
        self.root.join("bootstrap.yml")
    }

    pub fn bootstrap_link(&self) -> PathBuf {
        self.sysroot_dir().join("bootstrap.link")
    }

    pub fn cargo_config_template(&self) -> PathBuf {
        self.root.join(EXTRA_FILES).join("rust").join("config.toml")
    }

    pub fn base_files(&self) -> PathBuf {
        self.root.join(BASE_FILES_DIR)
    }

    // Build outputs

    pub fn build_dir(&self) -> PathBuf {
        self.root.join(BUILD_DIR)
    }

    pub fn iso_path(&self) -> PathBuf {
        self.build_dir().join(ISO_NAME)
    }

    pub fn iso_root(&self) -> PathBuf {
        self.build_dir().join("iso_root")
    }

    pub fn initramfs_root(&self) -> PathBuf {
        self.build_dir().join("initramfs_root")
    }

    pub fn disk_image(&self) -> PathBuf {
        self.build_dir().join(DISK_IMAGE_NAME)
    }

    pub fn mkimage_script(&self) -> PathBuf {
        self.root.join("tools").join("mkimage.sh")
    }

    pub fn web_overlay(&self) -> PathBuf {
        self.root.join("web")
    }

    pub fn web_output(&self) -> PathBuf {
        self.build_dir().join("web")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_rooted() {
        let layout = Layout::new("/src/aero");
        assert_eq!(layout.iso_path(), Path::new("/src/aero/build/aero.iso"));
        assert_eq!(
            layout.sysroot_cargo_home(),
            Path::new("/src/aero/sysroot/cargo-home")
        );
        assert_eq!(
            layout.doc_dir("x86_64-aero_os"),
            Path::new("/src/aero/src/target/x86_64-aero_os/doc")
        );
        assert_eq!(
            layout.cargo_config_template(),
            Path::new("/src/aero/extra-files/rust/config.toml")
        );
    }

    #[test]
    fn test_kernel_target_spec_is_workspace_relative() {
        assert_eq!(
            Layout::kernel_target_spec("x86_64-aero_os"),
            ".cargo/x86_64-aero_os.json"
        );
    }
}
