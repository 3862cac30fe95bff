//! Sysroot bootstrap through xbstrap.
//!
//! The sysroot lives under `sysroot/` and holds the cross toolchain
//! (`tools/`) and the installed target tree (`system-root/`). It is created
//! on demand and only ever removed by hand.
//!
//! xbstrap does not copy `extra-files/rust/config.toml` into the isolated
//! cargo home, so the bootstrapper renders that template itself before
//! running `xbstrap install`.

use log::{debug, info};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::artifact::filesystem::symlink;
use crate::error::BootstrapError;
use crate::layout::Layout;
use crate::process::Cmd;

pub const SOURCE_ROOT_PLACEHOLDER: &str = "@SOURCE_ROOT@";
pub const BUILD_ROOT_PLACEHOLDER: &str = "@BUILD_ROOT@";

/// Packages installed by a minimal bootstrap. Enough to build the kernel
/// and the userland.
pub const MINIMAL_PACKAGES: &[&str] = &["bash", "coreutils"];

/// Replace both placeholders with the given paths. Plain string replacement,
/// no escaping.
pub fn substitute_placeholders(template: &str, source_root: &str, build_root: &str) -> String {
    template
        .replace(SOURCE_ROOT_PLACEHOLDER, source_root)
        .replace(BUILD_ROOT_PLACEHOLDER, build_root)
}

/// Arguments for `xbstrap` in the requested mode.
pub fn install_args(minimal: bool) -> Vec<&'static str> {
    let mut args = vec!["install", "-u"];
    if minimal {
        args.extend_from_slice(MINIMAL_PACKAGES);
    } else {
        args.push("--all");
    }
    args
}

/// Path of `target` relative to the directory `base`. Both must be absolute
/// or both relative to the same root.
pub fn relative_path(target: &Path, base: &Path) -> PathBuf {
    let target: Vec<Component> = target.components().collect();
    let base: Vec<Component> = base.components().collect();

    let common = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for part in &target[common..] {
        rel.push(part.as_os_str());
    }
    rel
}

/// Create `link` pointing at `target` through a path relative to the link's
/// own directory.
pub fn symlink_relative(target: &Path, link: &Path) -> std::io::Result<()> {
    let base = link.parent().unwrap_or_else(|| Path::new(""));
    symlink(&relative_path(target, base), link)
}

/// Locate xbstrap: first on PATH, then `~/.local/bin/xbstrap` where
/// `pip install --user` puts it.
pub fn resolve_xbstrap() -> Result<PathBuf, BootstrapError> {
    if let Ok(path) = which::which("xbstrap") {
        return Ok(path);
    }

    let fallback = dirs::home_dir().map(|home| home.join(".local").join("bin").join("xbstrap"));
    if let Some(path) = &fallback {
        if path.is_file() {
            return Ok(path.clone());
        }
    }

    let mut searched = vec!["PATH".to_string()];
    if let Some(path) = fallback {
        searched.push(path.display().to_string());
    }
    Err(BootstrapError::ToolNotFound { searched })
}

/// Lay out the sysroot skeleton: directory, cargo home, rendered cargo
/// config and the descriptor symlink. Existing pieces are left untouched.
pub fn prepare(layout: &Layout) -> Result<(), BootstrapError> {
    let sysroot = layout.sysroot_dir();
    let cargo_home = layout.sysroot_cargo_home();
    fs::create_dir_all(&cargo_home).map_err(|e| {
        BootstrapError::io(format!("creating '{}'", cargo_home.display()), e)
    })?;

    let cargo_config = cargo_home.join("config.toml");
    if !cargo_config.exists() {
        let template_path = layout.cargo_config_template();
        let template = fs::read_to_string(&template_path).map_err(|e| {
            BootstrapError::io(format!("reading '{}'", template_path.display()), e)
        })?;
        let rendered = substitute_placeholders(
            &template,
            &layout.root().to_string_lossy(),
            &sysroot.to_string_lossy(),
        );
        fs::write(&cargo_config, rendered).map_err(|e| {
            BootstrapError::io(format!("writing '{}'", cargo_config.display()), e)
        })?;
        debug!("wrote {}", cargo_config.display());
    }

    let link = layout.bootstrap_link();
    if !link.is_symlink() {
        symlink_relative(&layout.bootstrap_descriptor(), &link)
            .map_err(|e| BootstrapError::io(format!("linking '{}'", link.display()), e))?;
    }

    Ok(())
}

/// Materialise the sysroot. `minimal` installs only [`MINIMAL_PACKAGES`],
/// otherwise every declared package.
pub fn bootstrap(layout: &Layout, minimal: bool) -> Result<(), BootstrapError> {
    prepare(layout)?;

    let xbstrap = resolve_xbstrap()?;
    info!(
        "bootstrapping {} sysroot",
        if minimal { "minimal" } else { "full" }
    );

    let status = Cmd::new(&xbstrap)
        .args(install_args(minimal))
        .dir(&layout.sysroot_dir())
        .status()
        .map_err(|e| BootstrapError::io(format!("running '{}'", xbstrap.display()), e))?;

    if !status.success() {
        return Err(BootstrapError::ToolFailed {
            code: status.code(),
        });
    }
    Ok(())
}

/// Bootstrap a minimal sysroot unless one already exists.
pub fn ensure_minimal(layout: &Layout) -> Result<(), BootstrapError> {
    if layout.sysroot_dir().exists() {
        debug!("sysroot already present");
        return Ok(());
    }
    bootstrap(layout, true)
}
