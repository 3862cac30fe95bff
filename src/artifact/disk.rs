//! Companion raw disk image for the emulated NVMe drive.

use anyhow::Result;
use log::{debug, info};
use std::path::PathBuf;

use crate::layout::Layout;
use crate::process::{ensure_exists, Cmd};

/// Create `build/disk.img` through `tools/mkimage.sh` unless it exists.
pub fn ensure_disk_image(layout: &Layout) -> Result<PathBuf> {
    let image = layout.disk_image();
    if image.exists() {
        debug!("{} already exists", image.display());
        return Ok(image);
    }

    let script = layout.mkimage_script();
    ensure_exists(&script, "disk image script")?;

    info!("creating {}", image.display());
    Cmd::new("sh")
        .arg_path(&script)
        .dir(layout.root())
        .error_msg("disk image creation failed")
        .run_interactive()?;

    ensure_exists(&image, "disk image")?;
    Ok(image)
}
