//! Publishing of the generated kernel documentation.

use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

use crate::artifact::filesystem::copy_dir_recursive;
use crate::layout::Layout;
use crate::process::ensure_exists;

/// Replace `build/web` with the static `web/` overlay plus the rustdoc
/// output for `target`. Rustdoc files win on name clashes.
pub fn publish_docs(layout: &Layout, target: &str) -> Result<PathBuf> {
    let out = layout.web_output();
    let overlay = layout.web_overlay();
    let doc_dir = layout.doc_dir(target);

    ensure_exists(&overlay, "web overlay")?;
    ensure_exists(&doc_dir, "rustdoc output")?;

    if out.exists() {
        fs::remove_dir_all(&out)
            .with_context(|| format!("removing old documentation '{}'", out.display()))?;
    }

    copy_dir_recursive(&overlay, &out)?;
    copy_dir_recursive(&doc_dir, &out)?;

    info!("documentation published to {}", out.display());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_publish_overwrites_previous_output() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());

        fs::create_dir_all(layout.web_overlay()).unwrap();
        fs::write(layout.web_overlay().join("index.html"), "overlay").unwrap();
        fs::write(layout.web_overlay().join("style.css"), "css").unwrap();

        let doc = layout.doc_dir("x86_64-aero_os");
        fs::create_dir_all(doc.join("aero_kernel")).unwrap();
        fs::write(doc.join("aero_kernel/index.html"), "kernel").unwrap();
        fs::write(doc.join("index.html"), "rustdoc").unwrap();

        fs::create_dir_all(layout.web_output()).unwrap();
        fs::write(layout.web_output().join("stale.html"), "old").unwrap();

        let out = publish_docs(&layout, "x86_64-aero_os").unwrap();

        assert!(!out.join("stale.html").exists());
        assert_eq!(fs::read_to_string(out.join("style.css")).unwrap(), "css");
        assert_eq!(fs::read_to_string(out.join("index.html")).unwrap(), "rustdoc");
        assert_eq!(
            fs::read_to_string(out.join("aero_kernel/index.html")).unwrap(),
            "kernel"
        );
    }

    #[test]
    fn test_missing_rustdoc_output() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        fs::create_dir_all(layout.web_overlay()).unwrap();

        assert!(publish_docs(&layout, "x86_64-aero_os").is_err());
    }
}
