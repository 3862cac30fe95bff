//! Optional `aero-build.toml` defaults.
//!
//! ```toml
//! [build]
//! target = "x86_64-aero_os"
//! features = ["ci"]
//!
//! [emulator]
//! memory = "4G"
//! smp = 2
//! bios = "uefi"
//! args = ["-d", "int"]
//! ```
//!
//! Every key is optional. Command-line flags take precedence.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::request::FirmwareMode;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub build: BuildToml,
    #[serde(default)]
    pub emulator: EmulatorToml,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildToml {
    pub target: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmulatorToml {
    pub memory: Option<String>,
    pub smp: Option<u32>,
    pub bios: Option<FirmwareMode>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl FileConfig {
    /// Load the config file, or the empty config when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config '{}'", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: FileConfig = toml::from_str(text)?;
        if config.emulator.smp == Some(0) {
            bail!("emulator.smp must be at least 1");
        }
        if let Some(target) = &config.build.target {
            if target.trim().is_empty() {
                bail!("build.target must not be empty");
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let config = FileConfig::load(&temp.path().join("aero-build.toml")).unwrap();
        assert!(config.build.target.is_none());
        assert!(config.emulator.args.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let config = FileConfig::parse(
            r#"
[build]
target = "aarch64-aero_os"
features = ["ci", "kmemleak"]

[emulator]
memory = "4G"
smp = 2
bios = "uefi"
args = ["-d", "int"]
"#,
        )
        .unwrap();

        assert_eq!(config.build.target.as_deref(), Some("aarch64-aero_os"));
        assert_eq!(config.build.features, ["ci", "kmemleak"]);
        assert_eq!(config.emulator.memory.as_deref(), Some("4G"));
        assert_eq!(config.emulator.smp, Some(2));
        assert_eq!(config.emulator.bios, Some(FirmwareMode::Uefi));
        assert_eq!(config.emulator.args, ["-d", "int"]);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(FileConfig::parse("[build]\nprofile = \"release\"\n").is_err());
    }

    #[test]
    fn test_zero_smp_rejected() {
        assert!(FileConfig::parse("[emulator]\nsmp = 0\n").is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("aero-build.toml");
        fs::write(&path, "not toml at all [").unwrap();

        let err = FileConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("aero-build.toml"));
    }
}
