//! The immutable description of one pipeline invocation.

use serde::Deserialize;

use crate::config::FileConfig;
use crate::error::PipelineError;

pub const DEFAULT_TARGET: &str = "x86_64-aero_os";
pub const DEFAULT_MEMORY: &str = "9800M";
pub const DEFAULT_SMP: u32 = 5;

/// What the orchestrator was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FullBuild,
    Clean,
    Check,
    Test,
    Document,
    SysrootOnly,
    RunWithoutRebuild,
    /// Fetch the bundled firmware and bootloader again.
    UpdateAssets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareMode {
    #[default]
    Legacy,
    Uefi,
}

/// CPU architecture of the target, taken from the triple's first component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Aarch64,
}

impl Arch {
    pub fn from_target(target: &str) -> Result<Self, PipelineError> {
        let arch = target.split('-').next().unwrap_or(target);
        match arch {
            "x86_64" => Ok(Arch::X86_64),
            "aarch64" => Ok(Arch::Aarch64),
            other => Err(PipelineError::UnsupportedPlatform(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
        }
    }

    /// Whether the target can only boot through UEFI firmware.
    pub fn requires_uefi(self) -> bool {
        matches!(self, Arch::Aarch64)
    }

    /// Cached firmware image used for UEFI boots.
    pub fn firmware_file(self) -> &'static str {
        match self {
            Arch::X86_64 => "OVMF-pure-efi.fd",
            Arch::Aarch64 => "OVMF-aarch64.fd",
        }
    }
}

/// Values taken from the command line. `None` means "not given".
#[derive(Debug, Clone)]
pub struct CliOptions {
    pub operation: Operation,
    pub debug: bool,
    pub no_run: bool,
    pub target: Option<String>,
    pub features: Vec<String>,
    pub firmware: Option<FirmwareMode>,
    pub memory: Option<String>,
    pub disable_kvm: bool,
    pub la57: bool,
    pub emulator_args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub operation: Operation,
    /// Build without `--release`.
    pub debug: bool,
    pub no_run: bool,
    pub target: String,
    pub features: Vec<String>,
    pub firmware: FirmwareMode,
    pub memory: String,
    pub smp: u32,
    pub disable_kvm: bool,
    pub la57: bool,
    pub emulator_args: Vec<String>,
}

impl BuildRequest {
    /// Merge command-line values over the config file over built-in defaults.
    pub fn resolve(cli: CliOptions, file: FileConfig) -> Self {
        let features = if cli.features.is_empty() {
            file.build.features
        } else {
            cli.features
        };

        let mut emulator_args = file.emulator.args;
        emulator_args.extend(cli.emulator_args);

        Self {
            operation: cli.operation,
            debug: cli.debug,
            no_run: cli.no_run,
            target: cli
                .target
                .or(file.build.target)
                .unwrap_or_else(|| DEFAULT_TARGET.to_string()),
            features: features
                .into_iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
            firmware: cli.firmware.or(file.emulator.bios).unwrap_or_default(),
            memory: cli
                .memory
                .or(file.emulator.memory)
                .unwrap_or_else(|| DEFAULT_MEMORY.to_string()),
            smp: file.emulator.smp.unwrap_or(DEFAULT_SMP),
            disable_kvm: cli.disable_kvm,
            la57: cli.la57,
            emulator_args,
        }
    }

    /// Reject combinations that can never boot. Unknown architectures are
    /// only fatal once the emulator command is assembled.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if let Ok(arch) = Arch::from_target(&self.target) {
            if arch.requires_uefi() && self.firmware != FirmwareMode::Uefi {
                return Err(PipelineError::UefiRequired(arch.as_str().to_string()));
            }
        }
        Ok(())
    }

    pub fn release(&self) -> bool {
        !self.debug
    }
}

#[cfg(test)]
pub(crate) fn test_request(operation: Operation) -> BuildRequest {
    BuildRequest::resolve(
        CliOptions {
            operation,
            debug: false,
            no_run: false,
            target: None,
            features: Vec::new(),
            firmware: None,
            memory: None,
            disable_kvm: false,
            la57: false,
            emulator_args: Vec::new(),
        },
        FileConfig::default(),
    )
}
