//! Emulator launcher.
//!
//! Provides `QemuBuilder` for constructing the `qemu-system-{arch}` command
//! and [`launch`], which runs it in the foreground. The emulator's exit code
//! is not inspected.

use anyhow::{Context, Result};
use log::{debug, info};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::capability::{CapabilityReport, HostOs};
use crate::layout::Layout;
use crate::request::{Arch, BuildRequest, FirmwareMode};

/// Hardware acceleration backend passed to QEMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceleration {
    /// Hypervisor.framework (`-accel hvf`).
    Hvf,
    /// KVM (`-enable-kvm`).
    Kvm,
    /// Plain TCG emulation.
    None,
}

impl Acceleration {
    pub fn select(capability: &CapabilityReport, disabled: bool) -> Self {
        if disabled || !capability.accelerated {
            return Acceleration::None;
        }
        match capability.os {
            HostOs::MacOs => Acceleration::Hvf,
            _ => Acceleration::Kvm,
        }
    }
}

/// Builder for QEMU commands.
pub struct QemuBuilder {
    arch: Arch,
    cdrom: PathBuf,
    memory: String,
    smp: u32,
    disk: Option<PathBuf>,
    firmware: Option<PathBuf>,
    acceleration: Acceleration,
    la57: bool,
    extra: Vec<String>,
}

impl QemuBuilder {
    pub fn new(arch: Arch, cdrom: PathBuf, memory: &str, smp: u32) -> Self {
        Self {
            arch,
            cdrom,
            memory: memory.to_string(),
            smp,
            disk: None,
            firmware: None,
            acceleration: Acceleration::None,
            la57: false,
            extra: Vec::new(),
        }
    }

    pub fn disk(mut self, path: PathBuf) -> Self {
        self.disk = Some(path);
        self
    }

    pub fn uefi(mut self, firmware: PathBuf) -> Self {
        self.firmware = Some(firmware);
        self
    }

    pub fn acceleration(mut self, acceleration: Acceleration) -> Self {
        self.acceleration = acceleration;
        self
    }

    /// Expose 5-level paging to the guest.
    pub fn la57(mut self, enabled: bool) -> Self {
        self.la57 = enabled;
        self
    }

    /// Pass-through arguments, appended verbatim after the base arguments.
    pub fn extra_args(mut self, args: Vec<String>) -> Self {
        self.extra = args;
        self
    }

    pub fn program(&self) -> String {
        format!("qemu-system-{}", self.arch.as_str())
    }

    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-cdrom".into(), self.cdrom.clone().into()];

        if self.arch == Arch::X86_64 {
            push_all(&mut args, &["-M", "q35"]);
        }
        push_all(&mut args, &["-m", &self.memory]);
        push_all(&mut args, &["-smp", &self.smp.to_string()]);
        push_all(&mut args, &["-serial", "stdio"]);

        if let Some(disk) = &self.disk {
            push_all(
                &mut args,
                &[
                    "-drive",
                    &format!("file={},if=none,id=NVME1,format=raw", disk.display()),
                    "-device",
                    "nvme,drive=NVME1,serial=nvme",
                ],
            );
        }
        push_all(&mut args, &["-boot", "d"]);

        if let Some(firmware) = &self.firmware {
            args.push("-bios".into());
            args.push(firmware.clone().into());
        }

        args.extend(self.extra.iter().map(OsString::from));

        match self.arch {
            Arch::X86_64 => {
                match self.acceleration {
                    Acceleration::Hvf => push_all(&mut args, &["-accel", "hvf"]),
                    Acceleration::Kvm => push_all(&mut args, &["-enable-kvm"]),
                    Acceleration::None => {}
                }
                let model = match self.acceleration {
                    Acceleration::None => "qemu64",
                    _ => "host",
                };
                let cpu = if self.la57 {
                    format!("{},+la57", model)
                } else {
                    model.to_string()
                };
                push_all(&mut args, &["-cpu", &cpu]);
            }
            Arch::Aarch64 => push_all(
                &mut args,
                &["-device", "ramfb", "-M", "virt", "-cpu", "cortex-a72"],
            ),
        }

        args
    }

    pub fn build(self) -> Command {
        let mut cmd = Command::new(self.program());
        cmd.args(self.args());
        cmd
    }
}

fn push_all(args: &mut Vec<OsString>, items: &[&str]) {
    args.extend(items.iter().map(OsString::from));
}

/// Drop the first literal `--` separator, keep everything else in order.
pub fn strip_separator(args: &[String]) -> Vec<String> {
    let mut out = args.to_vec();
    if let Some(pos) = out.iter().position(|a| a == "--") {
        out.remove(pos);
    }
    out
}

/// Assemble the emulator command for `iso`. Fails only on an unsupported
/// target architecture.
pub fn qemu_for(
    layout: &Layout,
    iso: &Path,
    capability: &CapabilityReport,
    request: &BuildRequest,
) -> Result<QemuBuilder> {
    let arch = Arch::from_target(&request.target)?;
    let acceleration = Acceleration::select(capability, request.disable_kvm);
    if arch != Arch::X86_64 && acceleration != Acceleration::None {
        debug!("acceleration is not used for {} guests", arch.as_str());
    }

    let mut qemu = QemuBuilder::new(arch, iso.to_path_buf(), &request.memory, request.smp)
        .disk(layout.disk_image())
        .acceleration(acceleration)
        .la57(request.la57)
        .extra_args(strip_separator(&request.emulator_args));

    if request.firmware == FirmwareMode::Uefi {
        qemu = qemu.uefi(layout.ovmf_dir().join(arch.firmware_file()));
    }
    Ok(qemu)
}

/// Run the emulator in the foreground and wait for it to exit.
pub fn launch(
    layout: &Layout,
    iso: &Path,
    capability: &CapabilityReport,
    request: &BuildRequest,
) -> Result<()> {
    let qemu = qemu_for(layout, iso, capability, request)?;
    if qemu.arch == Arch::X86_64 && qemu.acceleration != Acceleration::None {
        info!("running with {:?} acceleration", qemu.acceleration);
    }

    let program = qemu.program();
    let mut cmd = qemu.build();
    debug!("{:?}", cmd);
    let status = cmd
        .status()
        .with_context(|| format!("failed to execute '{}'", program))?;
    debug!("{} exited with {}", program, status);
    Ok(())
}
