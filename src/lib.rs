//! Build pipeline for the Aero operating system.
//!
//! Turns the kernel workspace (`src/`) and the userland workspace
//! (`userland/`) into a bootable ISO and optionally boots it under QEMU.
//!
//! - **Asset cache** - OVMF firmware and the Limine binary release
//! - **Sysroot bootstrapper** - cross toolchain and target tree via xbstrap
//! - **Workspace build driver** - two-pass cargo builds with artifact extraction
//! - **Image assembler** - initramfs, ISO root, xorriso, Limine install, disk image
//! - **Capability detector** - KVM / Hypervisor.framework availability
//! - **Emulator launcher** - the `qemu-system-{arch}` invocation
//! - **Orchestrator** - picks the stages for the requested operation
//!
//! # Architecture
//!
//! ```text
//! orchestrator ── Stages ──┬── assets
//!                          ├── sysroot
//!                          ├── build::{kernel, userland}
//!                          ├── artifact::assemble
//!                          ├── docs
//!                          └── qemu ── capability
//!
//! process::Cmd   every external tool, explicit working directory
//! layout::Layout every fixed path, resolved against the source root
//! ```

pub mod artifact;
pub mod assets;
pub mod build;
pub mod capability;
pub mod config;
pub mod docs;
pub mod error;
pub mod layout;
pub mod logger;
pub mod orchestrator;
pub mod preflight;
pub mod process;
pub mod qemu;
pub mod request;
pub mod sysroot;

pub use error::{BootstrapError, PipelineError};
pub use layout::Layout;
pub use orchestrator::{HostStages, Outcome, Stages};
pub use request::{Arch, BuildRequest, FirmwareMode, Operation};
