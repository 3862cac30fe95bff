//! Aero build CLI
//!
//! # Usage
//!
//! ```bash
//! # Build the userland, the kernel and the ISO, then boot it
//! aero-build
//!
//! # Build the image only
//! aero-build --no-run
//!
//! # Boot the last image without rebuilding
//! aero-build --only-run
//!
//! # UEFI boot with extra QEMU arguments
//! aero-build --bios=uefi -- -d int -no-reboot
//!
//! # Full sysroot (every package, not just bash and coreutils)
//! aero-build --sysroot
//!
//! # Replace the cached firmware and bootloader
//! aero-build --update
//! ```

use anyhow::Result;
use clap::{ArgGroup, Parser};

use aero_build::config::FileConfig;
use aero_build::request::CliOptions;
use aero_build::{logger, orchestrator, BuildRequest, FirmwareMode, HostStages, Layout, Operation};

#[derive(Parser)]
#[command(name = "aero-build")]
#[command(author, version, about = "Aero kernel and image builder", long_about = None)]
#[command(group(ArgGroup::new("operation").args(["clean", "check", "test", "document", "update"])))]
struct Cli {
    /// Remove the kernel and userland build output
    #[arg(long)]
    clean: bool,

    /// Type-check both workspaces without producing an image
    #[arg(long)]
    check: bool,

    /// Build the kernel and userland test binaries
    #[arg(long)]
    test: bool,

    /// Generate the kernel documentation into build/web
    #[arg(long)]
    document: bool,

    /// Download the OVMF firmware and the Limine checkout again
    #[arg(long)]
    update: bool,

    /// Build without --release
    #[arg(long)]
    debug: bool,

    /// Stop after the ISO is built
    #[arg(long)]
    no_run: bool,

    /// Boot the existing ISO without rebuilding
    #[arg(long)]
    only_run: bool,

    /// Firmware used to boot the emulator
    #[arg(long, value_enum)]
    bios: Option<FirmwareMode>,

    /// Comma separated kernel features
    #[arg(long, value_delimiter = ',')]
    features: Vec<String>,

    /// Target triple of the kernel (default: x86_64-aero_os)
    #[arg(long)]
    target: Option<String>,

    /// Enable 5-level paging in the emulated CPU
    #[arg(long)]
    la57: bool,

    /// Bootstrap the complete sysroot and exit
    #[arg(long)]
    sysroot: bool,

    /// Never use KVM or Hypervisor.framework
    #[arg(long)]
    disable_kvm: bool,

    /// Guest memory size (default: 9800M)
    #[arg(long)]
    memory: Option<String>,

    /// Arguments passed through to QEMU
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    emulator_args: Vec<String>,
}

impl Cli {
    fn operation(&self) -> Operation {
        if self.clean {
            Operation::Clean
        } else if self.update {
            Operation::UpdateAssets
        } else if self.sysroot {
            Operation::SysrootOnly
        } else if self.document {
            Operation::Document
        } else if self.check {
            Operation::Check
        } else if self.test {
            Operation::Test
        } else if self.only_run {
            Operation::RunWithoutRebuild
        } else {
            Operation::FullBuild
        }
    }

    fn into_options(self) -> CliOptions {
        CliOptions {
            operation: self.operation(),
            debug: self.debug,
            no_run: self.no_run,
            target: self.target,
            features: self.features,
            firmware: self.bios,
            memory: self.memory,
            disable_kvm: self.disable_kvm,
            la57: self.la57,
            emulator_args: self.emulator_args,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logger::init();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let layout = Layout::new(std::env::current_dir()?);
    let file = FileConfig::load(&layout.config_file())?;
    let request = BuildRequest::resolve(cli.into_options(), file);
    request.validate()?;

    let mut stages = HostStages::new(&layout, &request);
    let outcome = orchestrator::run(&mut stages, &request)?;
    Ok(outcome.is_success())
}
