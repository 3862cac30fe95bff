//! Hardware virtualization detection.
//!
//! Best effort: any check that fails to run or parse reports acceleration as
//! unusable instead of aborting the run.

use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::process::Cmd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    MacOs,
    Other,
}

impl HostOs {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => HostOs::Linux,
            "macos" => HostOs::MacOs,
            _ => HostOs::Other,
        }
    }
}

/// Result of one detection pass. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityReport {
    pub os: HostOs,
    pub accelerated: bool,
}

pub fn detect() -> CapabilityReport {
    let os = HostOs::current();
    let accelerated = match os {
        HostOs::Linux => linux_kvm_usable(Path::new("/dev/kvm"), Path::new("/proc/cpuinfo")),
        HostOs::MacOs => match (sysctl("machdep.cpu.features"), sysctl("kern.hv_support")) {
            (Some(features), Some(hv)) => darwin_hvf_usable(&features, &hv),
            _ => false,
        },
        HostOs::Other => false,
    };
    debug!("host {:?}, acceleration usable: {}", os, accelerated);
    CapabilityReport { os, accelerated }
}

/// KVM is usable when the device node exists and processor 0 has `vmx`.
pub fn linux_kvm_usable(kvm: &Path, cpuinfo: &Path) -> bool {
    if !kvm.exists() {
        return false;
    }
    match fs::read_to_string(cpuinfo) {
        Ok(text) => cpuinfo_has_vmx(&text),
        Err(err) => {
            debug!("reading {}: {}", cpuinfo.display(), err);
            false
        }
    }
}

/// Split `/proc/cpuinfo` text into one key/value map per processor.
///
/// Blocks are separated by blank lines. Each line is split at its first
/// colon and both halves trimmed; lines without a colon are skipped.
pub fn parse_cpuinfo(text: &str) -> Vec<HashMap<String, String>> {
    text.split("\n\n")
        .map(|block| {
            block
                .lines()
                .filter_map(|line| line.split_once(':'))
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .collect::<HashMap<_, _>>()
        })
        .filter(|block| !block.is_empty())
        .collect()
}

/// Whether the first logical processor lists `vmx`. That is the block with
/// `processor: 0`, or the first block when none is numbered 0.
pub fn cpuinfo_has_vmx(text: &str) -> bool {
    let cpus = parse_cpuinfo(text);
    cpus.iter()
        .find(|cpu| cpu.get("processor").map(String::as_str) == Some("0"))
        .or_else(|| cpus.first())
        .and_then(|cpu| cpu.get("flags"))
        .map(|flags| flags.split_whitespace().any(|flag| flag == "vmx"))
        .unwrap_or(false)
}

/// Hypervisor.framework needs VMX in the CPU features and
/// `kern.hv_support` set to 1.
pub fn darwin_hvf_usable(cpu_features: &str, hv_support: &str) -> bool {
    let vmx = cpu_features.split_whitespace().any(|f| f == "VMX");
    vmx && hv_support.trim() == "1"
}

fn sysctl(name: &str) -> Option<String> {
    match Cmd::new("sysctl").args(["-n", name]).run() {
        Ok(result) => Some(result.stdout.trim().to_string()),
        Err(err) => {
            debug!("sysctl {} failed: {:#}", name, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TWO_CPUS: &str = "processor\t: 0\n\
vendor_id\t: GenuineIntel\n\
flags\t\t: fpu vme vmx sse\n\
\n\
processor\t: 1\n\
flags\t\t: fpu vme\n";

    #[test]
    fn test_vmx_present() {
        assert!(cpuinfo_has_vmx("processor : 0\nflags: fpu vme vmx\n"));
    }

    #[test]
    fn test_vmx_absent() {
        assert!(!cpuinfo_has_vmx("processor : 0\nflags: fpu vme\n"));
    }

    #[test]
    fn test_only_processor_zero_counts() {
        assert!(cpuinfo_has_vmx(TWO_CPUS));
        let swapped = "processor: 0\nflags: fpu\n\nprocessor: 1\nflags: vmx\n";
        assert!(!cpuinfo_has_vmx(swapped));
    }

    #[test]
    fn test_flag_must_be_whole_word() {
        assert!(!cpuinfo_has_vmx("processor: 0\nflags: fpu vmxx\n"));
    }

    #[test]
    fn test_parse_cpuinfo_skips_malformed_lines() {
        let blocks = parse_cpuinfo("processor: 0\ngarbage line\nmodel name: CPU @ 3.00GHz: x\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].len(), 2);
        assert_eq!(blocks[0]["model name"], "CPU @ 3.00GHz: x");
    }

    #[test]
    fn test_empty_cpuinfo() {
        assert!(!cpuinfo_has_vmx(""));
        assert!(!cpuinfo_has_vmx("no colon here\n"));
    }

    #[test]
    fn test_unnumbered_block_is_first_processor() {
        assert!(cpuinfo_has_vmx("flags: fpu vme vmx"));
        assert!(!cpuinfo_has_vmx("flags: fpu vme"));
        assert!(cpuinfo_has_vmx("flags: vmx\n\nflags: fpu\n"));
    }

    #[test]
    fn test_linux_without_device_node() {
        let temp = TempDir::new().unwrap();
        let cpuinfo = temp.path().join("cpuinfo");
        fs::write(&cpuinfo, "processor: 0\nflags: vmx\n").unwrap();

        assert!(!linux_kvm_usable(&temp.path().join("kvm"), &cpuinfo));
    }

    #[test]
    fn test_linux_with_device_node() {
        let temp = TempDir::new().unwrap();
        let kvm = temp.path().join("kvm");
        fs::write(&kvm, "").unwrap();
        let cpuinfo = temp.path().join("cpuinfo");
        fs::write(&cpuinfo, TWO_CPUS).unwrap();

        assert!(linux_kvm_usable(&kvm, &cpuinfo));
        assert!(!linux_kvm_usable(&kvm, &temp.path().join("no-cpuinfo")));
    }

    #[test]
    fn test_darwin_hvf() {
        assert!(darwin_hvf_usable("FPU VME VMX SSE", "1\n"));
        assert!(!darwin_hvf_usable("FPU VME SSE", "1"));
        assert!(!darwin_hvf_usable("FPU VMX", "0"));
    }
}
