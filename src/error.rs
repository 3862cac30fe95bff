//! Typed errors for the places where callers branch on the failure kind.

use std::path::PathBuf;
use thiserror::Error;

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

/// Failure taxonomy of the pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An external tool ran and exited unsuccessfully.
    #[error("`{tool}` terminated with {}", describe_code(.code))]
    ToolInvocation {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A file the next step depends on is not on disk.
    #[error("missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("unsupported target architecture '{0}'")]
    UnsupportedPlatform(String),

    #[error("{0} requires UEFI (help: run again with `--bios=uefi`)")]
    UefiRequired(String),

    /// Building the bootloader installer from source failed. Fatal for the
    /// whole process.
    #[error("failed to build the bootloader installer:\n{stderr}")]
    InstallerBuild { stderr: String },
}

/// Errors of the sysroot bootstrapper.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("xbstrap not found (searched: {})", .searched.join(", "))]
    ToolNotFound { searched: Vec<String> },

    #[error("xbstrap install failed with {}", describe_code(.code))]
    ToolFailed { code: Option<i32> },
}

impl BootstrapError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BootstrapError::Io {
            context: context.into(),
            source,
        }
    }
}
