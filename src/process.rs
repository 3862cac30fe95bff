//! Subprocess invocation helpers.
//!
//! Every external tool the pipeline drives (cargo, xbstrap, xorriso, cpio,
//! the bootloader installer, qemu) goes through [`Cmd`]. The working directory
//! is always passed explicitly; nothing here changes the process-wide cwd.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use log::debug;
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use crate::error::PipelineError;

/// Captured result of a finished command.
#[derive(Debug)]
pub struct CommandResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, `None` when the child was killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Builder for a single external command.
///
/// ```rust,ignore
/// use aero_build::process::Cmd;
///
/// let result = Cmd::new("xorriso")
///     .args(["-as", "mkisofs"])
///     .arg_path(iso_root)
///     .error_msg("xorriso failed. Install xorriso.")
///     .run()?;
/// ```
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    dir: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
    stdout_file: Option<PathBuf>,
    discard_stderr: bool,
    error_msg: Option<String>,
    allow_fail: bool,
}

impl Cmd {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            dir: None,
            stdin: None,
            stdout_file: None,
            discard_stderr: false,
            error_msg: None,
            allow_fail: false,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// Working directory of the child.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// Bytes fed to the child's stdin while its output is collected.
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Redirect stdout into a file instead of capturing it.
    pub fn stdout_file(mut self, path: &Path) -> Self {
        self.stdout_file = Some(path.to_path_buf());
        self
    }

    pub fn discard_stderr(mut self) -> Self {
        self.discard_stderr = true;
        self
    }

    /// Message attached to the error when the command fails.
    pub fn error_msg(mut self, msg: &str) -> Self {
        self.error_msg = Some(msg.to_string());
        self
    }

    /// Do not turn a nonzero exit into an error.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    /// Human readable `program arg arg ...` line.
    pub fn display(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    fn command(&self) -> Command {
        debug!("{}", self.display().purple().bold());
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Run with captured stdout and stderr.
    pub fn run(mut self) -> Result<CommandResult> {
        let mut cmd = self.command();
        cmd.stdin(if self.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        match &self.stdout_file {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("creating output file '{}'", path.display()))?;
                cmd.stdout(Stdio::from(file));
            }
            None => {
                cmd.stdout(Stdio::piped());
            }
        }
        cmd.stderr(if self.discard_stderr {
            Stdio::null()
        } else {
            Stdio::piped()
        });

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to execute '{}'", self.program_name()))?;

        // stdin is fed from its own thread while this one drains stdout and
        // stderr, so neither side can fill a pipe and stall the other.
        // Dropping the pipe at the end of the thread gives the child EOF.
        let writer = match (self.stdin.take(), child.stdin.take()) {
            (Some(input), Some(mut pipe)) => Some(thread::spawn(move || pipe.write_all(&input))),
            _ => None,
        };

        let output = child
            .wait_with_output()
            .with_context(|| format!("waiting for '{}'", self.program_name()))?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("{} exited before reading all of stdin", self.program_name());
                }
                Ok(Err(err)) => {
                    return Err(err)
                        .with_context(|| format!("writing stdin of '{}'", self.program_name()));
                }
                Err(_) => bail!("stdin writer of '{}' panicked", self.program_name()),
            }
        }

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !self.allow_fail && !result.success() {
            return Err(self.failure(result.code(), result.stderr.clone()));
        }

        Ok(result)
    }

    /// Run with inherited stdio and return the raw exit status.
    pub fn status(self) -> io::Result<ExitStatus> {
        let mut cmd = self.command();
        if self.discard_stderr {
            cmd.stderr(Stdio::null());
        }
        cmd.status()
    }

    /// Run with inherited stdio so the user sees live output.
    pub fn run_interactive(self) -> Result<ExitStatus> {
        let name = self.program_name();
        let allow_fail = self.allow_fail;
        let error_msg = self.error_msg.clone();
        let status = self
            .status()
            .with_context(|| format!("failed to execute '{}'", name))?;

        if !allow_fail && !status.success() {
            let err = anyhow::Error::new(PipelineError::ToolInvocation {
                tool: name,
                code: status.code(),
                stderr: String::new(),
            });
            return Err(match error_msg {
                Some(msg) => err.context(msg),
                None => err,
            });
        }

        Ok(status)
    }

    fn failure(&self, code: Option<i32>, stderr: String) -> anyhow::Error {
        let err = anyhow::Error::new(PipelineError::ToolInvocation {
            tool: self.program_name(),
            code,
            stderr,
        });
        match &self.error_msg {
            Some(msg) => err.context(msg.clone()),
            None => err,
        }
    }
}

/// Fail with [`PipelineError::MissingArtifact`] unless `path` exists.
pub fn ensure_exists(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        return Err(anyhow::Error::new(PipelineError::MissingArtifact(
            path.to_path_buf(),
        ))
        .context(format!("{} not found", what)));
    }
    Ok(())
}
