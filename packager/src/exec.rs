//! External process and executable lookup seams.
//!
//! Every external tool (the .NET SDK, `lipo`, the C compiler) is run through
//! [`CommandExecutor`] with an explicit argument vector; nothing is passed
//! through a shell. Executable lookup goes through [`ToolLocator`] so the
//! publish step can decide between invoking the toolchain and reusing a
//! cached artifact without touching the real `PATH` in tests.

use crate::error::{BuildPhase, PackagerError, Result};
use camino::Utf8PathBuf;
use log::debug;
use std::process::{Command, Output};

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the command.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use somr_build::exec::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("dotnet", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), somr_build::error::PackagerError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        debug!("running {cmd} {}", args.join(" "));
        Command::new(cmd)
            .args(args)
            .output()
            .map_err(PackagerError::from)
    }
}

/// Resolves executable names against the search path.
#[cfg_attr(test, mockall::automock)]
pub trait ToolLocator {
    /// Return the full path of `name`, or `None` when it is not installed.
    fn locate(&self, name: &str) -> Option<Utf8PathBuf>;
}

/// Looks tools up on the process `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemToolLocator;

impl ToolLocator for SystemToolLocator {
    fn locate(&self, name: &str) -> Option<Utf8PathBuf> {
        let found = which::which(name)
            .ok()
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok());
        debug!("locate {name}: {found:?}");
        found
    }
}

/// Run a command and map a non-zero exit to [`PackagerError::BuildFailed`].
///
/// Spawn failures surface as [`PackagerError::BuildFailed`] too, since for
/// the caller the tool has failed either way.
///
/// # Errors
///
/// Returns [`PackagerError::BuildFailed`] carrying the exit code and trimmed
/// stderr (or stdout when stderr is empty).
pub fn run_checked(
    executor: &dyn CommandExecutor,
    phase: BuildPhase,
    cmd: &str,
    args: &[&str],
) -> Result<Output> {
    let output = executor.run(cmd, args).map_err(|err| match err {
        PackagerError::Io(source) => PackagerError::BuildFailed {
            phase,
            architecture: None,
            status: None,
            reason: format!("failed to run {cmd}: {source}"),
        },
        other => other,
    })?;

    if output.status.success() {
        return Ok(output);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let reason = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_owned()
    } else {
        stderr.trim().to_owned()
    };
    Err(PackagerError::BuildFailed {
        phase,
        architecture: None,
        status: output.status.code(),
        reason,
    })
}
