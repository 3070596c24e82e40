//! Python development paths for the extension build.
//!
//! Extension modules include `Python.h`, and on Windows they link against
//! the interpreter's import library. Both locations come from the target
//! interpreter's `sysconfig`, queried once per build, unless the
//! configuration pins them.

use crate::config::PythonConfig;
use crate::error::{BuildPhase, PackagerError, Result};
use crate::exec::{CommandExecutor, ToolLocator, run_checked};
use crate::platform::OperatingSystem;
use camino::Utf8PathBuf;
use log::debug;
use serde::Deserialize;

/// Script printing the interpreter's header and library directories as JSON.
pub const PATHS_SCRIPT: &str = concat!(
    "import json, os, sys, sysconfig\n",
    "libs = [os.path.join(sys.base_prefix, 'libs')] if os.name == 'nt' else []\n",
    "print(json.dumps({'include_dir': sysconfig.get_paths()['include'], ",
    "'library_dirs': libs}))\n",
);

/// Where the Python headers and import libraries live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PythonPaths {
    /// Directory containing `Python.h`.
    pub include_dir: Utf8PathBuf,
    /// Directories searched for `pythonXY.lib`; empty off Windows.
    #[serde(default)]
    pub library_dirs: Vec<Utf8PathBuf>,
}

impl PythonPaths {
    /// Parse the output of [`PATHS_SCRIPT`].
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::BuildFailed`] for the compile phase if the
    /// output is not the expected JSON object.
    pub fn parse(interpreter: &str, stdout: &[u8]) -> Result<Self> {
        serde_json::from_slice(stdout).map_err(|e| PackagerError::BuildFailed {
            phase: BuildPhase::Compile,
            architecture: None,
            status: None,
            reason: format!("unexpected output from {interpreter} sysconfig query: {e}"),
        })
    }
}

/// Interpreter used on `os` when none is configured.
#[must_use]
pub const fn default_interpreter(os: OperatingSystem) -> &'static str {
    if os.is_windows() { "python" } else { "python3" }
}

/// Resolve the Python development paths for the extension build.
///
/// A configured `include_dir` is used as-is without running anything.
/// Otherwise the interpreter is located and asked for its `sysconfig`
/// paths. Configured `library_dirs` are appended in both cases.
///
/// # Errors
///
/// - [`PackagerError::ToolchainNotFound`] if the interpreter is not
///   installed.
/// - [`PackagerError::BuildFailed`] if the query fails or prints something
///   unexpected.
pub fn resolve_python_paths(
    config: &PythonConfig,
    os: OperatingSystem,
    executor: &dyn CommandExecutor,
    locator: &dyn ToolLocator,
) -> Result<PythonPaths> {
    let mut paths = match &config.include_dir {
        Some(include_dir) => PythonPaths {
            include_dir: include_dir.clone(),
            library_dirs: Vec::new(),
        },
        None => query_interpreter(config, os, executor, locator)?,
    };
    paths.library_dirs.extend(config.library_dirs.iter().cloned());
    debug!("python headers in {}", paths.include_dir);
    Ok(paths)
}

fn query_interpreter(
    config: &PythonConfig,
    os: OperatingSystem,
    executor: &dyn CommandExecutor,
    locator: &dyn ToolLocator,
) -> Result<PythonPaths> {
    let name = config
        .interpreter
        .as_deref()
        .unwrap_or_else(|| default_interpreter(os));
    let interpreter = locator
        .locate(name)
        .ok_or_else(|| PackagerError::ToolchainNotFound {
            tool: name.to_owned(),
        })?;
    let output = run_checked(
        executor,
        BuildPhase::Compile,
        interpreter.as_str(),
        &["-c", PATHS_SCRIPT],
    )?;
    PythonPaths::parse(name, &output.stdout)
}
