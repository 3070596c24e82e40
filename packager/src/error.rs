//! Error types for the native build orchestrator.
//!
//! Every failure aborts the current pipeline phase and propagates unchanged to
//! the CLI, which maps each variant to an exit code. Variants carry enough
//! context (phase, architecture, tool exit status) to diagnose a failure
//! without re-running the build verbosely.

use camino::Utf8PathBuf;
use std::fmt;
use thiserror::Error;

/// The pipeline phase in which an external tool failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// Native library publish via the .NET toolchain.
    Publish,
    /// Universal binary merge via `lipo`.
    Merge,
    /// Compile and link of the wrapper extension module.
    Compile,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Publish => "publish",
            Self::Merge => "merge",
            Self::Compile => "compile",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while building and staging the native library.
#[derive(Debug, Error)]
pub enum PackagerError {
    /// The host CPU reported a machine identifier with no known mapping.
    #[error("unsupported architecture \"{machine}\"")]
    UnsupportedArchitecture {
        /// The raw machine token reported by the host.
        machine: String,
    },

    /// A runtime identifier contains characters outside `[A-Za-z0-9-]`.
    #[error("invalid runtime identifier \"{value}\": only ASCII letters, digits and '-' are allowed")]
    InvalidIdentifier {
        /// The rejected identifier.
        value: String,
    },

    /// The native build toolchain is not on the search path and no cached
    /// artifact could be used instead.
    #[error("{tool} not found on PATH; install it or provide a prebuilt artifact")]
    ToolchainNotFound {
        /// Name of the missing executable.
        tool: String,
    },

    /// An external tool ran and reported failure.
    #[error("{phase} failed{}{}: {reason}", architecture_suffix(.architecture.as_deref()), status_suffix(*.status))]
    BuildFailed {
        /// The phase that failed.
        phase: BuildPhase,
        /// The architecture being built, for composed builds.
        architecture: Option<String>,
        /// The exit code of the external tool, when it exited normally.
        status: Option<i32>,
        /// Captured diagnostic output or the underlying error message.
        reason: String,
    },

    /// The architecture merge tool is not on the search path.
    #[error("{tool} not found on PATH; it is required for universal macOS builds")]
    MergeToolNotFound {
        /// Name of the missing executable.
        tool: String,
    },

    /// A file expected from an earlier phase does not exist.
    #[error("expected artifact {path} does not exist; did the native build run?")]
    ArtifactMissing {
        /// Path of the missing file.
        path: Utf8PathBuf,
    },

    /// Copying an artifact or creating a destination directory failed.
    #[error("staging {source_path} to {destination} failed: {reason}")]
    StagingFailed {
        /// The file being copied.
        source_path: Utf8PathBuf,
        /// The destination path or directory.
        destination: Utf8PathBuf,
        /// Description of the underlying I/O error.
        reason: String,
    },

    /// The project configuration file could not be read or parsed.
    #[error("invalid configuration at {path}: {reason}")]
    InvalidConfig {
        /// Path to the configuration file.
        path: Utf8PathBuf,
        /// Description of the parse error.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

fn architecture_suffix(architecture: Option<&str>) -> String {
    architecture.map_or_else(String::new, |arch| format!(" for {arch}"))
}

fn status_suffix(status: Option<i32>) -> String {
    status.map_or_else(String::new, |code| format!(" (exit code {code})"))
}

impl PackagerError {
    /// Attach the architecture being built to this error.
    ///
    /// Failures from a per-architecture publish surface as
    /// [`PackagerError::BuildFailed`] so callers see a single error kind for
    /// composed builds, with the architecture naming which half failed.
    #[must_use]
    pub fn for_architecture(self, architecture: &str) -> Self {
        match self {
            Self::BuildFailed {
                phase,
                status,
                reason,
                ..
            } => Self::BuildFailed {
                phase,
                architecture: Some(architecture.to_owned()),
                status,
                reason,
            },
            other => Self::BuildFailed {
                phase: BuildPhase::Publish,
                architecture: Some(architecture.to_owned()),
                status: None,
                reason: other.to_string(),
            },
        }
    }

    /// Process exit code for the CLI.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::UnsupportedArchitecture { .. } | Self::InvalidIdentifier { .. } => 2,
            Self::ToolchainNotFound { .. } | Self::MergeToolNotFound { .. } => 3,
            Self::BuildFailed { .. } => 4,
            Self::ArtifactMissing { .. } | Self::StagingFailed { .. } => 5,
            Self::InvalidConfig { .. } => 6,
            Self::Io(_) => 1,
            #[cfg(any(test, feature = "test-support"))]
            Self::StubMismatch { .. } => 1,
        }
    }
}

/// Result type alias using [`PackagerError`].
pub type Result<T> = std::result::Result<T, PackagerError>;
