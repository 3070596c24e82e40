//! Native library publish via the .NET SDK.
//!
//! `dotnet publish` with native AOT produces a self-contained shared library
//! for one runtime identifier. The project does not accept the identifier as
//! a `-r` argument, so it is declared in a generated `<project>.csproj.user`
//! file that MSBuild merges into the project before every publish.
//!
//! When the SDK is not installed the publisher can reuse a library produced
//! by an earlier stage of a CI wheel build, signalled by an environment
//! variable. An installed SDK always takes precedence over that cache.

use crate::config::NativeProjectConfig;
use crate::error::{BuildPhase, PackagerError, Result};
use crate::exec::{CommandExecutor, ToolLocator, run_checked};
use crate::naming::NativeLibraryName;
use crate::platform::OperatingSystem;
use crate::runtime_id::RuntimeIdentifier;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::fs;

/// Whether a published library comes with a separate import library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// The shared library alone.
    Plain,
    /// A Windows DLL with its `.lib` import library next to it.
    WithImportLibrary,
}

impl ArtifactKind {
    /// The kind produced by a publish on `os`.
    #[must_use]
    pub const fn for_os(os: OperatingSystem) -> Self {
        if os.is_windows() {
            Self::WithImportLibrary
        } else {
            Self::Plain
        }
    }
}

/// A shared library produced by the publish step.
///
/// The publish step owns the file; consumers copy it and never move or
/// delete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeArtifact {
    /// Location of the library on disk.
    pub source_path: Utf8PathBuf,
    /// Assembly name the library was published as.
    pub logical_name: NativeLibraryName,
    /// Whether an import library accompanies it.
    pub kind: ArtifactKind,
}

impl NativeArtifact {
    /// File name of the library.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.source_path.file_name().unwrap_or(self.source_path.as_str())
    }

    /// Path of the import library, when the artifact has one.
    #[must_use]
    pub fn import_library_path(&self) -> Option<Utf8PathBuf> {
        match self.kind {
            ArtifactKind::WithImportLibrary => Some(
                self.source_path
                    .with_file_name(self.logical_name.import_library_file_name()),
            ),
            ArtifactKind::Plain => None,
        }
    }
}

/// Render the MSBuild user file declaring `rid`.
#[must_use]
pub fn override_file_contents(rid: &RuntimeIdentifier) -> String {
    format!(
        "<Project><PropertyGroup><RuntimeIdentifier>{rid}</RuntimeIdentifier></PropertyGroup></Project>"
    )
}

/// Map a `-v` count to an MSBuild verbosity level.
const fn msbuild_verbosity(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("normal"),
        2 => Some("detailed"),
        _ => Some("diagnostic"),
    }
}

/// Publishes the native library for one runtime identifier.
pub struct NativePublisher<'a> {
    project_root: &'a Utf8Path,
    native: &'a NativeProjectConfig,
    host_os: OperatingSystem,
    executor: &'a dyn CommandExecutor,
    locator: &'a dyn ToolLocator,
    verbosity: u8,
}

impl<'a> NativePublisher<'a> {
    /// Create a publisher for the project described by `native`.
    #[must_use]
    pub fn new(
        project_root: &'a Utf8Path,
        native: &'a NativeProjectConfig,
        host_os: OperatingSystem,
        executor: &'a dyn CommandExecutor,
        locator: &'a dyn ToolLocator,
    ) -> Self {
        Self {
            project_root,
            native,
            host_os,
            executor,
            locator,
            verbosity: 0,
        }
    }

    /// Pass a verbosity level through to MSBuild.
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Host operating system the publisher produces libraries for.
    #[must_use]
    pub const fn host_os(&self) -> OperatingSystem {
        self.host_os
    }

    /// Assembly name of the published library.
    #[must_use]
    pub fn library(&self) -> NativeLibraryName {
        self.native.library()
    }

    /// Conventional output path of a publish.
    #[must_use]
    pub fn output_path(&self) -> Utf8PathBuf {
        self.native.output_path(self.project_root, self.host_os)
    }

    /// Publish the native library for `rid`.
    ///
    /// # Errors
    ///
    /// - [`PackagerError::InvalidIdentifier`] if `rid` is not `[A-Za-z0-9-]+`;
    ///   nothing is written in that case.
    /// - [`PackagerError::ToolchainNotFound`] if the SDK is not on the search
    ///   path and no cached artifact can be used.
    /// - [`PackagerError::BuildFailed`] if `dotnet publish` fails.
    /// - [`PackagerError::ArtifactMissing`] if the publish succeeds without
    ///   producing the library at its conventional path.
    pub fn publish(&self, rid: &str) -> Result<NativeArtifact> {
        let rid = RuntimeIdentifier::new(rid)?;
        let output = self.output_path();

        let Some(toolchain) = self.locator.locate(&self.native.toolchain) else {
            return self.cached_artifact(&output);
        };

        let override_file = self.native.override_file(self.project_root);
        debug!("writing {override_file} for {rid}");
        fs::write(&override_file, override_file_contents(&rid))?;

        let project = self.native.project_path(self.project_root);
        let mut args = vec!["publish", project.as_str()];
        if let Some(level) = msbuild_verbosity(self.verbosity) {
            args.extend(["--verbosity", level]);
        }
        info!("publishing {} for {rid}", self.native.library_name);
        run_checked(self.executor, BuildPhase::Publish, toolchain.as_str(), &args)?;

        if !output.is_file() {
            return Err(PackagerError::ArtifactMissing { path: output });
        }
        Ok(self.artifact_at(output))
    }

    /// Fall back to a library left by an earlier CI stage.
    ///
    /// The cached file is used regardless of the runtime identifier it was
    /// built for; the CI stage that produced it owns that choice.
    fn cached_artifact(&self, output: &Utf8Path) -> Result<NativeArtifact> {
        if cache_signal_present(&self.native.cache_signal) && output.is_file() {
            info!(
                "{} not found; using prebuilt {output} ({} is set)",
                self.native.toolchain, self.native.cache_signal
            );
            return Ok(self.artifact_at(output.to_owned()));
        }
        Err(PackagerError::ToolchainNotFound {
            tool: self.native.toolchain.clone(),
        })
    }

    fn artifact_at(&self, source_path: Utf8PathBuf) -> NativeArtifact {
        NativeArtifact {
            source_path,
            logical_name: self.library(),
            kind: ArtifactKind::for_os(self.host_os),
        }
    }
}

/// Whether the environment variable `name` is set to a non-empty value.
#[must_use]
pub fn cache_signal_present(name: &str) -> bool {
    std::env::var_os(name).is_some_and(|value| !value.is_empty())
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
