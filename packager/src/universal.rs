//! Universal (arm64 + x86-64) macOS library synthesis.
//!
//! The composer publishes the library once per architecture, parks each
//! result in a scratch directory under an architecture-qualified name, and
//! merges the two with `lipo`. The merged file is written to a temporary name
//! and only renamed to its final path once `lipo` succeeds, so a failed
//! build never leaves a single-architecture or partial file where the
//! universal library is expected.

use crate::error::{BuildPhase, PackagerError, Result};
use crate::exec::{CommandExecutor, ToolLocator, run_checked};
use crate::platform::{Architecture, PlatformIdentity};
use crate::publisher::{ArtifactKind, NativeArtifact, NativePublisher};
use crate::runtime_id::to_runtime_identifier;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::fs;
use tempfile::NamedTempFile;

/// The architectures merged into a universal library, in merge order.
pub const UNIVERSAL_ARCHITECTURES: [Architecture; 2] = [Architecture::Arm64, Architecture::X64];

/// Builds a multi-architecture macOS library from two single-architecture
/// publishes.
pub struct UniversalBinaryComposer<'a> {
    publisher: &'a NativePublisher<'a>,
    executor: &'a dyn CommandExecutor,
    locator: &'a dyn ToolLocator,
    merge_tool: &'a str,
    scratch_dir: Utf8PathBuf,
}

impl<'a> UniversalBinaryComposer<'a> {
    /// Create a composer writing into `scratch_dir`.
    #[must_use]
    pub fn new(
        publisher: &'a NativePublisher<'a>,
        executor: &'a dyn CommandExecutor,
        locator: &'a dyn ToolLocator,
        merge_tool: &'a str,
        scratch_dir: Utf8PathBuf,
    ) -> Self {
        Self {
            publisher,
            executor,
            locator,
            merge_tool,
            scratch_dir,
        }
    }

    /// Final path of the merged library.
    #[must_use]
    pub fn combined_path(&self) -> Utf8PathBuf {
        self.scratch_dir
            .join(self.publisher.library().file_name(self.publisher.host_os()))
    }

    /// Publish both architectures and merge them.
    ///
    /// The two publishes share the project's generated override file and its
    /// conventional output path, so they run one after the other; each
    /// result is moved aside before the next publish starts.
    ///
    /// # Errors
    ///
    /// - [`PackagerError::MergeToolNotFound`] if `lipo` is not installed. This
    ///   is checked before either publish starts.
    /// - [`PackagerError::BuildFailed`] naming the architecture if either
    ///   publish fails, or naming the merge phase if `lipo` fails.
    pub fn compose_universal(&self, identity: &PlatformIdentity) -> Result<NativeArtifact> {
        let merge_tool = self.locator.locate(self.merge_tool).ok_or_else(|| {
            PackagerError::MergeToolNotFound {
                tool: self.merge_tool.to_owned(),
            }
        })?;

        let mut inputs = Vec::with_capacity(UNIVERSAL_ARCHITECTURES.len());
        for architecture in &UNIVERSAL_ARCHITECTURES {
            inputs.push(self.publish_architecture(identity, architecture)?);
        }

        let combined = self.merge(&merge_tool, &inputs)?;
        Ok(NativeArtifact {
            source_path: combined,
            logical_name: self.publisher.library(),
            kind: ArtifactKind::Plain,
        })
    }

    /// Publish one architecture and move the result into the scratch dir.
    fn publish_architecture(
        &self,
        identity: &PlatformIdentity,
        architecture: &Architecture,
    ) -> Result<Utf8PathBuf> {
        let token = architecture.token()?;
        let rid = to_runtime_identifier(identity, Some(architecture))?;
        let artifact = self
            .publisher
            .publish(rid.as_str())
            .map_err(|err| err.for_architecture(token))?;

        fs::create_dir_all(&self.scratch_dir)?;
        let parked = self
            .scratch_dir
            .join(self.publisher.library().architecture_file_name(token));
        debug!("moving {} -> {parked}", artifact.source_path);
        move_file(&artifact.source_path, &parked)?;
        Ok(parked)
    }

    fn merge(&self, merge_tool: &Utf8Path, inputs: &[Utf8PathBuf]) -> Result<Utf8PathBuf> {
        let combined = self.combined_path();
        let partial = NamedTempFile::new_in(&self.scratch_dir)?;
        let partial_path = Utf8Path::from_path(partial.path()).ok_or_else(|| {
            PackagerError::Io(std::io::Error::other(format!(
                "non UTF-8 temporary path under {}",
                self.scratch_dir
            )))
        })?;

        let mut args = vec!["-output", partial_path.as_str(), "-create"];
        args.extend(inputs.iter().map(|input| input.as_str()));
        info!("merging {} architectures into {combined}", inputs.len());
        run_checked(self.executor, BuildPhase::Merge, merge_tool.as_str(), &args)?;

        partial
            .persist(&combined)
            .map_err(|err| PackagerError::Io(err.error))?;
        Ok(combined)
    }
}

/// Move `from` to `to`, copying when a rename crosses file systems.
fn move_file(from: &Utf8Path, to: &Utf8Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)?;
    Ok(())
}
