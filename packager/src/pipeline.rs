//! Build pipeline orchestration.
//!
//! The pipeline runs the native phase (a single publish or the universal
//! macOS composition), stages the resulting library, then compiles the
//! extension modules against the copy staged in the current directory. The
//! native phase must complete before the compile phase starts.

use crate::compile::{
    CommandCompilerDriver, CompilerDriver, Customization, ExtensionModule, customize,
};
use crate::config::PackagerConfig;
use crate::error::{PackagerError, Result};
use crate::exec::{CommandExecutor, ToolLocator};
use crate::flags::{FlagTable, Profile};
use crate::output::{copy_line, write_stderr_line};
use crate::platform::{Architecture, PlatformIdentity};
use crate::publisher::{ArtifactKind, NativeArtifact, NativePublisher};
use crate::python::resolve_python_paths;
use crate::runtime_id::{RuntimeIdentifier, os_token, to_runtime_identifier};
use crate::stager::{StagedFiles, StagingTargets, stage};
use crate::universal::{UNIVERSAL_ARCHITECTURES, UniversalBinaryComposer};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::io::Write;

/// Phases a build command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phases {
    /// Publish and stage the native library.
    pub native: bool,
    /// Compile extension modules.
    pub compile: bool,
}

impl Phases {
    /// Native phase followed by the compile phase.
    pub const ALL: Self = Self {
        native: true,
        compile: true,
    };
    /// Native phase only.
    pub const NATIVE_ONLY: Self = Self {
        native: true,
        compile: false,
    };
    /// Compile phase only.
    pub const COMPILE_ONLY: Self = Self {
        native: false,
        compile: true,
    };
}

/// How the native library is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativePlan {
    /// One publish for one runtime identifier.
    Single(RuntimeIdentifier),
    /// Publish every universal architecture and merge them.
    Universal,
}

impl fmt::Display for NativePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(rid) => write!(f, "publish {rid}"),
            Self::Universal => f.write_str("universal (arm64 + x64, merged with lipo)"),
        }
    }
}

/// Decide how to produce the native library.
///
/// An explicit identifier wins, then an explicit architecture. Without
/// either, macOS hosts build a universal library and every other host
/// publishes for its own identifier.
///
/// # Errors
///
/// - [`PackagerError::InvalidIdentifier`] for a malformed explicit
///   identifier.
/// - [`PackagerError::UnsupportedArchitecture`] if the architecture, forced
///   or detected, has no known mapping.
pub fn plan_native(
    identity: &PlatformIdentity,
    architecture: Option<&str>,
    rid: Option<&str>,
) -> Result<NativePlan> {
    if let Some(rid) = rid {
        return Ok(NativePlan::Single(RuntimeIdentifier::new(rid)?));
    }
    if let Some(machine) = architecture {
        let forced: Architecture = machine.parse()?;
        return Ok(NativePlan::Single(to_runtime_identifier(
            identity,
            Some(&forced),
        )?));
    }
    if identity.operating_system.is_macos() {
        return Ok(NativePlan::Universal);
    }
    Ok(NativePlan::Single(to_runtime_identifier(identity, None)?))
}

/// Context for a pipeline run.
pub struct PipelineContext<'a> {
    /// Project root; relative configuration paths resolve against it.
    pub project_root: &'a Utf8Path,
    /// Loaded configuration.
    pub config: &'a PackagerConfig,
    /// Host platform.
    pub identity: &'a PlatformIdentity,
    /// Build profile.
    pub profile: Profile,
    /// Where the native library is copied.
    pub targets: &'a StagingTargets,
    /// Runs external tools.
    pub executor: &'a dyn CommandExecutor,
    /// Finds external tools.
    pub locator: &'a dyn ToolLocator,
    /// Verbosity passed to the build tools.
    pub verbosity: u8,
    /// Suppress progress output.
    pub quiet: bool,
}

impl PipelineContext<'_> {
    fn progress(&self, stderr: &mut dyn Write, message: impl fmt::Display) {
        if !self.quiet {
            write_stderr_line(stderr, message);
        }
    }

    fn publisher(&self) -> NativePublisher<'_> {
        NativePublisher::new(
            self.project_root,
            &self.config.native,
            self.identity.operating_system,
            self.executor,
            self.locator,
        )
        .with_verbosity(self.verbosity)
    }

    fn scratch_dir(&self) -> Utf8PathBuf {
        self.project_root.join(&self.config.universal.scratch_dir)
    }

    /// The flag table for this host and profile.
    #[must_use]
    pub fn flag_table(&self) -> FlagTable {
        FlagTable::build(
            self.profile,
            self.identity.operating_system,
            &self.config.native.library(),
        )
    }

    /// Where `plan` leaves the native library once it succeeds.
    #[must_use]
    pub fn expected_artifact(&self, plan: &NativePlan) -> NativeArtifact {
        let os = self.identity.operating_system;
        let library = self.config.native.library();
        match plan {
            NativePlan::Single(_) => NativeArtifact {
                source_path: self.config.native.output_path(self.project_root, os),
                logical_name: library,
                kind: ArtifactKind::for_os(os),
            },
            NativePlan::Universal => NativeArtifact {
                source_path: self.scratch_dir().join(library.file_name(os)),
                logical_name: library,
                kind: ArtifactKind::Plain,
            },
        }
    }
}

/// Produce the native library according to `plan`.
///
/// # Errors
///
/// Propagates publish and merge failures unchanged.
pub fn perform_native_build(
    context: &PipelineContext<'_>,
    plan: &NativePlan,
    stderr: &mut dyn Write,
) -> Result<NativeArtifact> {
    let publisher = context.publisher();
    match plan {
        NativePlan::Single(rid) => {
            context.progress(
                stderr,
                format!("Publishing {} for {rid}...", publisher.library()),
            );
            publisher.publish(rid.as_str())
        }
        NativePlan::Universal => {
            let rids: Vec<String> = UNIVERSAL_ARCHITECTURES
                .iter()
                .filter_map(|arch| arch.token().ok())
                .map(|token| format!("{}-{token}", os_token(context.identity)))
                .collect();
            context.progress(
                stderr,
                format!(
                    "Publishing universal {} for {}...",
                    publisher.library(),
                    rids.join(" + ")
                ),
            );
            let composer = UniversalBinaryComposer::new(
                &publisher,
                context.executor,
                context.locator,
                &context.config.universal.merge_tool,
                context.scratch_dir(),
            );
            composer.compose_universal(context.identity)
        }
    }
}

/// Copy the native library into every staging target.
///
/// # Errors
///
/// Propagates [`PackagerError::ArtifactMissing`] and
/// [`PackagerError::StagingFailed`] from the stager.
pub fn stage_native(
    context: &PipelineContext<'_>,
    artifact: &NativeArtifact,
    stderr: &mut dyn Write,
) -> Result<StagedFiles> {
    let staged = stage(artifact, context.targets, context.identity.operating_system)?;
    for copy in &staged.copies {
        context.progress(stderr, copy_line(copy));
    }
    Ok(staged)
}

/// Compiler selection for the extension build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileSettings {
    /// Toolchain identifier keying the flag table.
    pub toolchain: String,
    /// Compiler executable.
    pub compiler: String,
}

/// Directory extension modules are written to.
#[must_use]
pub fn extension_out_dir(targets: &StagingTargets) -> &Utf8Path {
    targets
        .build_output_dir
        .as_deref()
        .unwrap_or(targets.current_dir.as_path())
}

/// Compile every configured extension module.
///
/// # Errors
///
/// - [`PackagerError::ArtifactMissing`] if the native library has not been
///   staged into the current directory.
/// - [`PackagerError::ToolchainNotFound`] if the Python interpreter is not
///   installed.
/// - [`PackagerError::BuildFailed`] if the Python query or a compile fails.
pub fn compile_extensions(
    context: &PipelineContext<'_>,
    settings: &CompileSettings,
    stderr: &mut dyn Write,
) -> Result<Vec<Utf8PathBuf>> {
    let os = context.identity.operating_system;
    let staged = context
        .targets
        .current_dir
        .join(context.config.native.library().file_name(os));
    if !staged.is_file() {
        return Err(PackagerError::ArtifactMissing { path: staged });
    }

    let python = resolve_python_paths(
        &context.config.python,
        os,
        context.executor,
        context.locator,
    )?;
    let mut modules: Vec<ExtensionModule> = context
        .config
        .extensions_or_default()
        .iter()
        .map(ExtensionModule::from)
        .collect();
    context.progress(stderr, "Running custom build extensions");
    if let Customization::UnknownToolchain { toolchain } =
        customize(&settings.toolchain, &context.flag_table(), &mut modules)
    {
        context.progress(stderr, format!("using unknown compiler: {toolchain}"));
    }

    let driver = CommandCompilerDriver::new(
        context.executor,
        settings.compiler.as_str(),
        settings.toolchain.as_str(),
        context.project_root,
        os,
    )
    .with_python(python);
    let out_dir = extension_out_dir(context.targets);
    let mut outputs = Vec::with_capacity(modules.len());
    for module in &modules {
        context.progress(stderr, format!("building '{}' extension", module.name));
        outputs.push(driver.compile(module, out_dir)?);
    }
    Ok(outputs)
}

/// Everything a pipeline run produced.
#[derive(Debug, Default)]
pub struct BuildSummary {
    /// The native library, when the native phase ran.
    pub artifact: Option<NativeArtifact>,
    /// Copies made by the stager.
    pub staged: StagedFiles,
    /// Built extension modules.
    pub extensions: Vec<Utf8PathBuf>,
}

/// Run the selected phases in order.
///
/// # Errors
///
/// Stops at the first failing phase and returns its error.
pub fn run_build(
    context: &PipelineContext<'_>,
    plan: &NativePlan,
    phases: Phases,
    settings: &CompileSettings,
    stderr: &mut dyn Write,
) -> Result<BuildSummary> {
    let mut summary = BuildSummary::default();
    if phases.native {
        let artifact = perform_native_build(context, plan, stderr)?;
        summary.staged = stage_native(context, &artifact, stderr)?;
        summary.artifact = Some(artifact);
    }
    if phases.compile {
        summary.extensions = compile_extensions(context, settings, stderr)?;
    }
    Ok(summary)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
