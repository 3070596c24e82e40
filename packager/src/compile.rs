//! Extension module compilation with per-toolchain flags.
//!
//! [`customize`] copies the flag set for the active toolchain onto every
//! extension module; a [`CompilerDriver`] then turns each module into a
//! shared object. Only the flag selection is toolchain-aware here; the driver
//! renders the usual command-line shapes of a unix `cc` and of MSVC `cl`.

use crate::config::ExtensionConfig;
use crate::error::{BuildPhase, Result};
use crate::exec::{CommandExecutor, run_checked};
use crate::flags::{FlagTable, GCC, MINGW32, MSVC, ToolchainFlagSet, UNIX};
use crate::platform::OperatingSystem;
use crate::python::PythonPaths;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use std::fs;

/// An extension module and the flags it is built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionModule {
    /// Module name; the output file stem.
    pub name: String,
    /// C sources, relative to the project root.
    pub sources: Vec<Utf8PathBuf>,
    /// Header search directories, relative to the project root.
    pub include_dirs: Vec<Utf8PathBuf>,
    /// Extra compiler arguments.
    pub compile_flags: Vec<String>,
    /// Extra linker arguments.
    pub link_flags: Vec<String>,
    /// Libraries to link against.
    pub libraries: Vec<String>,
    /// Library search directories, relative to the project root.
    pub library_dirs: Vec<String>,
}

impl From<&ExtensionConfig> for ExtensionModule {
    fn from(config: &ExtensionConfig) -> Self {
        Self {
            name: config.name.clone(),
            sources: config.sources.clone(),
            include_dirs: config.include_dirs.clone(),
            compile_flags: Vec::new(),
            link_flags: Vec::new(),
            libraries: Vec::new(),
            library_dirs: Vec::new(),
        }
    }
}

impl ExtensionModule {
    fn apply(&mut self, set: &ToolchainFlagSet) {
        self.compile_flags.clone_from(&set.compile_flags);
        self.link_flags.clone_from(&set.link_flags);
        if !set.required_libraries.is_empty() {
            self.libraries.clone_from(&set.required_libraries);
            self.library_dirs.clone_from(&set.library_dirs);
        }
    }
}

/// Outcome of [`customize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Customization {
    /// The toolchain's flag set was applied to every module.
    Applied {
        /// Toolchain identifier.
        toolchain: String,
    },
    /// The toolchain has no entry in the table; modules are built as-is.
    UnknownToolchain {
        /// Toolchain identifier.
        toolchain: String,
    },
}

/// Apply the flag set for `toolchain` to every module.
///
/// An identifier missing from the table is not an error: it is logged and
/// the modules keep their existing flags.
pub fn customize(
    toolchain: &str,
    table: &FlagTable,
    modules: &mut [ExtensionModule],
) -> Customization {
    let Some(set) = table.get(toolchain) else {
        warn!("using unknown compiler: {toolchain}");
        return Customization::UnknownToolchain {
            toolchain: toolchain.to_owned(),
        };
    };
    for module in modules.iter_mut() {
        module.apply(set);
    }
    debug!("applied {toolchain} flags to {} module(s)", modules.len());
    Customization::Applied {
        toolchain: toolchain.to_owned(),
    }
}

/// Toolchain identifier used on `os` when none is configured.
#[must_use]
pub const fn default_toolchain(os: OperatingSystem) -> &'static str {
    if os.is_windows() { MSVC } else { UNIX }
}

/// Compiler executable for `toolchain`, honouring `$CC` for unix compilers.
#[must_use]
pub fn default_compiler(toolchain: &str) -> String {
    match toolchain {
        MSVC => "cl".to_owned(),
        GCC | MINGW32 => "gcc".to_owned(),
        _ => std::env::var("CC")
            .ok()
            .filter(|cc| !cc.trim().is_empty())
            .unwrap_or_else(|| "cc".to_owned()),
    }
}

/// File suffix of a built extension module on `os`.
#[must_use]
pub const fn extension_suffix(os: OperatingSystem) -> &'static str {
    if os.is_windows() { ".pyd" } else { ".so" }
}

/// Builds one extension module.
pub trait CompilerDriver {
    /// Compile and link `module` into `out_dir`, returning the output path.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PackagerError::BuildFailed`] if the compiler
    /// fails.
    fn compile(&self, module: &ExtensionModule, out_dir: &Utf8Path) -> Result<Utf8PathBuf>;
}

/// Drives a command-line C compiler through a [`CommandExecutor`].
pub struct CommandCompilerDriver<'a> {
    executor: &'a dyn CommandExecutor,
    compiler: String,
    toolchain: String,
    project_root: Utf8PathBuf,
    host_os: OperatingSystem,
    python: Option<PythonPaths>,
}

impl<'a> CommandCompilerDriver<'a> {
    /// Create a driver invoking `compiler` with `toolchain` conventions.
    #[must_use]
    pub fn new(
        executor: &'a dyn CommandExecutor,
        compiler: impl Into<String>,
        toolchain: impl Into<String>,
        project_root: impl Into<Utf8PathBuf>,
        host_os: OperatingSystem,
    ) -> Self {
        Self {
            executor,
            compiler: compiler.into(),
            toolchain: toolchain.into(),
            project_root: project_root.into(),
            host_os,
            python: None,
        }
    }

    /// Compile against the Python headers and import libraries in `paths`.
    #[must_use]
    pub fn with_python(mut self, paths: PythonPaths) -> Self {
        self.python = Some(paths);
        self
    }

    fn python_library_dirs(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.python.iter().flat_map(|paths| paths.library_dirs.iter())
    }

    /// Compiler executable.
    #[must_use]
    pub fn compiler(&self) -> &str {
        &self.compiler
    }

    /// Output path of `module` under `out_dir`.
    #[must_use]
    pub fn output_path(&self, module: &ExtensionModule, out_dir: &Utf8Path) -> Utf8PathBuf {
        out_dir.join(format!("{}{}", module.name, extension_suffix(self.host_os)))
    }

    /// The argument vector for compiling `module` to `output`.
    #[must_use]
    pub fn arguments(&self, module: &ExtensionModule, output: &Utf8Path) -> Vec<String> {
        if self.toolchain == MSVC {
            self.msvc_arguments(module, output)
        } else {
            self.unix_arguments(module, output)
        }
    }

    fn unix_arguments(&self, module: &ExtensionModule, output: &Utf8Path) -> Vec<String> {
        let mut args = Vec::new();
        if self.host_os.is_macos() {
            args.extend(["-bundle", "-undefined", "dynamic_lookup"].map(String::from));
        } else if self.toolchain == MINGW32 {
            args.push("-shared".to_owned());
        } else {
            args.extend(["-shared", "-fPIC"].map(String::from));
        }
        for dir in &module.include_dirs {
            args.push(format!("-I{}", self.project_root.join(dir)));
        }
        if let Some(python) = &self.python {
            args.push(format!("-I{}", python.include_dir));
        }
        args.extend(module.compile_flags.iter().cloned());
        args.extend(
            module
                .sources
                .iter()
                .map(|source| self.project_root.join(source).into_string()),
        );
        args.push("-o".to_owned());
        args.push(output.to_string());
        for dir in &module.library_dirs {
            args.push(format!("-L{}", self.project_root.join(dir)));
        }
        for dir in self.python_library_dirs() {
            args.push(format!("-L{dir}"));
        }
        for library in &module.libraries {
            args.push(format!("-l{library}"));
        }
        args.extend(module.link_flags.iter().cloned());
        args
    }

    fn msvc_arguments(&self, module: &ExtensionModule, output: &Utf8Path) -> Vec<String> {
        let mut args: Vec<String> = ["/nologo", "/LD"].map(String::from).to_vec();
        for dir in &module.include_dirs {
            args.push(format!("/I{}", self.project_root.join(dir)));
        }
        if let Some(python) = &self.python {
            args.push(format!("/I{}", python.include_dir));
        }
        args.extend(module.compile_flags.iter().cloned());
        args.extend(
            module
                .sources
                .iter()
                .map(|source| self.project_root.join(source).into_string()),
        );
        args.push(format!("/Fe:{output}"));
        args.push("/link".to_owned());
        for dir in &module.library_dirs {
            args.push(format!("/LIBPATH:{}", self.project_root.join(dir)));
        }
        for dir in self.python_library_dirs() {
            args.push(format!("/LIBPATH:{dir}"));
        }
        for library in &module.libraries {
            args.push(format!("{library}.lib"));
        }
        args.extend(module.link_flags.iter().cloned());
        args
    }
}

impl CompilerDriver for CommandCompilerDriver<'_> {
    fn compile(&self, module: &ExtensionModule, out_dir: &Utf8Path) -> Result<Utf8PathBuf> {
        fs::create_dir_all(out_dir)?;
        let output = self.output_path(module, out_dir);
        let args = self.arguments(module, &output);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        info!("building extension {} with {}", module.name, self.compiler);
        run_checked(self.executor, BuildPhase::Compile, &self.compiler, &arg_refs)?;
        Ok(output)
    }
}
