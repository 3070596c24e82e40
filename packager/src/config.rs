//! Project configuration loaded from `somr-build.toml`.
//!
//! Every setting has a default matching the layout of the SoMRandomizer
//! checkout, so the file is optional. Unknown keys are rejected so that typos
//! fail loudly instead of silently falling back to defaults.
//!
//! ```toml
//! profile = "release"
//!
//! [native]
//! project_dir = "SecretOfManaRandomizer/SoMRandomizer.api"
//! library_name = "SoMRandomizer.api"
//! framework = "net10.0"
//!
//! [universal]
//! merge_tool = "lipo"
//! scratch_dir = "build/macos"
//!
//! [python]
//! interpreter = "python3.12"
//!
//! [[extension]]
//! name = "_somr"
//! sources = ["src/_somr.c"]
//! ```

use crate::error::{PackagerError, Result};
use crate::flags::Profile;
use crate::naming::{DEFAULT_LIBRARY_NAME, NativeLibraryName};
use crate::platform::OperatingSystem;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// Default configuration file name, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "somr-build.toml";

/// Top-level build configuration.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PackagerConfig {
    /// Profile used when the CLI does not override it.
    pub profile: Profile,
    /// The .NET project producing the native library.
    pub native: NativeProjectConfig,
    /// Settings for the macOS universal build.
    pub universal: UniversalConfig,
    /// Python interpreter whose headers the extensions compile against.
    pub python: PythonConfig,
    /// Extension modules compiled against the native library.
    #[serde(rename = "extension")]
    pub extensions: Vec<ExtensionConfig>,
}

/// Location and toolchain settings of the native .NET project.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NativeProjectConfig {
    /// Project directory, relative to the project root.
    pub project_dir: Utf8PathBuf,
    /// Assembly name of the published library.
    pub library_name: String,
    /// Target framework moniker used in the output path.
    pub framework: String,
    /// Build configuration used in the output path.
    pub configuration: String,
    /// Executable name of the .NET SDK.
    pub toolchain: String,
    /// Environment variable signalling a CI wheel build with a prebuilt
    /// library.
    pub cache_signal: String,
}

impl Default for NativeProjectConfig {
    fn default() -> Self {
        Self {
            project_dir: Utf8PathBuf::from("SecretOfManaRandomizer/SoMRandomizer.api"),
            library_name: DEFAULT_LIBRARY_NAME.to_owned(),
            framework: "net10.0".to_owned(),
            configuration: "Release".to_owned(),
            toolchain: "dotnet".to_owned(),
            cache_signal: "CIBUILDWHEEL".to_owned(),
        }
    }
}

impl NativeProjectConfig {
    /// The library name as a typed value.
    #[must_use]
    pub fn library(&self) -> NativeLibraryName {
        NativeLibraryName::new(self.library_name.as_str())
    }

    /// Absolute project directory under `root`.
    #[must_use]
    pub fn project_path(&self, root: &Utf8Path) -> Utf8PathBuf {
        root.join(&self.project_dir)
    }

    /// Path of the generated MSBuild user file declaring the runtime
    /// identifier.
    #[must_use]
    pub fn override_file(&self, root: &Utf8Path) -> Utf8PathBuf {
        self.project_path(root)
            .join(format!("{}.csproj.user", self.library_name))
    }

    /// Conventional path of the published library on `os`.
    #[must_use]
    pub fn output_path(&self, root: &Utf8Path, os: OperatingSystem) -> Utf8PathBuf {
        self.project_path(root)
            .join("bin")
            .join(&self.configuration)
            .join(&self.framework)
            .join("native")
            .join(self.library().file_name(os))
    }
}

/// Settings for merging per-architecture macOS builds.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UniversalConfig {
    /// Executable name of the merge tool.
    pub merge_tool: String,
    /// Scratch directory, relative to the project root.
    pub scratch_dir: Utf8PathBuf,
}

impl Default for UniversalConfig {
    fn default() -> Self {
        Self {
            merge_tool: "lipo".to_owned(),
            scratch_dir: Utf8PathBuf::from("build").join("macos"),
        }
    }
}

/// Python development files used by the extension build.
///
/// With `include_dir` unset the interpreter is asked for its paths.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PythonConfig {
    /// Interpreter to query; `python` on Windows and `python3` elsewhere.
    pub interpreter: Option<String>,
    /// Directory containing `Python.h`, bypassing the interpreter.
    pub include_dir: Option<Utf8PathBuf>,
    /// Extra import library directories.
    pub library_dirs: Vec<Utf8PathBuf>,
}

/// One extension module linked against the native library.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExtensionConfig {
    /// Module name; also the output file stem.
    pub name: String,
    /// C sources, relative to the project root.
    pub sources: Vec<Utf8PathBuf>,
    /// Header search directories, relative to the project root.
    #[serde(default)]
    pub include_dirs: Vec<Utf8PathBuf>,
}

impl PackagerConfig {
    /// Load the configuration file at `path`, using defaults when it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::InvalidConfig`] if the file exists but cannot be
    /// read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no configuration at {path}; using defaults");
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(path).map_err(|e| PackagerError::InvalidConfig {
                path: path.to_owned(),
                reason: e.to_string(),
            })?;
        Self::parse(path, &contents)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::InvalidConfig`] naming `path` on parse errors.
    pub fn parse(path: &Utf8Path, contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| PackagerError::InvalidConfig {
            path: path.to_owned(),
            reason: e.message().to_owned(),
        })
    }

    /// Extension modules to build, falling back to the bundled wrapper
    /// module when none are configured.
    #[must_use]
    pub fn extensions_or_default(&self) -> Vec<ExtensionConfig> {
        if self.extensions.is_empty() {
            vec![ExtensionConfig {
                name: "_somr".to_owned(),
                sources: vec![Utf8PathBuf::from("src").join("_somr.c")],
                include_dirs: vec![Utf8PathBuf::from("include")],
            }]
        } else {
            self.extensions.clone()
        }
    }
}
