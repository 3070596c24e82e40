//! File naming for the native library and its side artifacts.
//!
//! The .NET publish step names its output after the project assembly
//! (`SoMRandomizer.api.dll`, `.so` or `.dylib`), without the `lib` prefix unix
//! linkers expect. Unix linkers other than Apple's accept `-l:<file>` to link
//! that file by name. Apple's linker does not resolve a same-directory
//! dylib that way, so macOS links against a *link alias*, a copy named
//! `lib<alias>.dylib`, while the unprefixed file is the one loaded at runtime.
//! The flag table and the stager both derive their names from here.

use crate::platform::OperatingSystem;
use std::fmt;

/// Default assembly name of the published native library.
pub const DEFAULT_LIBRARY_NAME: &str = "SoMRandomizer.api";

/// Name of the native library as produced by the publish step.
///
/// # Examples
///
/// ```
/// use somr_build::naming::NativeLibraryName;
/// use somr_build::platform::OperatingSystem;
///
/// let name = NativeLibraryName::new("SoMRandomizer.api");
/// assert_eq!(name.file_name(OperatingSystem::Windows), "SoMRandomizer.api.dll");
/// assert_eq!(name.link_alias(), "SoMRandomizer-api");
/// assert_eq!(name.link_alias_file_name(), "libSoMRandomizer-api.dylib");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeLibraryName(String);

impl NativeLibraryName {
    /// Create a library name from the assembly name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shared library file name on `os`.
    #[must_use]
    pub fn file_name(&self, os: OperatingSystem) -> String {
        format!("{}{}", self.0, os.library_extension())
    }

    /// Windows import library file name.
    #[must_use]
    pub fn import_library_file_name(&self) -> String {
        format!("{}.lib", self.0)
    }

    /// Library name passed to the macOS linker (`-l<alias>`).
    ///
    /// Dots are not valid in `-l` names on Apple's linker, so they become
    /// hyphens.
    #[must_use]
    pub fn link_alias(&self) -> String {
        self.0.replace('.', "-")
    }

    /// File name of the macOS link alias copy.
    #[must_use]
    pub fn link_alias_file_name(&self) -> String {
        format!("lib{}.dylib", self.link_alias())
    }

    /// Library entry naming the `.so` file directly (`-l:<file>` syntax).
    #[must_use]
    pub fn path_library_entry(&self) -> String {
        format!(":{}.so", self.0)
    }

    /// Scratch file name for one architecture of a universal build.
    #[must_use]
    pub fn architecture_file_name(&self, architecture_token: &str) -> String {
        format!("{}.{architecture_token}.dylib", self.0)
    }
}

impl Default for NativeLibraryName {
    fn default() -> Self {
        Self::new(DEFAULT_LIBRARY_NAME)
    }
}

impl AsRef<str> for NativeLibraryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NativeLibraryName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for NativeLibraryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
