//! Compiler and linker flag tables per toolchain.
//!
//! The table is built by a pure function of the build profile, the host OS
//! and the native library name. Host-specific differences are expressed as
//! [`PlatformOverrides`] records applied to the base table during
//! construction, never by mutating a shared table afterwards.

use crate::naming::NativeLibraryName;
use crate::platform::OperatingSystem;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Toolchain identifier for generic unix C compilers (`cc`, `clang`).
pub const UNIX: &str = "unix";
/// Toolchain identifier for GCC.
pub const GCC: &str = "gcc";
/// Toolchain identifier for Microsoft Visual C++.
pub const MSVC: &str = "msvc";
/// Toolchain identifier for MinGW GCC on Windows.
pub const MINGW32: &str = "mingw32";

const RPATH_ORIGIN: &str = "-Wl,-rpath,$ORIGIN";
const RPATH_LOADER_PATH: &str = "-Wl,-rpath,@loader_path";

/// Build profile selecting optimisation and symbol settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// No optimisation, debug symbols retained.
    Debug,
    /// Size-optimised, stripped output.
    #[default]
    Release,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "debug",
            Self::Release => "release",
        })
    }
}

/// Flags and libraries applied to one toolchain's compile and link steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolchainFlagSet {
    /// Extra compiler arguments, in order.
    pub compile_flags: Vec<String>,
    /// Extra linker arguments, in order.
    pub link_flags: Vec<String>,
    /// Libraries to link against, in the toolchain's `-l` syntax.
    pub required_libraries: Vec<String>,
    /// Library search directories.
    pub library_dirs: Vec<String>,
}

impl ToolchainFlagSet {
    fn new(compile: &[&str], link: &[&str], libraries: Vec<String>) -> Self {
        let library_dirs = if libraries.is_empty() {
            Vec::new()
        } else {
            vec![".".to_owned()]
        };
        Self {
            compile_flags: owned(compile),
            link_flags: owned(link),
            required_libraries: libraries,
            library_dirs,
        }
    }

    /// Whether the set adds nothing to a compile.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compile_flags.is_empty()
            && self.link_flags.is_empty()
            && self.required_libraries.is_empty()
            && self.library_dirs.is_empty()
    }
}

fn owned(flags: &[&str]) -> Vec<String> {
    flags.iter().map(|&flag| flag.to_owned()).collect()
}

/// Flag sets keyed by toolchain identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FlagTable(BTreeMap<String, ToolchainFlagSet>);

impl FlagTable {
    /// Build the table for `profile` on `host_os`.
    ///
    /// # Examples
    ///
    /// ```
    /// use somr_build::flags::{FlagTable, Profile};
    /// use somr_build::naming::NativeLibraryName;
    /// use somr_build::platform::OperatingSystem;
    ///
    /// let table = FlagTable::build(
    ///     Profile::Release,
    ///     OperatingSystem::MacOs,
    ///     &NativeLibraryName::default(),
    /// );
    /// let unix = table.get("unix").expect("unix flags");
    /// assert!(unix.link_flags.contains(&"-Wl,-rpath,@loader_path".to_owned()));
    /// assert_eq!(unix.required_libraries, vec!["SoMRandomizer-api".to_owned()]);
    /// ```
    #[must_use]
    pub fn build(profile: Profile, host_os: OperatingSystem, library: &NativeLibraryName) -> Self {
        PlatformOverrides::for_os(host_os, library).apply_table(&Self::base(profile, library))
    }

    /// The table before any host-specific overrides.
    #[must_use]
    pub fn base(profile: Profile, library: &NativeLibraryName) -> Self {
        let unix_libraries = || vec![library.path_library_entry()];
        let msvc_libraries = vec![library.as_str().to_owned()];

        let entries = match profile {
            Profile::Release => [
                (
                    UNIX,
                    ToolchainFlagSet::new(
                        &["-Os", "-s", "-ffunction-sections"],
                        &["-s", "-Wl,--gc-sections", RPATH_ORIGIN],
                        unix_libraries(),
                    ),
                ),
                (
                    GCC,
                    ToolchainFlagSet::new(
                        &["-Os", "-s", "-ffunction-sections"],
                        &["-s", "-Wl,--gc-sections", RPATH_ORIGIN],
                        unix_libraries(),
                    ),
                ),
                (MSVC, ToolchainFlagSet::new(&["/Os"], &[], msvc_libraries)),
                (MINGW32, ToolchainFlagSet::new(&["-Os", "-s"], &[], Vec::new())),
            ],
            Profile::Debug => [
                (UNIX, ToolchainFlagSet::new(&["-O0", "-g"], &[], unix_libraries())),
                (GCC, ToolchainFlagSet::new(&["-O0", "-g"], &[], unix_libraries())),
                (MSVC, ToolchainFlagSet::new(&["/Od", "/Zi"], &[], msvc_libraries)),
                (MINGW32, ToolchainFlagSet::new(&["-O0", "-g"], &[], Vec::new())),
            ],
        };

        Self(
            entries
                .into_iter()
                .map(|(id, set)| (id.to_owned(), set))
                .collect(),
        )
    }

    /// Look up the flag set for a toolchain identifier.
    #[must_use]
    pub fn get(&self, toolchain: &str) -> Option<&ToolchainFlagSet> {
        self.0.get(toolchain)
    }

    /// Iterate over `(toolchain, flags)` pairs in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ToolchainFlagSet)> {
        self.0.iter().map(|(id, set)| (id.as_str(), set))
    }

    /// Known toolchain identifiers.
    pub fn toolchains(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// A rewrite applied to a compile or link flag list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagRule {
    /// Drop every occurrence of the flag.
    Remove(String),
    /// Replace every occurrence of `from` with `to`, in place.
    Replace {
        /// Flag to replace.
        from: String,
        /// Replacement flag.
        to: String,
    },
}

impl FlagRule {
    fn remove(flag: &str) -> Self {
        Self::Remove(flag.to_owned())
    }

    fn replace(from: &str, to: &str) -> Self {
        Self::Replace {
            from: from.to_owned(),
            to: to.to_owned(),
        }
    }
}

/// A rewrite applied to required library entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryRule {
    /// Replace an exact entry.
    Rename {
        /// Entry to replace.
        from: String,
        /// Replacement entry.
        to: String,
    },
    /// Swap a file extension on entries not matched by any `Rename`.
    Extension {
        /// Extension to match, including the dot.
        from: String,
        /// Replacement extension, including the dot.
        to: String,
    },
}

/// Declarative per-platform overrides for a [`FlagTable`].
///
/// Each rule's output never matches any rule's input, so applying the
/// overrides is idempotent, and `Rename` rules always take precedence over
/// `Extension` rules regardless of their order in the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformOverrides {
    /// Rules for compile flags.
    pub compile: Vec<FlagRule>,
    /// Rules for link flags.
    pub link: Vec<FlagRule>,
    /// Rules for required libraries.
    pub libraries: Vec<LibraryRule>,
}

impl PlatformOverrides {
    /// Overrides for `os`; empty for everything but macOS.
    #[must_use]
    pub fn for_os(os: OperatingSystem, library: &NativeLibraryName) -> Self {
        if os.is_macos() {
            Self::macos(library)
        } else {
            Self::default()
        }
    }

    /// Apple's toolchain: `-s` and `--gc-sections` are not accepted, the
    /// rpath token is `@loader_path`, and the native library is linked via
    /// its link alias.
    #[must_use]
    pub fn macos(library: &NativeLibraryName) -> Self {
        Self {
            compile: vec![FlagRule::remove("-s")],
            link: vec![
                FlagRule::remove("-Wl,--gc-sections"),
                FlagRule::remove("-s"),
                FlagRule::replace(RPATH_ORIGIN, RPATH_LOADER_PATH),
            ],
            libraries: vec![
                LibraryRule::Rename {
                    from: library.path_library_entry(),
                    to: library.link_alias(),
                },
                LibraryRule::Extension {
                    from: ".so".to_owned(),
                    to: ".dylib".to_owned(),
                },
            ],
        }
    }

    /// Apply the overrides to one flag set.
    #[must_use]
    pub fn apply(&self, set: &ToolchainFlagSet) -> ToolchainFlagSet {
        ToolchainFlagSet {
            compile_flags: apply_flag_rules(&self.compile, &set.compile_flags),
            link_flags: apply_flag_rules(&self.link, &set.link_flags),
            required_libraries: set
                .required_libraries
                .iter()
                .map(|entry| self.rewrite_library(entry))
                .collect(),
            library_dirs: set.library_dirs.clone(),
        }
    }

    /// Apply the overrides to every entry of a table.
    #[must_use]
    pub fn apply_table(&self, table: &FlagTable) -> FlagTable {
        FlagTable(
            table
                .0
                .iter()
                .map(|(id, set)| (id.clone(), self.apply(set)))
                .collect(),
        )
    }

    fn rewrite_library(&self, entry: &str) -> String {
        let renamed = self.libraries.iter().find_map(|rule| match rule {
            LibraryRule::Rename { from, to } if from == entry => Some(to.clone()),
            _ => None,
        });
        renamed
            .or_else(|| {
                self.libraries.iter().find_map(|rule| match rule {
                    LibraryRule::Extension { from, to } => entry
                        .strip_suffix(from.as_str())
                        .map(|stem| format!("{stem}{to}")),
                    LibraryRule::Rename { .. } => None,
                })
            })
            .unwrap_or_else(|| entry.to_owned())
    }
}

fn apply_flag_rules(rules: &[FlagRule], flags: &[String]) -> Vec<String> {
    flags
        .iter()
        .filter_map(|flag| {
            rules.iter().try_fold(flag.clone(), |current, rule| match rule {
                FlagRule::Remove(target) if *target == current => None,
                FlagRule::Replace { from, to } if *from == current => Some(to.clone()),
                _ => Some(current),
            })
        })
        .collect()
}
