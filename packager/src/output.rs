//! Output formatting for the `somr-build` CLI.
//!
//! Progress goes to stderr; the `flags` subcommand writes its table to
//! stdout, either as aligned text or as JSON.

use crate::flags::{FlagTable, Profile, ToolchainFlagSet};
use crate::stager::{PlannedCopy, StagedCopy};
use camino::Utf8Path;
use serde::Serialize;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Progress line for a completed copy.
///
/// # Example
///
/// ```
/// use camino::Utf8PathBuf;
/// use somr_build::output::copy_line;
/// use somr_build::stager::StagedCopy;
///
/// let copy = StagedCopy {
///     source: Utf8PathBuf::from("bin/SoMRandomizer.api.so"),
///     destination: Utf8PathBuf::from("SoMRandomizer.api.so"),
///     bytes: 2048,
/// };
/// assert_eq!(
///     copy_line(&copy),
///     "copying bin/SoMRandomizer.api.so -> SoMRandomizer.api.so (2048 bytes)"
/// );
/// ```
#[must_use]
pub fn copy_line(copy: &StagedCopy) -> String {
    format!(
        "copying {} -> {} ({} bytes)",
        copy.source, copy.destination, copy.bytes
    )
}

/// Format a success message after a build.
#[must_use]
pub fn success_message(library: &str, copies: usize, extensions: usize) -> String {
    let files = if copies == 1 { "file" } else { "files" };
    let mut message = format!("Staged {library} ({copies} {files})");
    if extensions > 0 {
        let modules = if extensions == 1 { "module" } else { "modules" };
        message.push_str(&format!(" and built {extensions} extension {modules}"));
    }
    message
}

/// Configuration information for dry-run output.
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// Project root directory.
    pub project_root: &'a Utf8Path,
    /// Build profile.
    pub profile: Profile,
    /// How the native library would be produced.
    pub native_plan: String,
    /// Path the native library would be taken from.
    pub artifact_path: &'a Utf8Path,
    /// Copies the stager would make.
    pub copies: &'a [PlannedCopy],
    /// Toolchain identifier for the extension compile.
    pub toolchain: &'a str,
    /// Flags that toolchain would receive, if it is known.
    pub flags: Option<&'a ToolchainFlagSet>,
    /// Extension modules that would be built.
    pub extensions: &'a [String],
}

impl DryRunInfo<'_> {
    /// Format the dry-run information for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let mut lines = vec![
            "Dry run - no files will be modified".to_owned(),
            String::new(),
            format!("Project root: {}", self.project_root),
            format!("Profile: {}", self.profile),
            format!("Native library: {}", self.native_plan),
            format!("Artifact: {}", self.artifact_path),
            String::new(),
            "Copies:".to_owned(),
        ];
        for copy in self.copies {
            lines.push(format!("  {} -> {}", copy.source, copy.destination));
        }

        lines.push(String::new());
        match self.flags {
            Some(set) => {
                lines.push(format!("Compiler flags ({}):", self.toolchain));
                lines.extend(flag_set_lines(set));
            }
            None => lines.push(format!("Compiler flags: unknown compiler {}", self.toolchain)),
        }

        if !self.extensions.is_empty() {
            lines.push(String::new());
            lines.push("Extensions to build:".to_owned());
            for name in self.extensions {
                lines.push(format!("  - {name}"));
            }
        }

        lines.join("\n")
    }
}

fn flag_set_lines(set: &ToolchainFlagSet) -> Vec<String> {
    [
        ("compile", &set.compile_flags),
        ("link", &set.link_flags),
        ("libraries", &set.required_libraries),
        ("library dirs", &set.library_dirs),
    ]
    .into_iter()
    .map(|(label, values)| format!("  {label:<13}{}", values.join(" ")))
    .collect()
}

/// Render the flag table as text, optionally limited to one toolchain.
#[must_use]
pub fn flags_text(table: &FlagTable, toolchain: Option<&str>) -> String {
    table
        .iter()
        .filter(|(id, _)| toolchain.is_none_or(|wanted| wanted == *id))
        .map(|(id, set)| {
            let mut lines = vec![format!("{id}:")];
            lines.extend(flag_set_lines(set));
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Serialize)]
struct FlagsReport<'a> {
    profile: Profile,
    toolchains: Vec<ToolchainEntry<'a>>,
}

#[derive(Serialize)]
struct ToolchainEntry<'a> {
    id: &'a str,
    #[serde(flatten)]
    flags: &'a ToolchainFlagSet,
}

/// Render the flag table as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn flags_json(
    table: &FlagTable,
    profile: Profile,
    toolchain: Option<&str>,
) -> serde_json::Result<String> {
    let report = FlagsReport {
        profile,
        toolchains: table
            .iter()
            .filter(|(id, _)| toolchain.is_none_or(|wanted| wanted == *id))
            .map(|(id, flags)| ToolchainEntry { id, flags })
            .collect(),
    };
    serde_json::to_string_pretty(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NativeLibraryName;
    use crate::platform::OperatingSystem;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};

    #[fixture]
    fn table() -> FlagTable {
        FlagTable::build(
            Profile::Release,
            OperatingSystem::Linux,
            &NativeLibraryName::default(),
        )
    }

    #[rstest]
    #[case::single(1, 0, "(1 file)")]
    #[case::several(3, 0, "(3 files)")]
    #[case::with_extension(3, 1, "built 1 extension module")]
    fn success_message_pluralises_correctly(
        #[case] copies: usize,
        #[case] extensions: usize,
        #[case] expected: &str,
    ) {
        let message = success_message("SoMRandomizer.api.so", copies, extensions);
        assert!(message.contains(expected), "{message}");
    }

    #[test]
    fn write_stderr_line_ignores_write_failures() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        write_stderr_line(&mut Broken, "ignored");
    }

    #[rstest]
    fn flags_text_can_be_limited_to_one_toolchain(table: FlagTable) {
        let text = flags_text(&table, Some("msvc"));
        assert!(text.starts_with("msvc:"));
        assert!(text.contains("/Os"));
        assert!(!text.contains("unix:"));
    }

    #[rstest]
    fn flags_text_lists_every_toolchain(table: FlagTable) {
        let text = flags_text(&table, None);
        for id in ["gcc:", "mingw32:", "msvc:", "unix:"] {
            assert!(text.contains(id), "missing {id}");
        }
    }

    #[rstest]
    fn flags_json_is_structured(table: FlagTable) {
        let json = flags_json(&table, Profile::Release, Some("unix")).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");

        assert_eq!(value["profile"], "release");
        let unix = &value["toolchains"][0];
        assert_eq!(unix["id"], "unix");
        assert_eq!(unix["required_libraries"][0], ":SoMRandomizer.api.so");
        assert_eq!(unix["library_dirs"][0], ".");
    }

    #[rstest]
    fn dry_run_lists_copies_and_flags(table: FlagTable) {
        let root = Utf8PathBuf::from("/src/pysomr");
        let artifact = root.join("SoMRandomizer.api.so");
        let copies = vec![PlannedCopy {
            source: artifact.clone(),
            destination: root.join("dist").join("SoMRandomizer.api.so"),
        }];
        let extensions = vec!["_somr".to_owned()];
        let info = DryRunInfo {
            project_root: &root,
            profile: Profile::Release,
            native_plan: "publish linux-x64".to_owned(),
            artifact_path: &artifact,
            copies: &copies,
            toolchain: "unix",
            flags: table.get("unix"),
            extensions: &extensions,
        };

        let text = info.display_text();

        assert!(text.starts_with("Dry run"));
        assert!(text.contains("publish linux-x64"));
        assert!(text.contains("/src/pysomr/dist/SoMRandomizer.api.so"));
        assert!(text.contains("-ffunction-sections"));
        assert!(text.contains("  - _somr"));
    }

    #[test]
    fn dry_run_reports_unknown_compiler() {
        let root = Utf8PathBuf::from("/src");
        let info = DryRunInfo {
            project_root: &root,
            profile: Profile::Debug,
            native_plan: "universal (osx-arm64 + osx-x64)".to_owned(),
            artifact_path: &root,
            copies: &[],
            toolchain: "bcpp",
            flags: None,
            extensions: &[],
        };

        assert!(info.display_text().contains("unknown compiler bcpp"));
    }
}
