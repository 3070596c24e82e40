//! CLI argument definitions for `somr-build`.
//!
//! Kept apart from the entrypoint so tests can parse arguments without
//! running a build.

use crate::flags::Profile;
use crate::pipeline::Phases;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Build and stage the SoMRandomizer native library and extension module.
#[derive(Parser, Debug, Default)]
#[command(name = "somr-build")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build and stage the SoMRandomizer native library and extension module.\n\n",
    "The native library is published with the .NET SDK for the host's runtime ",
    "identifier (on macOS, for arm64 and x64, merged with lipo). It is then ",
    "copied into the current directory, the build output directory and the ",
    "distribution directory, and the C extension module is compiled against it.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Publish, stage and compile:\n",
    "    $ somr-build\n\n",
    "  Publish for one architecture only, even on macOS:\n",
    "    $ somr-build native --arch arm64\n\n",
    "  Show the flags MinGW would receive:\n",
    "    $ somr-build flags --toolchain mingw32\n\n",
    "  Preview without building:\n",
    "    $ somr-build --dry-run",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Build arguments (used when no subcommand is given).
    #[command(flatten)]
    pub build: BuildArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Publish, stage and compile (default when no subcommand given).
    Build(BuildArgs),

    /// Publish and stage the native library only.
    Native(BuildArgs),

    /// Compile the extension modules against an already staged library.
    Compile(BuildArgs),

    /// Print the resolved compiler flag table.
    Flags(FlagsArgs),
}

/// Arguments shared by the build commands.
#[derive(Parser, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Build profile [default: from somr-build.toml, else release].
    #[arg(long, value_enum)]
    pub profile: Option<Profile>,

    /// Build for one architecture instead of the host's (disables the
    /// universal macOS build).
    #[arg(long, value_name = "ARCH", conflicts_with = "rid")]
    pub arch: Option<String>,

    /// Explicit .NET runtime identifier, e.g. linux-musl-arm64.
    #[arg(long, value_name = "RID")]
    pub rid: Option<String>,

    /// Build output directory receiving a copy of the native library.
    #[arg(long, value_name = "DIR", env = "SOMR_BUILD_DIR")]
    pub build_dir: Option<Utf8PathBuf>,

    /// Distribution staging directory receiving a copy of the native library.
    #[arg(long, value_name = "DIR", env = "SOMR_DIST_DIR")]
    pub dist_dir: Option<Utf8PathBuf>,

    /// Project root [default: current directory].
    #[arg(long, value_name = "DIR")]
    pub project_root: Option<Utf8PathBuf>,

    /// Configuration file [default: <project root>/somr-build.toml].
    #[arg(long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Compiler type (unix, gcc, msvc, mingw32) [default: per host].
    #[arg(long, value_name = "ID")]
    pub compiler: Option<String>,

    /// Show the resolved plan and exit without building.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase build tool verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Arguments for the flags command.
#[derive(Parser, Debug, Clone, Default)]
pub struct FlagsArgs {
    /// Limit output to one toolchain identifier.
    #[arg(long, value_name = "ID")]
    pub toolchain: Option<String>,

    /// Build profile [default: from somr-build.toml, else release].
    #[arg(long, value_enum)]
    pub profile: Option<Profile>,

    /// Show the table for another host OS (windows, macos, linux).
    #[arg(long, value_name = "OS")]
    pub os: Option<String>,

    /// Project root [default: current directory].
    #[arg(long, value_name = "DIR")]
    pub project_root: Option<Utf8PathBuf>,

    /// Configuration file [default: <project root>/somr-build.toml].
    #[arg(long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// The build arguments and phases selected on the command line.
    ///
    /// Returns `None` for the `flags` subcommand.
    #[must_use]
    pub fn build_args(&self) -> Option<(&BuildArgs, Phases)> {
        match &self.command {
            None => Some((&self.build, Phases::ALL)),
            Some(Command::Build(args)) => Some((args, Phases::ALL)),
            Some(Command::Native(args)) => Some((args, Phases::NATIVE_ONLY)),
            Some(Command::Compile(args)) => Some((args, Phases::COMPILE_ONLY)),
            Some(Command::Flags(_)) => None,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
