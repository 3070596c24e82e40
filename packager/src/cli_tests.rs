//! Tests for CLI parsing and default behaviours.

use super::*;
use rstest::rstest;

fn parse(args: &[&str]) -> Cli {
    temp_env::with_vars_unset(["SOMR_BUILD_DIR", "SOMR_DIST_DIR"], || {
        Cli::parse_from(std::iter::once("somr-build").chain(args.iter().copied()))
    })
}

#[test]
fn cli_parses_defaults() {
    let cli = parse(&[]);
    assert!(cli.command.is_none());
    assert!(cli.build.profile.is_none());
    assert!(cli.build.arch.is_none());
    assert!(cli.build.rid.is_none());
    assert!(cli.build.build_dir.is_none());
    assert!(cli.build.dist_dir.is_none());
    assert!(!cli.build.dry_run);
    assert_eq!(cli.build.verbosity, 0);
    assert!(!cli.build.quiet);
}

#[rstest]
#[case::implicit(&[], true, true)]
#[case::build(&["build"], true, true)]
#[case::native(&["native"], true, false)]
#[case::compile(&["compile"], false, true)]
fn subcommands_select_phases(
    #[case] args: &[&str],
    #[case] native: bool,
    #[case] compile: bool,
) {
    let cli = parse(args);
    let (_, phases) = cli.build_args().expect("build command");
    assert_eq!(phases, Phases { native, compile });
}

#[test]
fn flags_command_has_no_build_args() {
    let cli = parse(&["flags", "--toolchain", "msvc", "--json"]);
    assert!(cli.build_args().is_none());
    match cli.command {
        Some(Command::Flags(args)) => {
            assert_eq!(args.toolchain.as_deref(), Some("msvc"));
            assert!(args.json);
            assert_eq!(args.profile, None);
        }
        other => panic!("expected flags command, got {other:?}"),
    }
}

#[test]
fn subcommand_arguments_are_parsed() {
    let cli = parse(&["native", "--arch", "arm64", "--profile", "debug", "-vv"]);
    let (args, _) = cli.build_args().expect("build command");
    assert_eq!(args.arch.as_deref(), Some("arm64"));
    assert_eq!(args.profile, Some(Profile::Debug));
    assert_eq!(args.verbosity, 2);
}

#[test]
fn staging_dirs_fall_back_to_environment() {
    let cli = temp_env::with_vars(
        [
            ("SOMR_BUILD_DIR", Some("build/lib.linux-x86_64")),
            ("SOMR_DIST_DIR", Some("build/bdist")),
        ],
        || Cli::parse_from(["somr-build"]),
    );
    assert_eq!(
        cli.build.build_dir,
        Some(Utf8PathBuf::from("build/lib.linux-x86_64"))
    );
    assert_eq!(cli.build.dist_dir, Some(Utf8PathBuf::from("build/bdist")));
}

#[test]
fn command_line_overrides_environment() {
    let cli = temp_env::with_var("SOMR_DIST_DIR", Some("from-env"), || {
        Cli::parse_from(["somr-build", "--dist-dir", "from-cli"])
    });
    assert_eq!(cli.build.dist_dir, Some(Utf8PathBuf::from("from-cli")));
}

#[rstest]
#[case::arch_and_rid(&["--arch", "x64", "--rid", "win-x64"])]
#[case::quiet_and_verbose(&["--quiet", "-v"])]
#[case::unknown_profile(&["--profile", "fast"])]
fn conflicting_or_invalid_arguments_are_rejected(#[case] args: &[&str]) {
    let result = temp_env::with_vars_unset(["SOMR_BUILD_DIR", "SOMR_DIST_DIR"], || {
        Cli::try_parse_from(std::iter::once("somr-build").chain(args.iter().copied()))
    });
    assert!(result.is_err());
}

#[test]
fn cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
