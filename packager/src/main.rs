//! `somr-build` CLI entrypoint.
//!
//! This binary publishes the SoMRandomizer native library, stages it for
//! packaging and compiles the extension module against it.

use camino::Utf8PathBuf;
use clap::Parser;
use somr_build::cli::{BuildArgs, Cli, Command, FlagsArgs};
use somr_build::compile::{default_compiler, default_toolchain};
use somr_build::config::{CONFIG_FILE_NAME, PackagerConfig};
use somr_build::error::{PackagerError, Result};
use somr_build::exec::{SystemCommandExecutor, SystemToolLocator};
use somr_build::flags::FlagTable;
use somr_build::output::{
    DryRunInfo, flags_json, flags_text, success_message, write_stderr_line,
};
use somr_build::pipeline::{
    CompileSettings, NativePlan, Phases, PipelineContext, plan_native, run_build,
};
use somr_build::platform::{OperatingSystem, identify};
use somr_build::stager::{StagingTargets, plan};
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    if let Some(Command::Flags(args)) = &cli.command {
        return print_flags(args, stdout, stderr);
    }
    match cli.build_args() {
        Some((args, phases)) => run_build_command(args, phases, stderr),
        None => Ok(()),
    }
}

/// Everything a build command needs, resolved from CLI, config and host.
struct Resolved {
    project_root: Utf8PathBuf,
    config: PackagerConfig,
    targets: StagingTargets,
    settings: CompileSettings,
}

/// Resolve the project root and load its configuration.
///
/// The configuration file defaults to `somr-build.toml` in the project root,
/// which defaults to the current directory.
fn load_project(
    project_root: Option<&Utf8PathBuf>,
    config: Option<&Utf8PathBuf>,
) -> Result<(Utf8PathBuf, PackagerConfig)> {
    let project_root = match project_root {
        Some(root) => root.clone(),
        None => current_dir()?,
    };
    let config_path = config.map_or_else(|| project_root.join(CONFIG_FILE_NAME), Clone::clone);
    let config = PackagerConfig::load(&config_path)?;
    Ok((project_root, config))
}

fn resolve(args: &BuildArgs, os: OperatingSystem) -> Result<Resolved> {
    let (project_root, config) =
        load_project(args.project_root.as_ref(), args.config.as_ref())?;

    let targets = StagingTargets {
        current_dir: project_root.clone(),
        build_output_dir: args.build_dir.as_ref().map(|dir| project_root.join(dir)),
        dist_dir: args.dist_dir.as_ref().map(|dir| project_root.join(dir)),
    };
    let toolchain = args
        .compiler
        .clone()
        .unwrap_or_else(|| default_toolchain(os).to_owned());
    let settings = CompileSettings {
        compiler: default_compiler(&toolchain),
        toolchain,
    };

    Ok(Resolved {
        project_root,
        config,
        targets,
        settings,
    })
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd).map_err(|e| PackagerError::Io(e.into_io_error()))
}

fn run_build_command(args: &BuildArgs, phases: Phases, stderr: &mut dyn Write) -> Result<()> {
    let identity = identify();
    let resolved = resolve(args, identity.operating_system)?;
    let plan = plan_native(&identity, args.arch.as_deref(), args.rid.as_deref())?;

    let executor = SystemCommandExecutor;
    let locator = SystemToolLocator;
    let context = PipelineContext {
        project_root: &resolved.project_root,
        config: &resolved.config,
        identity: &identity,
        profile: args.profile.unwrap_or(resolved.config.profile),
        targets: &resolved.targets,
        executor: &executor,
        locator: &locator,
        verbosity: args.verbosity,
        quiet: args.quiet,
    };

    if args.dry_run {
        print_dry_run_info(&context, &plan, phases, &resolved.settings, stderr);
        return Ok(());
    }

    let summary = run_build(&context, &plan, phases, &resolved.settings, stderr)?;

    if !args.quiet {
        let library = summary.artifact.as_ref().map_or_else(
            || context.config.native.library_name.clone(),
            |artifact| artifact.file_name().to_owned(),
        );
        write_stderr_line(stderr, "");
        write_stderr_line(
            stderr,
            success_message(&library, summary.staged.len(), summary.extensions.len()),
        );
    }
    Ok(())
}

/// Prints dry run configuration information.
fn print_dry_run_info(
    context: &PipelineContext<'_>,
    native_plan: &NativePlan,
    phases: Phases,
    settings: &CompileSettings,
    stderr: &mut dyn Write,
) {
    let artifact = context.expected_artifact(native_plan);
    let copies = if phases.native {
        plan(&artifact, context.targets, context.identity.operating_system)
    } else {
        Vec::new()
    };
    let table = context.flag_table();
    let extensions: Vec<String> = if phases.compile {
        context
            .config
            .extensions_or_default()
            .into_iter()
            .map(|extension| extension.name)
            .collect()
    } else {
        Vec::new()
    };

    let info = DryRunInfo {
        project_root: context.project_root,
        profile: context.profile,
        native_plan: native_plan.to_string(),
        artifact_path: &artifact.source_path,
        copies: &copies,
        toolchain: &settings.toolchain,
        flags: table.get(&settings.toolchain),
        extensions: &extensions,
    };
    write_stderr_line(stderr, info.display_text());
}

fn print_flags(args: &FlagsArgs, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    let os = args
        .os
        .as_deref()
        .map_or_else(OperatingSystem::host, OperatingSystem::from_os_name);
    let (_, config) = load_project(args.project_root.as_ref(), args.config.as_ref())?;
    let profile = args.profile.unwrap_or(config.profile);
    let table = FlagTable::build(profile, os, &config.native.library());

    let unknown = args
        .toolchain
        .as_deref()
        .filter(|toolchain| table.get(toolchain).is_none());
    if let Some(toolchain) = unknown {
        write_stderr_line(stderr, format!("using unknown compiler: {toolchain}"));
    }

    let rendered = if args.json {
        flags_json(&table, profile, args.toolchain.as_deref())
            .map_err(|e| PackagerError::Io(std::io::Error::other(e)))?
    } else {
        flags_text(&table, args.toolchain.as_deref())
    };
    writeln!(stdout, "{rendered}")?;
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            err.exit_code()
        }
    }
}
