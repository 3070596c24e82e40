//! Behaviour-driven tests for copying the native library into staging
//! directories.

mod support;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use somr_build::error::PackagerError;
use somr_build::platform::OperatingSystem;
use somr_build::publisher::{ArtifactKind, NativeArtifact};
use somr_build::stager::{StagedFiles, StagingTargets, stage};
use support::{TempProject, operating_system};

struct StagingWorld {
    project: TempProject,
    os: OperatingSystem,
    artifact: Option<NativeArtifact>,
    result: Option<Result<StagedFiles, PackagerError>>,
}

impl StagingWorld {
    fn stage(&mut self) {
        let artifact = self.artifact.as_ref().expect("library not published");
        self.result = Some(stage(artifact, &self.project.targets, self.os));
    }

    fn staged_dirs_exist(&self) -> bool {
        let build = self.project.root.join("build");
        [build.join("lib"), build.join("bdist")]
            .iter()
            .any(|dir| dir.exists())
    }
}

#[fixture]
fn world() -> StagingWorld {
    StagingWorld {
        project: TempProject::new(),
        os: OperatingSystem::Linux,
        artifact: None,
        result: None,
    }
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given("a \"{os}\" library published with contents \"{contents}\"")]
fn given_published(world: &mut StagingWorld, os: String, contents: String) {
    world.os = operating_system(&os);
    world.project.seed_publish_output(world.os, &contents);
    let source_path = world.project.publish_output(world.os);
    if world.os.is_windows() {
        std::fs::write(source_path.with_extension("lib"), "import")
            .expect("failed to write import library");
    }
    world.artifact = Some(NativeArtifact {
        source_path,
        logical_name: world.project.config.native.library(),
        kind: ArtifactKind::for_os(world.os),
    });
}

#[given("the library has been staged")]
fn given_staged(world: &mut StagingWorld) {
    world.stage();
    assert!(
        matches!(world.result, Some(Ok(_))),
        "initial staging should succeed"
    );
}

#[given("the import library is missing")]
fn given_import_missing(world: &mut StagingWorld) {
    let artifact = world.artifact.as_ref().expect("library not published");
    let import = artifact
        .import_library_path()
        .expect("artifact should carry an import library");
    std::fs::remove_file(import).expect("failed to remove import library");
}

#[given("only the current directory is a staging target")]
fn given_current_only(world: &mut StagingWorld) {
    world.project.targets = StagingTargets::current_only(world.project.root.clone());
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when("the library is staged")]
fn when_staged(world: &mut StagingWorld) {
    world.stage();
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then("staging succeeds with {count} copies")]
fn then_staging_succeeds(world: &mut StagingWorld, count: usize) {
    match world.result.as_ref().expect("staging has not run") {
        Ok(staged) => assert_eq!(staged.len(), count),
        Err(err) => panic!("staging failed: {err}"),
    }
}

#[then("\"{relative}\" contains \"{contents}\"")]
fn then_contains(world: &mut StagingWorld, relative: String, contents: String) {
    assert_eq!(world.project.read(&relative), contents);
}

#[then("staging fails because \"{file}\" is missing")]
fn then_staging_fails(world: &mut StagingWorld, file: String) {
    match world.result.as_ref().expect("staging has not run") {
        Err(PackagerError::ArtifactMissing { path }) => {
            assert_eq!(path.file_name(), Some(file.as_str()));
        }
        other => panic!("expected a missing artifact, got {other:?}"),
    }
}

#[then("no staging directory was created")]
fn then_no_dirs(world: &mut StagingWorld) {
    assert!(!world.staged_dirs_exist());
}

#[then("\"{file}\" was not copied into the project root")]
fn then_not_copied(world: &mut StagingWorld, file: String) {
    assert!(!world.project.root.join(&file).exists());
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/staging.feature",
    name = "Staging creates missing directories"
)]
fn scenario_creates_dirs(world: StagingWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/staging.feature",
    name = "Restaging overwrites earlier copies"
)]
fn scenario_restage(world: StagingWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/staging.feature",
    name = "A missing import library stages nothing"
)]
fn scenario_missing_import(world: StagingWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/staging.feature",
    name = "Only configured directories receive copies"
)]
fn scenario_current_only(world: StagingWorld) {
    let _ = world;
}
