//! Behaviour-driven tests for platform identification and flag tables.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use somr_build::error::PackagerError;
use somr_build::flags::{FlagTable, Profile, ToolchainFlagSet};
use somr_build::naming::NativeLibraryName;
use somr_build::platform::{Architecture, LibcFlavor, OperatingSystem, PlatformIdentity};
use somr_build::runtime_id::{RuntimeIdentifier, to_runtime_identifier};

#[derive(Default)]
struct PlatformWorld {
    identity: Option<PlatformIdentity>,
    resolved: Option<Result<RuntimeIdentifier, PackagerError>>,
    table: Option<FlagTable>,
}

impl PlatformWorld {
    fn flag_set(&self, toolchain: &str) -> &ToolchainFlagSet {
        self.table
            .as_ref()
            .expect("flag table not built")
            .get(toolchain)
            .expect("toolchain missing from table")
    }
}

#[fixture]
fn world() -> PlatformWorld {
    PlatformWorld::default()
}

fn joined(values: &[String]) -> String {
    values.join(" ")
}

#[given("a \"{os}\" host reporting machine \"{machine}\" with {bits}-bit pointers")]
fn given_host(world: &mut PlatformWorld, os: String, machine: String, bits: u32) {
    let operating_system = OperatingSystem::from_os_name(&os);
    let libc = (operating_system == OperatingSystem::Linux).then_some(LibcFlavor::Glibc);
    world.identity = Some(PlatformIdentity {
        operating_system,
        libc,
        architecture: Architecture::from_machine(&machine, bits),
    });
}

#[when("the runtime identifier is resolved")]
fn when_resolved(world: &mut PlatformWorld) {
    let identity = world.identity.as_ref().expect("host not set");
    world.resolved = Some(to_runtime_identifier(identity, None));
}

#[then("the runtime identifier is \"{expected}\"")]
fn then_rid_is(world: &mut PlatformWorld, expected: String) {
    let resolved = world.resolved.as_ref().expect("not resolved");
    let rid = resolved.as_ref().expect("resolution failed");
    assert_eq!(rid.as_str(), expected);
}

#[then("resolution fails with an unsupported architecture error")]
fn then_unsupported(world: &mut PlatformWorld) {
    let resolved = world.resolved.as_ref().expect("not resolved");
    assert!(matches!(
        resolved,
        Err(PackagerError::UnsupportedArchitecture { .. })
    ));
}

#[given("the \"{profile}\" flag table for \"{os}\"")]
fn given_flag_table(world: &mut PlatformWorld, profile: String, os: String) {
    let profile = match profile.as_str() {
        "debug" => Profile::Debug,
        _ => Profile::Release,
    };
    world.table = Some(FlagTable::build(
        profile,
        OperatingSystem::from_os_name(&os),
        &NativeLibraryName::default(),
    ));
}

#[then("the \"{toolchain}\" compile flags are \"{expected}\"")]
fn then_compile_flags(world: &mut PlatformWorld, toolchain: String, expected: String) {
    assert_eq!(joined(&world.flag_set(&toolchain).compile_flags), expected);
}

#[then("the \"{toolchain}\" link flags are \"{expected}\"")]
fn then_link_flags(world: &mut PlatformWorld, toolchain: String, expected: String) {
    assert_eq!(joined(&world.flag_set(&toolchain).link_flags), expected);
}

#[then("the \"{toolchain}\" libraries are \"{expected}\"")]
fn then_libraries(world: &mut PlatformWorld, toolchain: String, expected: String) {
    assert_eq!(
        joined(&world.flag_set(&toolchain).required_libraries),
        expected
    );
}

#[then("the \"{toolchain}\" toolchain links no libraries")]
fn then_no_libraries(world: &mut PlatformWorld, toolchain: String) {
    let set = world.flag_set(&toolchain);
    assert!(set.required_libraries.is_empty());
    assert!(set.library_dirs.is_empty());
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/platform.feature",
    name = "A 64-bit Linux host maps to linux-x64"
)]
fn scenario_linux_x64(world: PlatformWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/platform.feature",
    name = "A 32-bit process on a 64-bit CPU maps to x86"
)]
fn scenario_windows_x86(world: PlatformWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/platform.feature",
    name = "Apple silicon maps to osx-arm64"
)]
fn scenario_osx_arm64(world: PlatformWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/platform.feature",
    name = "An unknown machine is rejected"
)]
fn scenario_unknown_machine(world: PlatformWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/platform.feature",
    name = "macOS release flags drop stripping and use the link alias"
)]
fn scenario_macos_flags(world: PlatformWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/platform.feature",
    name = "Linux release flags link the library by file name"
)]
fn scenario_linux_flags(world: PlatformWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/platform.feature",
    name = "MinGW gets optimisation flags but no libraries"
)]
fn scenario_mingw_flags(world: PlatformWorld) {
    let _ = world;
}
