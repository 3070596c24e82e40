//! Test support utilities for packager behavioural tests.
//!
//! Provides a throwaway project tree with staging targets, identities for
//! arbitrary hosts, and the fake external tools the scenarios run against.

use camino::Utf8PathBuf;
use somr_build::config::{NativeProjectConfig, PackagerConfig};
use somr_build::platform::{Architecture, LibcFlavor, OperatingSystem, PlatformIdentity};
use somr_build::stager::StagingTargets;
use somr_build::test_utils::{FakeToolchain, FixedToolLocator};
use tempfile::TempDir;

/// Environment variable standing in for the CI wheel-build signal.
pub const CACHE_SIGNAL: &str = "SOMR_BUILD_BEHAVIOUR_PREBUILT";

/// A temporary project root with the native project directory created and
/// every staging target configured.
pub struct TempProject {
    _temp: TempDir,
    pub root: Utf8PathBuf,
    pub config: PackagerConfig,
    pub targets: StagingTargets,
}

impl TempProject {
    /// Creates the project tree under a fresh temporary directory.
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let root =
            Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("temp dir is not UTF-8");
        let config = PackagerConfig {
            native: NativeProjectConfig {
                cache_signal: CACHE_SIGNAL.to_owned(),
                ..NativeProjectConfig::default()
            },
            ..PackagerConfig::default()
        };
        std::fs::create_dir_all(config.native.project_path(&root))
            .expect("failed to create native project dir");
        let targets = StagingTargets {
            current_dir: root.clone(),
            build_output_dir: Some(root.join("build").join("lib")),
            dist_dir: Some(root.join("build").join("bdist")),
        };
        Self {
            _temp: temp,
            root,
            config,
            targets,
        }
    }

    /// Conventional publish output for `os`.
    pub fn publish_output(&self, os: OperatingSystem) -> Utf8PathBuf {
        self.config.native.output_path(&self.root, os)
    }

    /// A fake toolchain writing into this project.
    pub fn toolchain(&self, os: OperatingSystem) -> FakeToolchain {
        FakeToolchain::new(
            self.publish_output(os),
            self.config.native.override_file(&self.root),
        )
    }

    /// Writes `contents` at the conventional publish output for `os`.
    pub fn seed_publish_output(&self, os: OperatingSystem, contents: &str) {
        let output = self.publish_output(os);
        let parent = output.parent().expect("output has a parent");
        std::fs::create_dir_all(parent).expect("failed to create output dir");
        std::fs::write(&output, contents).expect("failed to seed output");
    }

    /// Reads a file relative to the project root.
    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.root.join(relative))
            .unwrap_or_else(|err| panic!("failed to read {relative}: {err}"))
    }
}

/// Parses an OS name as used in feature files.
pub fn operating_system(name: &str) -> OperatingSystem {
    OperatingSystem::from_os_name(name)
}

/// A host identity for `os` and `machine`, with glibc on Linux.
pub fn identity(os: OperatingSystem, machine: &str) -> PlatformIdentity {
    let libc = (os == OperatingSystem::Linux).then_some(LibcFlavor::Glibc);
    PlatformIdentity {
        operating_system: os,
        libc,
        architecture: Architecture::from_machine(machine, 64),
    }
}

/// A locator finding both the .NET SDK and the merge tool.
pub fn installed_tools() -> FixedToolLocator {
    FixedToolLocator::empty()
        .with_tool("dotnet", "/opt/dotnet/dotnet")
        .with_tool("lipo", "/usr/bin/lipo")
        .with_tool("python3", "/usr/bin/python3")
        .with_tool("python", "/opt/python/python")
}
