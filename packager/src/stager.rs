//! Copying the published library into every place that needs it.
//!
//! The extension link step and the packaging pipeline each expect the native
//! library in a different directory: the current directory (the extension is
//! linked there with `-L.`), the build output directory the wheel is
//! assembled from, and a distribution staging directory. The stager copies
//! the artifact into each of them, adding the platform's side files:
//!
//! - Windows: the `.lib` import library next to every copy of the DLL.
//! - macOS: a `lib<alias>.dylib` duplicate in the current directory for the
//!   linker, since the runtime name cannot be passed to `-l`.
//!
//! Sources are never moved or deleted.

use crate::error::{PackagerError, Result};
use crate::platform::OperatingSystem;
use crate::publisher::NativeArtifact;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;

/// Directories receiving a copy of the native library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingTargets {
    /// Directory the extension module is linked in.
    pub current_dir: Utf8PathBuf,
    /// Build output directory, when the packaging pipeline provides one.
    pub build_output_dir: Option<Utf8PathBuf>,
    /// Distribution staging directory, when the packaging pipeline provides
    /// one.
    pub dist_dir: Option<Utf8PathBuf>,
}

impl StagingTargets {
    /// Targets with only the current directory.
    #[must_use]
    pub const fn current_only(current_dir: Utf8PathBuf) -> Self {
        Self {
            current_dir,
            build_output_dir: None,
            dist_dir: None,
        }
    }

    /// Every configured directory, current directory first.
    pub fn directories(&self) -> impl Iterator<Item = &Utf8Path> {
        std::iter::once(self.current_dir.as_path())
            .chain(self.build_output_dir.as_deref())
            .chain(self.dist_dir.as_deref())
    }
}

/// One completed copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCopy {
    /// File that was copied.
    pub source: Utf8PathBuf,
    /// Where it was copied to.
    pub destination: Utf8PathBuf,
    /// Number of bytes copied.
    pub bytes: u64,
}

/// Every copy made by [`stage`], in the order they were made.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedFiles {
    /// Completed copies.
    pub copies: Vec<StagedCopy>,
}

impl StagedFiles {
    /// Destination paths of all copies.
    pub fn destinations(&self) -> impl Iterator<Item = &Utf8Path> {
        self.copies.iter().map(|copy| copy.destination.as_path())
    }

    /// Number of files written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.copies.len()
    }

    /// Whether nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }
}

/// A copy the stager intends to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCopy {
    /// File to copy.
    pub source: Utf8PathBuf,
    /// Destination path.
    pub destination: Utf8PathBuf,
}

/// List the copies [`stage`] would make, without touching the file system.
#[must_use]
pub fn plan(
    artifact: &NativeArtifact,
    targets: &StagingTargets,
    host_os: OperatingSystem,
) -> Vec<PlannedCopy> {
    let file_name = artifact.file_name();
    let import_library = artifact.import_library_path();
    let mut copies = Vec::new();

    for dir in targets.directories() {
        copies.push(PlannedCopy {
            source: artifact.source_path.clone(),
            destination: dir.join(file_name),
        });

        if let Some(import) = &import_library {
            copies.push(PlannedCopy {
                source: import.clone(),
                destination: dir.join(artifact.logical_name.import_library_file_name()),
            });
        }

        if host_os.is_macos() && dir == targets.current_dir.as_path() {
            copies.push(PlannedCopy {
                source: artifact.source_path.clone(),
                destination: dir.join(artifact.logical_name.link_alias_file_name()),
            });
        }
    }
    copies
}

/// Copy `artifact` into every directory in `targets`.
///
/// The build output and dist directories are created when missing. Every
/// source file is checked before the first copy, so a missing source leaves
/// all targets untouched. A target that already holds the source file is
/// left alone and does not appear in the result.
///
/// # Errors
///
/// - [`PackagerError::ArtifactMissing`] if the library or, on Windows, its
///   import library does not exist.
/// - [`PackagerError::StagingFailed`] if a directory cannot be created or a
///   copy fails.
pub fn stage(
    artifact: &NativeArtifact,
    targets: &StagingTargets,
    host_os: OperatingSystem,
) -> Result<StagedFiles> {
    let planned = plan(artifact, targets, host_os);
    ensure_sources_exist(&planned)?;

    let mut staged = StagedFiles::default();
    for copy in planned {
        if is_same_file(&copy.source, &copy.destination) {
            debug!("{} is already in place; skipping", copy.destination);
            continue;
        }
        if let Some(parent) = copy.destination.parent() {
            create_dir(parent, &copy)?;
        }
        let bytes = fs::copy(&copy.source, &copy.destination)
            .map_err(|e| staging_failed(&copy, &e.to_string()))?;
        debug!("copied {} -> {} ({bytes} bytes)", copy.source, copy.destination);
        staged.copies.push(StagedCopy {
            source: copy.source,
            destination: copy.destination,
            bytes,
        });
    }
    Ok(staged)
}

fn ensure_sources_exist(planned: &[PlannedCopy]) -> Result<()> {
    match planned.iter().find(|copy| !copy.source.is_file()) {
        Some(missing) => Err(PackagerError::ArtifactMissing {
            path: missing.source.clone(),
        }),
        None => Ok(()),
    }
}

/// Whether `destination` already names `source`, through any path spelling.
///
/// Copying a file onto itself truncates it, so such copies are skipped.
fn is_same_file(source: &Utf8Path, destination: &Utf8Path) -> bool {
    if source == destination {
        return true;
    }
    match (source.canonicalize_utf8(), destination.canonicalize_utf8()) {
        (Ok(source), Ok(destination)) => source == destination,
        _ => false,
    }
}

fn create_dir(dir: &Utf8Path, copy: &PlannedCopy) -> Result<()> {
    if dir.as_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)
        .map_err(|e| staging_failed(copy, &format!("cannot create {dir}: {e}")))
}

fn staging_failed(copy: &PlannedCopy, reason: &str) -> PackagerError {
    PackagerError::StagingFailed {
        source_path: copy.source.clone(),
        destination: copy.destination.clone(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NativeLibraryName;
    use crate::publisher::ArtifactKind;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Tree {
        _temp: TempDir,
        root: Utf8PathBuf,
    }

    impl Tree {
        fn publish_dir(&self) -> Utf8PathBuf {
            self.root.join("publish")
        }

        fn targets(&self) -> StagingTargets {
            StagingTargets {
                current_dir: self.root.join("cwd"),
                build_output_dir: Some(self.root.join("build").join("lib")),
                dist_dir: Some(self.root.join("dist")),
            }
        }

        fn artifact(&self, os: OperatingSystem) -> NativeArtifact {
            let name = NativeLibraryName::default();
            NativeArtifact {
                source_path: self.publish_dir().join(name.file_name(os)),
                logical_name: name,
                kind: ArtifactKind::for_os(os),
            }
        }

        fn write(&self, path: &Utf8Path, contents: &[u8]) {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent");
            }
            fs::write(path, contents).expect("write");
        }
    }

    #[fixture]
    fn tree() -> Tree {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        fs::create_dir_all(root.join("cwd")).expect("cwd");
        Tree { _temp: temp, root }
    }

    #[rstest]
    fn linux_copies_primary_into_every_target(tree: Tree) {
        let artifact = tree.artifact(OperatingSystem::Linux);
        tree.write(&artifact.source_path, b"ELF");
        let targets = tree.targets();

        let staged = stage(&artifact, &targets, OperatingSystem::Linux).expect("stage");

        assert_eq!(staged.len(), 3);
        for dir in targets.directories() {
            let copy = dir.join("SoMRandomizer.api.so");
            assert_eq!(fs::read(&copy).expect("copy"), b"ELF");
        }
        assert!(staged.copies.iter().all(|copy| copy.bytes == 3));
        assert!(artifact.source_path.is_file(), "source is left in place");
    }

    #[rstest]
    fn windows_import_library_accompanies_every_copy(tree: Tree) {
        let artifact = tree.artifact(OperatingSystem::Windows);
        tree.write(&artifact.source_path, b"MZ");
        tree.write(
            &tree.publish_dir().join("SoMRandomizer.api.lib"),
            b"import",
        );
        let targets = tree.targets();

        let staged = stage(&artifact, &targets, OperatingSystem::Windows).expect("stage");

        assert_eq!(staged.len(), 6);
        for dir in targets.directories() {
            assert!(dir.join("SoMRandomizer.api.dll").is_file());
            assert!(dir.join("SoMRandomizer.api.lib").is_file());
        }
    }

    #[rstest]
    fn macos_link_alias_is_written_to_current_dir_only(tree: Tree) {
        let artifact = tree.artifact(OperatingSystem::MacOs);
        tree.write(&artifact.source_path, b"MACHO");
        let targets = tree.targets();

        let staged = stage(&artifact, &targets, OperatingSystem::MacOs).expect("stage");

        assert_eq!(staged.len(), 4);
        let alias = targets.current_dir.join("libSoMRandomizer-api.dylib");
        assert_eq!(fs::read(alias).expect("alias"), b"MACHO");
        assert!(targets.current_dir.join("SoMRandomizer.api.dylib").is_file());
        let dist = targets.dist_dir.as_ref().expect("dist dir");
        assert!(!dist.join("libSoMRandomizer-api.dylib").exists());
    }

    #[rstest]
    fn missing_import_library_fails_before_any_copy(tree: Tree) {
        let artifact = tree.artifact(OperatingSystem::Windows);
        tree.write(&artifact.source_path, b"MZ");
        let targets = tree.targets();

        let err = stage(&artifact, &targets, OperatingSystem::Windows).expect_err("missing .lib");

        assert!(
            matches!(
                err,
                PackagerError::ArtifactMissing { ref path }
                    if path.ends_with("SoMRandomizer.api.lib")
            ),
            "got {err:?}"
        );
        assert!(!targets.current_dir.join("SoMRandomizer.api.dll").exists());
        assert!(!tree.root.join("dist").exists());
        assert!(!tree.root.join("build").exists());
    }

    #[rstest]
    fn missing_primary_is_reported(tree: Tree) {
        let artifact = tree.artifact(OperatingSystem::Linux);

        let err = stage(&artifact, &tree.targets(), OperatingSystem::Linux).expect_err("missing");

        assert!(matches!(
            err,
            PackagerError::ArtifactMissing { ref path } if *path == artifact.source_path
        ));
    }

    #[rstest]
    fn absent_targets_are_skipped(tree: Tree) {
        let artifact = tree.artifact(OperatingSystem::Linux);
        tree.write(&artifact.source_path, b"ELF");
        let targets = StagingTargets::current_only(tree.root.join("cwd"));

        let staged = stage(&artifact, &targets, OperatingSystem::Linux).expect("stage");

        assert_eq!(
            staged.destinations().collect::<Vec<_>>(),
            vec![tree.root.join("cwd").join("SoMRandomizer.api.so").as_path()]
        );
    }

    #[rstest]
    fn staging_twice_overwrites_previous_copies(tree: Tree) {
        let artifact = tree.artifact(OperatingSystem::Linux);
        let targets = tree.targets();
        tree.write(&artifact.source_path, b"old");
        stage(&artifact, &targets, OperatingSystem::Linux).expect("first");
        tree.write(&artifact.source_path, b"new build");

        stage(&artifact, &targets, OperatingSystem::Linux).expect("second");

        let dist = tree.root.join("dist").join("SoMRandomizer.api.so");
        assert_eq!(fs::read(dist).expect("dist copy"), b"new build");
    }

    #[rstest]
    #[case::same_spelling(&["publish"])]
    #[case::through_parent(&["dist", "..", "publish"])]
    fn target_holding_the_source_keeps_it_intact(tree: Tree, #[case] segments: &[&str]) {
        let artifact = tree.artifact(OperatingSystem::Linux);
        tree.write(&artifact.source_path, b"universal library");
        fs::create_dir_all(tree.root.join("dist")).expect("dist");
        let build_output_dir = segments
            .iter()
            .fold(tree.root.clone(), |dir, segment| dir.join(segment));
        let targets = StagingTargets {
            current_dir: tree.root.join("cwd"),
            build_output_dir: Some(build_output_dir),
            dist_dir: None,
        };

        let staged = stage(&artifact, &targets, OperatingSystem::Linux).expect("stage");

        assert_eq!(
            fs::read(&artifact.source_path).expect("source"),
            b"universal library"
        );
        assert_eq!(staged.len(), 1);
        assert_eq!(
            staged.destinations().collect::<Vec<_>>(),
            vec![tree.root.join("cwd").join("SoMRandomizer.api.so").as_path()]
        );
    }

    #[test]
    fn plan_lists_copies_without_touching_disk() {
        let name = NativeLibraryName::default();
        let artifact = NativeArtifact {
            source_path: Utf8PathBuf::from("/nowhere/SoMRandomizer.api.dll"),
            logical_name: name,
            kind: ArtifactKind::WithImportLibrary,
        };
        let targets = StagingTargets::current_only(Utf8PathBuf::from("/cwd"));

        let planned = plan(&artifact, &targets, OperatingSystem::Windows);

        let destinations: Vec<_> = planned.iter().map(|c| c.destination.as_str()).collect();
        assert_eq!(
            destinations,
            vec!["/cwd/SoMRandomizer.api.dll", "/cwd/SoMRandomizer.api.lib"]
        );
    }
}
