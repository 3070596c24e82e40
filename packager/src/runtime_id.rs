//! Validated .NET runtime identifiers.
//!
//! A runtime identifier (RID) names the operating system and architecture a
//! native library is published for, such as `win-x64` or `linux-musl-arm64`.
//! RIDs are written into a generated MSBuild file and passed to external
//! processes, so construction rejects anything outside `[A-Za-z0-9-]`.

use crate::error::{PackagerError, Result};
use crate::platform::{Architecture, LibcFlavor, OperatingSystem, PlatformIdentity};
use serde::Serialize;
use std::fmt;

/// A runtime identifier accepted by `dotnet publish`.
///
/// # Examples
///
/// ```
/// use somr_build::runtime_id::RuntimeIdentifier;
///
/// let rid = RuntimeIdentifier::new("osx-arm64").expect("valid identifier");
/// assert_eq!(rid.as_str(), "osx-arm64");
/// assert!(RuntimeIdentifier::new("osx-arm64</RuntimeIdentifier>").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RuntimeIdentifier(String);

impl RuntimeIdentifier {
    /// Validate and wrap an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::InvalidIdentifier`] when the value is empty or
    /// contains characters other than ASCII letters, digits and hyphens.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if is_safe_identifier(&value) {
            Ok(Self(value))
        } else {
            Err(PackagerError::InvalidIdentifier { value })
        }
    }

    /// Build an identifier from an OS token and an architecture.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::UnsupportedArchitecture`] for an unknown
    /// architecture and [`PackagerError::InvalidIdentifier`] if `os_token`
    /// is malformed.
    pub fn from_parts(os_token: &str, architecture: &Architecture) -> Result<Self> {
        Self::new(format!("{os_token}-{}", architecture.token()?))
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for RuntimeIdentifier {
    type Error = PackagerError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for RuntimeIdentifier {
    type Error = PackagerError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl AsRef<str> for RuntimeIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuntimeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `value` matches `^[A-Za-z0-9-]+$`.
#[must_use]
pub fn is_safe_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// The OS portion of a runtime identifier for the given identity.
#[must_use]
pub const fn os_token(identity: &PlatformIdentity) -> &'static str {
    match identity.operating_system {
        OperatingSystem::Windows => "win",
        OperatingSystem::MacOs => "osx",
        OperatingSystem::Linux => match identity.libc {
            Some(LibcFlavor::Musl) => "linux-musl",
            Some(LibcFlavor::Bionic) => "linux-bionic",
            Some(LibcFlavor::Glibc) | None => "linux",
        },
        OperatingSystem::GenericUnix => "unix",
    }
}

/// Resolve the runtime identifier for a platform.
///
/// `architecture_override` replaces the detected architecture, which is how
/// the universal macOS build targets both halves from one host.
///
/// # Errors
///
/// Returns [`PackagerError::UnsupportedArchitecture`] when the effective
/// architecture is unknown.
///
/// # Examples
///
/// ```
/// use somr_build::platform::{Architecture, OperatingSystem, PlatformIdentity};
/// use somr_build::runtime_id::to_runtime_identifier;
///
/// let identity = PlatformIdentity {
///     operating_system: OperatingSystem::MacOs,
///     libc: None,
///     architecture: Architecture::Arm64,
/// };
/// let rid = to_runtime_identifier(&identity, Some(&Architecture::X64))?;
/// assert_eq!(rid.as_str(), "osx-x64");
/// # Ok::<(), somr_build::error::PackagerError>(())
/// ```
pub fn to_runtime_identifier(
    identity: &PlatformIdentity,
    architecture_override: Option<&Architecture>,
) -> Result<RuntimeIdentifier> {
    let architecture = architecture_override.unwrap_or(&identity.architecture);
    RuntimeIdentifier::from_parts(os_token(identity), architecture)
}
