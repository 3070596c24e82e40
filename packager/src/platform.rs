//! Host platform detection.
//!
//! [`identify`] inspects the running host once and returns an immutable
//! [`PlatformIdentity`]. The operating system and libc come from the
//! compilation target; the CPU is read from the host itself so that an
//! emulated binary still builds for the machine it runs on. The mapping from
//! that identity to the tokens the .NET toolchain expects lives in
//! [`crate::runtime_id`]. Architecture
//! resolution is kept separate from detection so that an unrecognised CPU is
//! reported as [`PackagerError::UnsupportedArchitecture`] at the point it is
//! needed rather than silently mapped to a default.

use crate::error::{PackagerError, Result};
use crate::exec::{CommandExecutor, SystemCommandExecutor};
use log::debug;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Host operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingSystem {
    /// Microsoft Windows.
    Windows,
    /// Apple macOS.
    #[serde(rename = "macos")]
    MacOs,
    /// Linux, with the libc flavour recorded separately.
    Linux,
    /// Any other unix-like system.
    GenericUnix,
}

impl OperatingSystem {
    /// Map an OS name as reported by `std::env::consts::OS`.
    #[must_use]
    pub fn from_os_name(name: &str) -> Self {
        match name {
            "windows" => Self::Windows,
            "macos" => Self::MacOs,
            "linux" | "android" => Self::Linux,
            _ => Self::GenericUnix,
        }
    }

    /// The operating system this binary was compiled for.
    #[must_use]
    pub fn host() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Shared library extension, including the leading dot.
    #[must_use]
    pub const fn library_extension(self) -> &'static str {
        match self {
            Self::Windows => ".dll",
            Self::MacOs => ".dylib",
            Self::Linux | Self::GenericUnix => ".so",
        }
    }

    /// Whether this is macOS.
    #[must_use]
    pub const fn is_macos(self) -> bool {
        matches!(self, Self::MacOs)
    }

    /// Whether this is Windows.
    #[must_use]
    pub const fn is_windows(self) -> bool {
        matches!(self, Self::Windows)
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::GenericUnix => "unix",
        };
        f.write_str(name)
    }
}

/// C library flavour on Linux hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LibcFlavor {
    /// GNU libc.
    Glibc,
    /// musl libc.
    Musl,
    /// Android's bionic libc.
    Bionic,
}

impl LibcFlavor {
    /// The libc this binary was compiled against, if any is detectable.
    #[must_use]
    pub const fn host() -> Option<Self> {
        if cfg!(target_os = "android") {
            Some(Self::Bionic)
        } else if cfg!(target_env = "musl") {
            Some(Self::Musl)
        } else if cfg!(all(target_os = "linux", target_env = "gnu")) {
            Some(Self::Glibc)
        } else {
            None
        }
    }
}

/// CPU architecture of the host or of a requested build.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// 32-bit x86.
    X86,
    /// 64-bit x86.
    X64,
    /// 64-bit ARM.
    Arm64,
    /// 32-bit ARM.
    Arm,
    /// A machine token with no known mapping.
    Unknown(String),
}

impl Architecture {
    /// Classify a machine token, keeping unrecognised tokens as
    /// [`Architecture::Unknown`].
    ///
    /// `pointer_width` decides between `x64` and `x86` for the amd64 family,
    /// since a 32-bit process on a 64-bit CPU must load 32-bit libraries.
    #[must_use]
    pub fn from_machine(machine: &str, pointer_width: u32) -> Self {
        let token = machine.to_ascii_lowercase();
        match token.as_str() {
            "x86" | "i386" | "i586" | "i686" => Self::X86,
            "amd64" | "x86_64" | "x64" => {
                if pointer_width == 64 {
                    Self::X64
                } else {
                    Self::X86
                }
            }
            "arm64" | "aarch64" => Self::Arm64,
            other if other.starts_with("arm") => Self::Arm,
            _ => Self::Unknown(machine.to_owned()),
        }
    }

    /// Classify a machine token, failing on unrecognised tokens.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::UnsupportedArchitecture`] when the token has no
    /// known mapping.
    pub fn resolve(machine: &str, pointer_width: u32) -> Result<Self> {
        Self::from_machine(machine, pointer_width).supported()
    }

    /// Return `self` if it is a known architecture.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::UnsupportedArchitecture`] for
    /// [`Architecture::Unknown`].
    pub fn supported(self) -> Result<Self> {
        match self {
            Self::Unknown(machine) => Err(PackagerError::UnsupportedArchitecture { machine }),
            known => Ok(known),
        }
    }

    /// Token used in runtime identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::UnsupportedArchitecture`] for
    /// [`Architecture::Unknown`].
    pub fn token(&self) -> Result<&'static str> {
        match self {
            Self::X86 => Ok("x86"),
            Self::X64 => Ok("x64"),
            Self::Arm64 => Ok("arm64"),
            Self::Arm => Ok("arm"),
            Self::Unknown(machine) => Err(PackagerError::UnsupportedArchitecture {
                machine: machine.clone(),
            }),
        }
    }
}

impl FromStr for Architecture {
    type Err = PackagerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::resolve(s, 64)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(machine) => write!(f, "unknown ({machine})"),
            known => f.write_str(known.token().unwrap_or("unknown")),
        }
    }
}

impl Serialize for Architecture {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Immutable description of the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformIdentity {
    /// Operating system family.
    pub operating_system: OperatingSystem,
    /// libc flavour, detected on Linux only.
    pub libc: Option<LibcFlavor>,
    /// CPU architecture.
    pub architecture: Architecture,
}

/// Machine token reported by the host: `uname -m` on unix, the
/// `PROCESSOR_ARCHITECTURE` variable on Windows.
///
/// Falls back to the compilation target's architecture when the host cannot
/// be queried.
pub fn host_machine(os: OperatingSystem, executor: &dyn CommandExecutor) -> String {
    let reported = if os.is_windows() {
        std::env::var("PROCESSOR_ARCHITECTURE").ok()
    } else {
        executor
            .run("uname", &["-m"])
            .ok()
            .filter(|output| output.status.success())
            .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_owned())
    };
    reported
        .filter(|machine| !machine.trim().is_empty())
        .unwrap_or_else(|| {
            debug!("host machine unavailable; using {}", std::env::consts::ARCH);
            std::env::consts::ARCH.to_owned()
        })
}

/// Inspect the running host, querying its CPU through `executor`.
pub fn identify_with(executor: &dyn CommandExecutor) -> PlatformIdentity {
    let operating_system = OperatingSystem::host();
    let libc = if operating_system == OperatingSystem::Linux {
        LibcFlavor::host()
    } else {
        None
    };
    let machine = host_machine(operating_system, executor);
    PlatformIdentity {
        operating_system,
        libc,
        architecture: Architecture::from_machine(&machine, usize::BITS),
    }
}

/// Inspect the running host.
#[must_use]
pub fn identify() -> PlatformIdentity {
    identify_with(&SystemCommandExecutor)
}
