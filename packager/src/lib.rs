//! SoMRandomizer native build orchestrator.
//!
//! This crate publishes the SoMRandomizer .NET library as a native shared
//! library for the host platform, merges per-architecture builds into a
//! universal library on macOS, copies the result wherever the packaging
//! pipeline expects it, and compiles the C extension module against it. It is
//! used by the `somr-build` CLI binary and can be driven programmatically
//! from a wheel build backend or from tests.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`compile`] - Extension module compilation with per-toolchain flags
//! - [`config`] - `somr-build.toml` loading
//! - [`error`] - Error types and exit codes
//! - [`exec`] - External command and tool lookup seams
//! - [`flags`] - Compiler and linker flag tables
//! - [`naming`] - Native library file naming
//! - [`output`] - Progress, dry-run and flag table formatting
//! - [`pipeline`] - Phase orchestration
//! - [`platform`] - Host platform detection
//! - [`publisher`] - Native library publish via the .NET SDK
//! - [`python`] - Python header and import library discovery
//! - [`runtime_id`] - .NET runtime identifiers
//! - [`stager`] - Copying the library into every destination
//! - [`universal`] - Universal macOS library synthesis

pub mod cli;
pub mod compile;
pub mod config;
pub mod error;
pub mod exec;
pub mod flags;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod publisher;
pub mod python;
pub mod runtime_id;
pub mod stager;
pub mod universal;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
