//! Shared test utilities for the packager crate.

use crate::error::{PackagerError, Result};
use crate::exec::{CommandExecutor, ToolLocator};
use camino::Utf8PathBuf;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Header directory reported by [`FakeToolchain`]'s Python interpreter.
pub const FAKE_PYTHON_INCLUDE: &str = "/opt/python/include/python3.12";

type Effect = Box<dyn FnOnce(&[&str])>;

/// Represents an expected command invocation for testing.
pub struct ExpectedCall {
    /// The command to execute (e.g., "dotnet").
    pub cmd: String,
    /// The arguments to pass to the command.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
    effect: Option<Effect>,
}

impl ExpectedCall {
    /// Expect `cmd` with exactly `args`, answering with `result`.
    pub fn new(cmd: impl Into<String>, args: &[&str], result: Result<Output>) -> Self {
        Self {
            cmd: cmd.into(),
            args: args.iter().map(|&arg| arg.to_owned()).collect(),
            result,
            effect: None,
        }
    }

    /// Run `effect` with the received arguments when the call happens.
    ///
    /// Used to simulate the files an external tool writes.
    #[must_use]
    pub fn with_effect(mut self, effect: impl FnOnce(&[&str]) + 'static) -> Self {
        self.effect = Some(Box::new(effect));
        self
    }
}

impl fmt::Debug for ExpectedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectedCall")
            .field("cmd", &self.cmd)
            .field("args", &self.args)
            .field("result", &self.result)
            .field("has_effect", &self.effect.is_some())
            .finish()
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects. Any
/// unexpected or mismatched invocation returns
/// [`PackagerError::StubMismatch`].
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    received: RefCell<Vec<Vec<String>>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            received: RefCell::new(Vec::new()),
        }
    }

    /// Creates a stub that rejects every invocation.
    #[must_use]
    pub fn forbidding_calls() -> Self {
        Self::new(Vec::new())
    }

    /// Every invocation received so far, command first.
    #[must_use]
    pub fn received(&self) -> Vec<Vec<String>> {
        self.received.borrow().clone()
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let mut invocation = vec![cmd.to_owned()];
        invocation.extend(args.iter().map(|&arg| arg.to_owned()));
        self.received.borrow_mut().push(invocation);

        let call = self
            .expected
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| PackagerError::StubMismatch {
                message: format!("unexpected command invocation: {cmd} {}", args.join(" ")),
            })?;

        if call.cmd != cmd || call.args != args {
            return Err(PackagerError::StubMismatch {
                message: format!(
                    "expected {} {}, got {cmd} {}",
                    call.cmd,
                    call.args.join(" "),
                    args.join(" ")
                ),
            });
        }

        if let Some(effect) = call.effect {
            effect(args);
        }
        call.result
    }
}

/// A [`ToolLocator`] with a fixed set of installed tools.
#[derive(Debug, Clone, Default)]
pub struct FixedToolLocator {
    tools: HashMap<String, Utf8PathBuf>,
}

impl FixedToolLocator {
    /// A locator that finds nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register `name` as installed at `path`.
    #[must_use]
    pub fn with_tool(mut self, name: &str, path: impl Into<Utf8PathBuf>) -> Self {
        self.tools.insert(name.to_owned(), path.into());
        self
    }
}

impl ToolLocator for FixedToolLocator {
    fn locate(&self, name: &str) -> Option<Utf8PathBuf> {
        self.tools.get(name).cloned()
    }
}

/// Run `f` with the environment variable `name` set to `"1"` or unset.
pub fn with_cache_signal<R>(name: &str, enabled: bool, f: impl FnOnce() -> R) -> R {
    temp_env::with_var(name, enabled.then_some("1"), f)
}

/// A [`CommandExecutor`] that imitates the external build tools on disk.
///
/// - `dotnet publish` reads the runtime identifier from the override file
///   and writes it as the library contents (plus a `.lib` next to a `.dll`).
/// - `lipo -output <out> -create <inputs>` joins its inputs with `+`.
/// - `python`/`python3` report [`FAKE_PYTHON_INCLUDE`] as their headers.
/// - Any other command is treated as a C compiler and writes the file named
///   by `-o` or `/Fe:`.
///
/// Every invocation is recorded, command first.
#[derive(Debug)]
pub struct FakeToolchain {
    publish_output: Utf8PathBuf,
    override_file: Utf8PathBuf,
    failing_rid: Option<String>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl FakeToolchain {
    /// A toolchain publishing to `publish_output`, reading identifiers from
    /// `override_file`.
    #[must_use]
    pub fn new(publish_output: Utf8PathBuf, override_file: Utf8PathBuf) -> Self {
        Self {
            publish_output,
            override_file,
            failing_rid: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Make publishes for `rid` exit with status 1.
    #[must_use]
    pub fn failing_for(mut self, rid: &str) -> Self {
        self.failing_rid = Some(rid.to_owned());
        self
    }

    /// Every invocation received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    /// Number of invocations of the program named `tool`.
    #[must_use]
    pub fn count(&self, tool: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.first().map(|cmd| program_name(cmd)) == Some(tool))
            .count()
    }

    fn publish(&self) -> Result<Output> {
        let contents = std::fs::read_to_string(&self.override_file)?;
        let rid = contents
            .split("<RuntimeIdentifier>")
            .nth(1)
            .and_then(|rest| rest.split("</RuntimeIdentifier>").next())
            .unwrap_or_default()
            .to_owned();
        if self.failing_rid.as_deref() == Some(rid.as_str()) {
            return Ok(failure_output(&format!(
                "error NETSDK1083: The specified RuntimeIdentifier '{rid}' is not recognized."
            )));
        }
        write_all(&self.publish_output, rid.as_bytes())?;
        if self.publish_output.extension() == Some("dll") {
            write_all(&self.publish_output.with_extension("lib"), b"import")?;
        }
        Ok(success_output())
    }

    fn merge(args: &[&str]) -> Result<Output> {
        let mut output = None;
        let mut inputs = Vec::new();
        let mut iter = args.iter();
        while let Some(&arg) = iter.next() {
            match arg {
                "-output" => output = iter.next().copied(),
                "-create" => {}
                input => inputs.push(std::fs::read_to_string(input)?),
            }
        }
        let output = output.ok_or_else(|| PackagerError::StubMismatch {
            message: "lipo invoked without -output".to_owned(),
        })?;
        write_all(camino::Utf8Path::new(output), inputs.join("+").as_bytes())?;
        Ok(success_output())
    }

    fn python_paths() -> Output {
        let stdout = format!(r#"{{"include_dir": "{FAKE_PYTHON_INCLUDE}", "library_dirs": []}}"#);
        Output {
            status: exit_status(0),
            stdout: stdout.into_bytes(),
            stderr: Vec::new(),
        }
    }

    fn compile(args: &[&str]) -> Result<Output> {
        let output = args
            .iter()
            .position(|&arg| arg == "-o")
            .and_then(|index| args.get(index + 1).copied())
            .or_else(|| args.iter().find_map(|arg| arg.strip_prefix("/Fe:")))
            .ok_or_else(|| PackagerError::StubMismatch {
                message: format!("compiler invoked without an output: {}", args.join(" ")),
            })?;
        write_all(camino::Utf8Path::new(output), b"extension")?;
        Ok(success_output())
    }
}

impl CommandExecutor for FakeToolchain {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let mut invocation = vec![cmd.to_owned()];
        invocation.extend(args.iter().map(|&arg| arg.to_owned()));
        self.calls.borrow_mut().push(invocation);

        match program_name(cmd) {
            "dotnet" => self.publish(),
            "lipo" => Self::merge(args),
            "python" | "python3" => Ok(Self::python_paths()),
            _ => Self::compile(args),
        }
    }
}

fn program_name(cmd: &str) -> &str {
    camino::Utf8Path::new(cmd).file_stem().unwrap_or(cmd)
}

fn write_all(path: &camino::Utf8Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}
