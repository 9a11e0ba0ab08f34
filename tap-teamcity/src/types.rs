//! Core types for the TAP to TeamCity converter
//!
//! This module defines the structured events the TAP tokenizer emits and the
//! router consumes. Events are plain values: they are created once per TAP line
//! (or block), handed to the router, and never mutated afterwards.

use std::fmt;
use std::io;

/// Result type for converter operations
pub type Result<T> = std::result::Result<T, TapTeamCityError>;

/// Errors that can occur while converting a stream
#[derive(Debug, thiserror::Error)]
pub enum TapTeamCityError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Stream is closed: no more input accepted")]
    StreamClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<TapTeamCityError> for io::Error {
    fn from(err: TapTeamCityError) -> Self {
        match err {
            TapTeamCityError::Io(e) => e,
            closed @ TapTeamCityError::StreamClosed => {
                io::Error::new(io::ErrorKind::BrokenPipe, closed)
            }
            other @ TapTeamCityError::InvalidConfig(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, other)
            }
        }
    }
}

/// A test suite, announced in TAP by a `# <description>` comment line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestEvent {
    /// Suite description (text after the `#`)
    pub name: String,
    /// 1-based ordinal of this test in the stream
    pub number: u32,
}

impl TestEvent {
    pub fn new(name: impl Into<String>, number: u32) -> Self {
        Self {
            name: name.into(),
            number,
        }
    }
}

/// Flat diagnostics attached to a failed assertion
///
/// Populated from the indented `---` / `...` block that follows a
/// `not ok` line. Only `key: value` pairs on a single line are understood.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssertionError {
    pub operator: Option<String>,
    pub expected: Option<String>,
    pub actual: Option<String>,
    /// Source location reported by the test harness
    pub at: Option<String>,
}

impl AssertionError {
    /// Returns `(expected, actual)` when both are present and non-empty.
    ///
    /// A failure carrying only one of the two is treated as having no
    /// structured detail at all.
    pub fn comparison(&self) -> Option<(&str, &str)> {
        match (self.expected.as_deref(), self.actual.as_deref()) {
            (Some(expected), Some(actual)) if !expected.is_empty() && !actual.is_empty() => {
                Some((expected, actual))
            }
            _ => None,
        }
    }
}

/// One TAP assertion (`ok` / `not ok` line)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssertionEvent {
    /// Assertion description
    pub name: String,
    /// Assertion number as reported by TAP (or the running count)
    pub number: u32,
    /// Number of the enclosing test, 0 when no test was announced
    pub test: u32,
    /// True for `ok`, false for `not ok`
    pub ok: bool,
    /// Failure diagnostics (failed assertions only)
    pub error: Option<AssertionError>,
}

impl AssertionEvent {
    pub fn new(name: impl Into<String>, number: u32, test: u32) -> Self {
        Self {
            name: name.into(),
            number,
            test,
            ok: true,
            error: None,
        }
    }

    /// Builder method: mark the assertion as failed with optional diagnostics
    pub fn failed(mut self, error: Option<AssertionError>) -> Self {
        self.ok = false;
        self.error = error;
        self
    }

    /// Identity used to pair `pass`/`fail` with the generic `assert` event
    pub fn identity(&self) -> (u32, u32) {
        (self.test, self.number)
    }

    /// Returns `(expected, actual)` if the failure carries a comparison
    pub fn comparison(&self) -> Option<(&str, &str)> {
        self.error.as_ref().and_then(AssertionError::comparison)
    }
}

/// A TAP plan line (`1..N`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub from: u32,
    pub to: u32,
}

/// Totals for a whole TAP stream, carried by the final `output` event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// TAP version from a `TAP version N` line
    pub version: Option<u32>,
    /// The last plan line seen
    pub plan: Option<Plan>,
    /// Number of test suites (`# ...` lines)
    pub tests: u32,
    /// Number of assertions
    pub asserts: u32,
    pub pass: u32,
    pub fail: u32,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tests, {} assertions ({} passed, {} failed)",
            self.tests, self.asserts, self.pass, self.fail
        )?;
        if let Some(plan) = self.plan {
            write!(f, ", plan {}..{}", plan.from, plan.to)?;
        }
        Ok(())
    }
}

/// Structured event produced by the TAP tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapEvent {
    /// A new test suite begins
    Test(TestEvent),
    /// A successful assertion was observed (precedes its `Assert`)
    Pass(AssertionEvent),
    /// An assertion completed; fired for passes and failures alike
    Assert(AssertionEvent),
    /// A failed assertion was observed
    Fail(AssertionEvent),
    /// End of the whole TAP stream
    Output(Summary),
}

impl TapEvent {
    /// Event name as the upstream parser would report it
    pub fn kind(&self) -> &'static str {
        match self {
            TapEvent::Test(_) => "test",
            TapEvent::Pass(_) => "pass",
            TapEvent::Assert(_) => "assert",
            TapEvent::Fail(_) => "fail",
            TapEvent::Output(_) => "output",
        }
    }
}
