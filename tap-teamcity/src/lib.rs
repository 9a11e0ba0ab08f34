//! TAP to TeamCity converter library
//!
//! Converts streamed Test Anything Protocol output into TeamCity service
//! messages so a CI server can render test progress while the tests run.
//!
//! # Architecture
//!
//! Raw bytes flow through four small stages:
//! - [`parser`]: line tokenizer that turns TAP into [`TapEvent`]s
//! - [`router`]: maps each event onto session tracker operations
//! - [`tracker`]: the state machine holding the open test and assertion
//! - [`message`] / [`escape`]: render escaped `##teamcity[...]` lines
//!
//! [`TapTeamCity`] wires the stages together behind one object that accepts
//! TAP bytes and hands out TeamCity text. [`transform`] runs a whole
//! reader-to-writer conversion.
//!
//! # Example Usage
//!
//! ```
//! use tap_teamcity::{transform, ReporterConfig};
//!
//! let tap = "# addition\nok 1 two plus two\n";
//! let mut output = Vec::new();
//! let outcome = transform(tap.as_bytes(), &mut output, &ReporterConfig::default()).unwrap();
//!
//! let text = String::from_utf8(output).unwrap();
//! assert!(text.starts_with("\n##teamcity[testSuiteStarted name='addition']"));
//! assert!(!outcome.failed);
//! ```

// Public modules
pub mod config;
pub mod escape;
pub mod message;
pub mod output;
pub mod parser;
pub mod router;
pub mod stream;
pub mod tracker;
pub mod types;

// Re-export main types for convenience
pub use config::ReporterConfig;
pub use escape::escape;
pub use message::{format_message, ServiceMessage};
pub use output::OutputBuffer;
pub use parser::TapParser;
pub use router::EventRouter;
pub use stream::{transform, Outcome, TapTeamCity};
pub use tracker::{Clock, MonotonicClock, SessionTracker};
pub use types::{
    AssertionError, AssertionEvent, Plan, Result, Summary, TapEvent, TapTeamCityError,
    TestEvent,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
