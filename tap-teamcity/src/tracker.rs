//! Session state machine
//!
//! Tracks the currently open test suite and the currently open assertion and
//! renders the TeamCity messages that open, fail and close them.
//!
//! Only one test and one assertion can be open at a time. Starting a new one
//! replaces the previous reference without emitting a finish message; closing
//! the previous one first is the router's job. Finishing does not forget the
//! open test or assertion, so a repeated finish emits again.

use crate::config::ReporterConfig;
use crate::message::ServiceMessage;
use crate::types::{AssertionEvent, TestEvent};
use std::time::Instant;

/// Source of timestamps used to measure durations
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Monotonic clock backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct Open<T> {
    event: T,
    started: Instant,
}

/// Holds the open test and assertion and renders their messages
#[derive(Debug)]
pub struct SessionTracker<C: Clock = MonotonicClock> {
    clock: C,
    capture_standard_output: bool,
    test: Option<Open<TestEvent>>,
    assertion: Option<Open<AssertionEvent>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::with_config(&ReporterConfig::default())
    }

    pub fn with_config(config: &ReporterConfig) -> Self {
        Self::with_clock(MonotonicClock, config)
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> SessionTracker<C> {
    pub fn with_clock(clock: C, config: &ReporterConfig) -> Self {
        Self {
            clock,
            capture_standard_output: config.capture_standard_output,
            test: None,
            assertion: None,
        }
    }

    /// The most recently started test, if any
    pub fn current_test(&self) -> Option<&TestEvent> {
        self.test.as_ref().map(|open| &open.event)
    }

    /// The most recently started assertion, if any
    pub fn current_assertion(&self) -> Option<&AssertionEvent> {
        self.assertion.as_ref().map(|open| &open.event)
    }

    /// Open a test suite. Always emits `testSuiteStarted`.
    pub fn start_test(&mut self, test: TestEvent) -> ServiceMessage {
        let message = ServiceMessage::new("testSuiteStarted").attr("name", &test.name);
        self.test = Some(Open {
            event: test,
            started: self.clock.now(),
        });
        message
    }

    /// Emit `testSuiteFinished` for the open test, if there is one
    pub fn finish_test(&self) -> Option<ServiceMessage> {
        let open = self.test.as_ref()?;
        Some(
            ServiceMessage::new("testSuiteFinished")
                .attr("name", &open.event.name)
                .attr("duration", self.elapsed_millis(open.started)),
        )
    }

    /// Open an assertion. Always emits `testStarted`.
    pub fn start_assertion(&mut self, assertion: AssertionEvent) -> ServiceMessage {
        let message = ServiceMessage::new("testStarted")
            .attr("name", &assertion.name)
            .attr("captureStandardOutput", self.capture_standard_output);
        self.assertion = Some(Open {
            event: assertion,
            started: self.clock.now(),
        });
        message
    }

    /// Emit `testFailed` for the open assertion, if there is one
    ///
    /// Comparison attributes are added only when the assertion carries both
    /// an expected and an actual value.
    pub fn fail_assertion(&self) -> Option<ServiceMessage> {
        let assertion = &self.assertion.as_ref()?.event;
        let mut message = ServiceMessage::new("testFailed").attr("name", &assertion.name);
        if let Some((expected, actual)) = assertion.comparison() {
            message = message
                .attr("type", "comparisonFailure")
                .attr("expected", expected)
                .attr("actual", actual);
        }
        Some(message)
    }

    /// Emit `testFinished` for the open assertion, if there is one
    pub fn finish_assertion(&self) -> Option<ServiceMessage> {
        let open = self.assertion.as_ref()?;
        Some(
            ServiceMessage::new("testFinished")
                .attr("name", &open.event.name)
                .attr("duration", self.elapsed_millis(open.started)),
        )
    }

    fn elapsed_millis(&self, since: Instant) -> u64 {
        let elapsed = self.clock.now().saturating_duration_since(since);
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}
