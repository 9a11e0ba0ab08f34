//! Event routing
//!
//! Maps the five TAP parser events onto session tracker operations and pushes
//! the rendered messages to the output buffer, in arrival order.
//!
//! The parser reports a dedicated `pass` event only for successful assertions
//! but a generic `assert` event for every assertion, so `assert` is matched
//! against the open assertion by `(test, number)`: a match closes it, anything
//! else opens it.

use crate::config::ReporterConfig;
use crate::message::ServiceMessage;
use crate::output::OutputBuffer;
use crate::tracker::{Clock, MonotonicClock, SessionTracker};
use crate::types::{AssertionEvent, TapEvent, TestEvent};

/// Drives a [`SessionTracker`] from a stream of [`TapEvent`]s
#[derive(Debug)]
pub struct EventRouter<C: Clock = MonotonicClock> {
    tracker: SessionTracker<C>,
    failed: bool,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::with_config(&ReporterConfig::default())
    }

    pub fn with_config(config: &ReporterConfig) -> Self {
        Self::with_tracker(SessionTracker::with_config(config))
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> EventRouter<C> {
    pub fn with_tracker(tracker: SessionTracker<C>) -> Self {
        Self {
            tracker,
            failed: false,
        }
    }

    /// True once any `fail` event was routed. Never reset.
    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn tracker(&self) -> &SessionTracker<C> {
        &self.tracker
    }

    /// Route one event, pushing every emitted message to `out`
    pub fn dispatch(&mut self, event: TapEvent, out: &mut OutputBuffer) {
        log::debug!("Routing {} event", event.kind());

        match event {
            TapEvent::Test(test) => self.on_test(test, out),
            TapEvent::Pass(assertion) => self.on_pass(assertion, out),
            TapEvent::Assert(assertion) => self.on_assert(assertion, out),
            TapEvent::Fail(assertion) => self.on_fail(&assertion, out),
            TapEvent::Output(summary) => {
                log::debug!("TAP stream complete: {}", summary);
                self.on_output(out);
            }
        }
    }

    // Close the previous test (if any), then open the new one
    fn on_test(&mut self, test: TestEvent, out: &mut OutputBuffer) {
        emit(out, self.tracker.finish_test());
        out.push(self.tracker.start_test(test).to_string());
    }

    fn on_pass(&mut self, assertion: AssertionEvent, out: &mut OutputBuffer) {
        out.push(self.tracker.start_assertion(assertion).to_string());
    }

    fn on_assert(&mut self, assertion: AssertionEvent, out: &mut OutputBuffer) {
        let is_open = self
            .tracker
            .current_assertion()
            .is_some_and(|open| open.identity() == assertion.identity());

        if is_open {
            emit(out, self.tracker.finish_assertion());
        } else {
            out.push(self.tracker.start_assertion(assertion).to_string());
        }
    }

    // A failing assertion announced through `fail` before its `assert` is
    // finished here and again by the matching `assert`. Both are emitted.
    fn on_fail(&mut self, assertion: &AssertionEvent, out: &mut OutputBuffer) {
        log::debug!(
            "Assertion {} failed (test {})",
            assertion.number,
            assertion.test
        );
        emit(out, self.tracker.fail_assertion());
        emit(out, self.tracker.finish_assertion());
        self.failed = true;
    }

    fn on_output(&mut self, out: &mut OutputBuffer) {
        emit(out, self.tracker.finish_test());
        out.push("\n");
        out.end();
    }
}

fn emit(out: &mut OutputBuffer, message: Option<ServiceMessage>) {
    if let Some(message) = message {
        out.push(message.to_string());
    }
}
