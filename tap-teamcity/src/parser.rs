//! TAP tokenizer
//!
//! Turns raw TAP bytes into [`TapEvent`]s. The tokenizer is line based and
//! lenient: every line is classified, nothing is rejected, and lines it does
//! not understand are skipped.
//!
//! ## Recognized lines
//! - `TAP version N`
//! - `A..B` plans
//! - `# tests N`, `# pass N`, `# fail N`, `# skip N`, `# todo N`, `# ok`
//!   (result summary, not tests)
//! - `# description` (a new test)
//! - `ok [N] [-] [description]` and `not ok [N] [-] [description]`
//! - an indented `---` ... `...` block after a failed assertion, read as
//!   `key: value` diagnostics. Literal (`|`, `|-`) and folded (`>`, `>-`)
//!   values are built from the deeper-indented lines below the key.
//!
//! ## Event order
//! A passing assertion yields `Pass` then `Assert`. A failing assertion is
//! held back until its diagnostics block is complete and then yields `Assert`
//! followed by `Fail`, both carrying the diagnostics.
//!
//! A diagnostics block ends at its `...` line, or at the first line indented
//! less than its `---` marker when the producer never closes it.
//!
//! A `not ok` line without a block is only known to have no block once the
//! next line arrives, so its events are delayed until then (or until
//! [`TapParser::finish`]). A producer that stalls right after a failure
//! delays that failure's report by the same amount.

use crate::types::{AssertionError, AssertionEvent, Plan, Summary, TapEvent, TestEvent};

/// Keywords of the summary comments harnesses print at the end of a run
const RESULT_KEYWORDS: [&str; 5] = ["tests", "pass", "fail", "skip", "todo"];

/// A failed assertion waiting for its diagnostics block
#[derive(Debug)]
struct PendingFailure {
    assertion: AssertionEvent,
    block: BlockState,
    error: Option<AssertionError>,
    /// Indentation of the `---` marker
    marker_indent: usize,
    /// Indentation of the first key in the block
    key_indent: Option<usize>,
    scalar: Option<BlockScalar>,
}

impl PendingFailure {
    /// Store the value of a finished `|` / `>` scalar
    fn close_scalar(&mut self) {
        if let (Some(scalar), Some(error)) = (self.scalar.take(), self.error.as_mut()) {
            let key = scalar.key.clone();
            set_diagnostic(error, &key, &scalar.value());
        }
    }
}

/// Multi-line value introduced by `key: |` or `key: >`
#[derive(Debug)]
struct BlockScalar {
    key: String,
    folded: bool,
    /// Indentation of the first content line
    indent: Option<usize>,
    lines: Vec<String>,
}

impl BlockScalar {
    fn new(key: &str, indicator: &str) -> Self {
        Self {
            key: key.to_string(),
            folded: indicator.starts_with('>'),
            indent: None,
            lines: Vec::new(),
        }
    }

    fn push(&mut self, line: &str, indent: usize) {
        let strip = *self.indent.get_or_insert(indent);
        let content = line.get(strip.min(indent)..).unwrap_or(line.trim_start());
        self.lines.push(content.trim_end().to_string());
    }

    fn value(mut self) -> String {
        while self.lines.last().is_some_and(|line| line.is_empty()) {
            self.lines.pop();
        }
        self.lines.join(if self.folded { " " } else { "\n" })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    /// `not ok` seen, no `---` yet
    Awaiting,
    /// Inside `---` ... `...`
    Open,
    /// `...` seen; the failure is ready to flush
    Closed,
}

/// Incremental TAP tokenizer
///
/// Feed it byte chunks of any size with [`TapParser::push`] and call
/// [`TapParser::finish`] at end of input.
#[derive(Debug, Default)]
pub struct TapParser {
    /// Bytes of the current, not yet terminated line
    partial: Vec<u8>,
    pending: Option<PendingFailure>,
    summary: Summary,
    finished: bool,
}

impl TapParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenize a complete TAP document
    pub fn parse_str(input: &str) -> Vec<TapEvent> {
        let mut parser = Self::new();
        let mut events = parser.push(input.as_bytes());
        events.extend(parser.finish());
        events
    }

    /// Totals gathered so far
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed a chunk of input. Returns the events completed by this chunk.
    ///
    /// Line boundaries may fall anywhere; an unterminated trailing line is
    /// kept until more bytes arrive or [`TapParser::finish`] is called.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<TapEvent> {
        let mut events = Vec::new();
        if self.finished {
            log::warn!("Ignoring {} bytes received after end of input", bytes.len());
            return events;
        }

        let mut rest = bytes;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            self.partial.extend_from_slice(head);
            let line = std::mem::take(&mut self.partial);
            self.handle_line(&line, &mut events);
            rest = &tail[1..];
        }
        self.partial.extend_from_slice(rest);

        events
    }

    /// Signal end of input. Flushes the last line and any held failure and
    /// yields the final `Output` event. Later calls yield nothing.
    pub fn finish(&mut self) -> Vec<TapEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.handle_line(&line, &mut events);
        }
        self.flush_pending(&mut events);

        self.finished = true;
        log::debug!("End of TAP input: {}", self.summary);
        events.push(TapEvent::Output(self.summary.clone()));
        events
    }

    fn handle_line(&mut self, raw: &[u8], events: &mut Vec<TapEvent>) {
        let decoded = String::from_utf8_lossy(raw);
        let line = decoded.strip_suffix('\r').unwrap_or(&decoded);
        log::trace!("TAP line: {:?}", line);

        if self.consume_diagnostics(line) {
            if self
                .pending
                .as_ref()
                .is_some_and(|pending| pending.block == BlockState::Closed)
            {
                self.flush_pending(events);
            }
            return;
        }
        self.flush_pending(events);

        if let Some(version) = parse_version(line) {
            self.summary.version = Some(version);
        } else if let Some(plan) = parse_plan(line) {
            self.summary.plan = Some(plan);
        } else if let Some(comment) = line.strip_prefix('#') {
            let text = comment.trim();
            if !is_result_line(text) {
                self.summary.tests += 1;
                events.push(TapEvent::Test(TestEvent::new(text, self.summary.tests)));
            }
        } else if let Some((ok, rest)) = split_assertion(line) {
            self.handle_assertion(ok, rest, events);
        }
    }

    fn handle_assertion(&mut self, ok: bool, rest: &str, events: &mut Vec<TapEvent>) {
        self.summary.asserts += 1;
        let (number, name) = parse_assertion_body(rest);
        let assertion = AssertionEvent::new(
            name,
            number.unwrap_or(self.summary.asserts),
            self.summary.tests,
        );

        if ok {
            self.summary.pass += 1;
            events.push(TapEvent::Pass(assertion.clone()));
            events.push(TapEvent::Assert(assertion));
        } else {
            self.summary.fail += 1;
            self.pending = Some(PendingFailure {
                assertion,
                block: BlockState::Awaiting,
                error: None,
                marker_indent: 0,
                key_indent: None,
                scalar: None,
            });
        }
    }

    /// Feed a line to the held failure's diagnostics block.
    /// Returns false when the line is not part of the block.
    fn consume_diagnostics(&mut self, line: &str) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        let trimmed = line.trim();
        let indented = line.starts_with(|c: char| c.is_whitespace());

        match pending.block {
            BlockState::Closed => false,
            BlockState::Awaiting => {
                if indented && trimmed == "---" {
                    pending.block = BlockState::Open;
                    pending.error = Some(AssertionError::default());
                    pending.marker_indent = line.len() - line.trim_start().len();
                    true
                } else {
                    false
                }
            }
            BlockState::Open => {
                if trimmed == "..." {
                    pending.close_scalar();
                    pending.block = BlockState::Closed;
                    return true;
                }
                if trimmed.is_empty() {
                    if let Some(scalar) = pending.scalar.as_mut() {
                        scalar.lines.push(String::new());
                    }
                    return true;
                }

                let indent = line.len() - line.trim_start().len();
                if !indented || indent < pending.marker_indent {
                    // Unterminated block: the line belongs to the stream again
                    log::debug!("Diagnostics block closed without '...'");
                    pending.close_scalar();
                    pending.block = BlockState::Closed;
                    return false;
                }

                let key_indent = *pending.key_indent.get_or_insert(indent);
                if indent > key_indent {
                    // Scalar body, or nested YAML that is not read
                    if let Some(scalar) = pending.scalar.as_mut() {
                        scalar.push(line, indent);
                    }
                    return true;
                }

                pending.close_scalar();
                if let Some((key, value)) = trimmed.split_once(':') {
                    let (key, value) = (key.trim(), value.trim());
                    if is_block_indicator(value) {
                        pending.scalar = Some(BlockScalar::new(key, value));
                    } else if let Some(error) = pending.error.as_mut() {
                        set_diagnostic(error, key, value);
                    }
                }
                true
            }
        }
    }

    fn flush_pending(&mut self, events: &mut Vec<TapEvent>) {
        if let Some(mut pending) = self.pending.take() {
            pending.close_scalar();
            let assertion = pending.assertion.failed(pending.error);
            events.push(TapEvent::Assert(assertion.clone()));
            events.push(TapEvent::Fail(assertion));
        }
    }
}

fn set_diagnostic(error: &mut AssertionError, key: &str, value: &str) {
    let slot = match key {
        "operator" => &mut error.operator,
        "expected" => &mut error.expected,
        "actual" => &mut error.actual,
        "at" => &mut error.at,
        _ => return,
    };
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

fn is_block_indicator(value: &str) -> bool {
    matches!(value, "|" | "|-" | "|+" | ">" | ">-" | ">+")
}

fn parse_version(line: &str) -> Option<u32> {
    line.strip_prefix("TAP version ")?.trim().parse().ok()
}

fn parse_plan(line: &str) -> Option<Plan> {
    let (from, to) = line.trim_end().split_once("..")?;
    let from = from.parse().ok()?;
    let digits: String = to.chars().take_while(|c| c.is_ascii_digit()).collect();
    let rest = &to[digits.len()..];
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return None;
    }
    Some(Plan {
        from,
        to: digits.parse().ok()?,
    })
}

fn is_result_line(text: &str) -> bool {
    if text == "ok" {
        return true;
    }
    let mut words = text.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some(keyword), Some(count), None) => {
            RESULT_KEYWORDS.contains(&keyword) && count.parse::<u32>().is_ok()
        }
        _ => false,
    }
}

/// Split `ok ...` / `not ok ...` into the status and the remainder
fn split_assertion(line: &str) -> Option<(bool, &str)> {
    let (ok, rest) = if let Some(rest) = line.strip_prefix("not ok") {
        (false, rest)
    } else if let Some(rest) = line.strip_prefix("ok") {
        (true, rest)
    } else {
        return None;
    };
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some((ok, rest))
    } else {
        None
    }
}

/// Parse `[N] [-] [description]`
fn parse_assertion_body(rest: &str) -> (Option<u32>, String) {
    let rest = rest.trim_start();
    let digits_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let (number, rest) = if digits_len > 0 {
        (rest[..digits_len].parse().ok(), &rest[digits_len..])
    } else {
        (None, rest)
    };
    let rest = rest.trim_start();
    let name = rest.strip_prefix('-').unwrap_or(rest).trim();
    (number, name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(events: &[TapEvent]) -> Vec<&'static str> {
        events.iter().map(TapEvent::kind).collect()
    }

    #[test]
    fn test_comment_is_test() {
        let events = TapParser::parse_str("# first test");
        assert_eq!(kinds(&events), vec!["test", "output"]);
        assert_eq!(events[0], TapEvent::Test(TestEvent::new("first test", 1)));
    }

    #[test]
    fn test_passing_assertion() {
        let events = TapParser::parse_str("ok 1 first assert");
        assert_eq!(kinds(&events), vec!["pass", "assert", "output"]);
        let expected = AssertionEvent::new("first assert", 1, 0);
        assert_eq!(events[0], TapEvent::Pass(expected.clone()));
        assert_eq!(events[1], TapEvent::Assert(expected));
    }

    #[test]
    fn test_failing_assertion_with_diagnostics() {
        let input = "not ok 2 second assert\n  ---\n    operator: equal\n    expected: false\n    actual:   true\n   at: Test.<anonymous> (./tap-teamcity.js:15:5)\n  ...";
        let events = TapParser::parse_str(input);
        assert_eq!(kinds(&events), vec!["assert", "fail", "output"]);

        let TapEvent::Fail(assertion) = &events[1] else {
            panic!("expected a fail event, got {:?}", events[1]);
        };
        assert_eq!(assertion.name, "second assert");
        assert_eq!(assertion.number, 2);
        assert!(!assertion.ok);
        assert_eq!(assertion.comparison(), Some(("false", "true")));
        let error = assertion.error.as_ref().unwrap();
        assert_eq!(error.operator.as_deref(), Some("equal"));
        assert_eq!(
            error.at.as_deref(),
            Some("Test.<anonymous> (./tap-teamcity.js:15:5)")
        );
        assert_eq!(events[0], TapEvent::Assert(assertion.clone()));
    }

    #[test]
    fn test_failure_without_block() {
        let events = TapParser::parse_str("not ok 1 bare\nok 2 next\n");
        assert_eq!(kinds(&events), vec!["assert", "fail", "pass", "assert", "output"]);
        let TapEvent::Fail(assertion) = &events[1] else {
            panic!("expected a fail event");
        };
        assert_eq!(assertion.error, None);
    }

    #[test]
    fn test_nested_diagnostics_ignored() {
        let input = "not ok 1 deep\n  ---\n    expected: 1\n    stack: |-\n      actual: nested\n    actual: 2\n  ...\n";
        let events = TapParser::parse_str(input);
        let TapEvent::Fail(assertion) = &events[1] else {
            panic!("expected a fail event");
        };
        assert_eq!(assertion.comparison(), Some(("1", "2")));
    }

    #[test]
    fn test_unterminated_block_ends_at_unindented_line() {
        let input = "not ok 1 bad\n  ---\n    expected: 1\n    actual: 2\n# second suite\nok 2 good\nnot ok 3 also bad\n";
        let events = TapParser::parse_str(input);
        assert_eq!(
            kinds(&events),
            vec!["assert", "fail", "test", "pass", "assert", "assert", "fail", "output"]
        );

        let TapEvent::Fail(first) = &events[1] else {
            panic!("expected a fail event, got {:?}", events[1]);
        };
        assert_eq!(first.comparison(), Some(("1", "2")));
        assert_eq!(events[2], TapEvent::Test(TestEvent::new("second suite", 1)));

        let TapEvent::Fail(last) = &events[6] else {
            panic!("expected a fail event, got {:?}", events[6]);
        };
        assert_eq!(last.name, "also bad");
        assert_eq!(last.error, None);
    }

    #[test]
    fn test_block_ends_at_line_left_of_marker() {
        let input = "not ok 1 nested\n    ---\n      actual: 2\n  stray\nok 2 after\n";
        let mut parser = TapParser::new();
        let events = parser.push(input.as_bytes());
        assert_eq!(kinds(&events), vec!["assert", "fail", "pass", "assert"]);

        let TapEvent::Fail(assertion) = &events[1] else {
            panic!("expected a fail event, got {:?}", events[1]);
        };
        let error = assertion.error.as_ref().unwrap();
        assert_eq!(error.actual.as_deref(), Some("2"));
    }

    #[test]
    fn test_block_scalar_values() {
        let input = "not ok 1 should be deeply equivalent\n  ---\n    operator: deepEqual\n    expected: |-\n      { a: 1,\n        b: 2 }\n    actual: |-\n      { a: 2 }\n    at: Test.<anonymous> (./deep.js:4:5)\n  ...\n";
        let events = TapParser::parse_str(input);
        let TapEvent::Fail(assertion) = &events[1] else {
            panic!("expected a fail event, got {:?}", events[1]);
        };
        assert_eq!(assertion.comparison(), Some(("{ a: 1,\n  b: 2 }", "{ a: 2 }")));
        let error = assertion.error.as_ref().unwrap();
        assert_eq!(error.operator.as_deref(), Some("deepEqual"));
        assert_eq!(error.at.as_deref(), Some("Test.<anonymous> (./deep.js:4:5)"));
    }

    #[test]
    fn test_folded_scalar_at_end_of_input() {
        let input = "not ok 1 long\n  ---\n    expected: >-\n      first\n      second\n    actual: x\n    stack: |\n      line";
        let events = TapParser::parse_str(input);
        let TapEvent::Fail(assertion) = &events[1] else {
            panic!("expected a fail event, got {:?}", events[1]);
        };
        assert_eq!(assertion.comparison(), Some(("first second", "x")));
    }

    #[test]
    fn test_failure_without_block_waits_for_next_line() {
        let mut parser = TapParser::new();
        assert!(parser.push(b"not ok 1 stalled\n").is_empty());

        let events = parser.push(b"# next\n");
        assert_eq!(kinds(&events), vec!["assert", "fail", "test"]);
    }

    #[test]
    fn test_arbitrary_chunking() {
        let input = "TAP version 13\n# suite\nok 1 a\nnot ok 2 b\n  ---\n    expected: x\n    actual: y\n  ...\n1..2\n";
        let whole = TapParser::parse_str(input);

        for size in 1..8 {
            let mut parser = TapParser::new();
            let mut events = Vec::new();
            for chunk in input.as_bytes().chunks(size) {
                events.extend(parser.push(chunk));
            }
            events.extend(parser.finish());
            assert_eq!(events, whole, "chunk size {}", size);
        }
    }

    #[test]
    fn test_numbering_and_test_reference() {
        let events = TapParser::parse_str("# one\nok first\n# two\nok - second\nok 7 seventh\n");
        let asserts: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                TapEvent::Assert(a) => Some((a.name.as_str(), a.number, a.test)),
                _ => None,
            })
            .collect();
        assert_eq!(
            asserts,
            vec![("first", 1, 1), ("second", 2, 2), ("seventh", 7, 2)]
        );
    }

    #[test]
    fn test_summary_and_result_lines() {
        let input = "TAP version 13\n# add\nok 1 sum\nnot ok 2 diff\n\n1..2\n# tests 2\n# pass  1\n# fail  1\n";
        let events = TapParser::parse_str(input);
        assert_eq!(
            kinds(&events),
            vec!["test", "pass", "assert", "assert", "fail", "output"]
        );
        let Some(TapEvent::Output(summary)) = events.last() else {
            panic!("expected output event last");
        };
        assert_eq!(summary.version, Some(13));
        assert_eq!(summary.plan, Some(Plan { from: 1, to: 2 }));
        assert_eq!((summary.tests, summary.asserts, summary.pass, summary.fail), (1, 2, 1, 1));
    }

    #[test]
    fn test_crlf_and_unknown_lines() {
        let events = TapParser::parse_str("# windows\r\nBail out? no\r\nokay not an assertion\r\n  indented ok 1\r\n");
        assert_eq!(kinds(&events), vec!["test", "output"]);
        assert_eq!(events[0], TapEvent::Test(TestEvent::new("windows", 1)));
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut parser = TapParser::new();
        assert_eq!(parser.finish().len(), 1);
        assert!(parser.finish().is_empty());
        assert!(parser.push(b"ok 1 late\n").is_empty());
        assert!(parser.is_finished());
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut parser = TapParser::new();
        let events = parser.push(b"# caf\xE9\n");
        assert_eq!(events[0], TapEvent::Test(TestEvent::new("caf\u{FFFD}", 1)));
    }
}
