//! TeamCity service message formatting
//!
//! A service message is a single log line of the form
//! `##teamcity[<name> <key>='<value>' ...]`. Every message produced here is
//! prefixed with a newline so consecutive messages never share a line with
//! unrelated output.

use crate::escape::escape;
use std::fmt;

/// A named service message with an ordered list of attributes
///
/// Attribute order is preserved exactly as added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMessage {
    name: &'static str,
    attributes: Vec<(&'static str, String)>,
}

impl ServiceMessage {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            attributes: Vec::new(),
        }
    }

    /// Builder method: append an attribute
    ///
    /// Values are stored in their display form (`true`/`false` for booleans,
    /// decimal for integers) and escaped when the message is rendered.
    pub fn attr(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.attributes.push((key, value.to_string()));
        self
    }

    /// Message name (e.g. `testStarted`)
    pub fn name(&self) -> &str {
        self.name
    }

    /// Look up an attribute's unescaped value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for ServiceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\n##teamcity[{}", self.name)?;
        for (key, value) in &self.attributes {
            write!(f, " {}='{}'", key, escape(value))?;
        }
        write!(f, "]")
    }
}

/// Render a message from a name and ordered `(key, value)` pairs
pub fn format_message(name: &str, attributes: &[(&str, &str)]) -> String {
    let mut line = format!("\n##teamcity[{}", name);
    for (key, value) in attributes {
        line.push_str(&format!(" {}='{}'", key, escape(value)));
    }
    line.push(']');
    line
}
