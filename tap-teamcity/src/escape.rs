//! TeamCity value escaping
//!
//! TeamCity service message values use `|` as the escape character. The
//! replacement table is fixed by TeamCity and must be applied exactly.

/// Escape arbitrary text for use inside a `'...'` service message value
///
/// Replaces `|`, `\n`, `\r`, `[`, `]`, U+0085, U+2028, U+2029 and `'`.
/// Every other character is copied unchanged.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '|' => escaped.push_str("||"),
            '\n' => escaped.push_str("|n"),
            '\r' => escaped.push_str("|r"),
            '[' => escaped.push_str("|["),
            ']' => escaped.push_str("|]"),
            '\u{0085}' => escaped.push_str("|x"),
            '\u{2028}' => escaped.push_str("|l"),
            '\u{2029}' => escaped.push_str("|p"),
            '\'' => escaped.push_str("|'"),
            other => escaped.push(other),
        }
    }
    escaped
}
