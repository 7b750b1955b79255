//! Plaintext line protocol: `<key> <value> <timestamp>\n`.
//!
//! Streams arrive as arbitrary chunks, so a line may be cut anywhere. A
//! [`Chunk`] splits the raw text into lines and remembers whether the last one
//! is unterminated; [`Chunk::reconcile`] then stitches the previous chunk's
//! leftover fragment onto the first line before the lines are parsed.
//!
//! The accepted grammar is deliberately narrow:
//!
//! ```text
//! ^[A-Za-z0-9_.]+ [0-9]+(\.[0-9])* [0-9]+$
//! ```
//!
//! Values may carry at most one digit after each dot, and repeated groups such
//! as `1.2.3` are accepted. Lines outside the grammar are dropped, never
//! reported.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static LINE_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.]+ [0-9]+(?:\.[0-9])* [0-9]+$").expect("Valid line grammar")
});

/// True iff `line` is a complete, well-formed protocol line.
#[inline]
pub fn is_valid_line(line: &str) -> bool {
    LINE_GRAMMAR.is_match(line)
}

/// A line that passed the grammar, split into its three fields.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePoint {
    /// Metric key
    pub key: String,
    /// Parsed value
    pub value: f64,
    /// Epoch seconds, `None` when the field does not fit in an `i64`
    pub timestamp: Option<i64>,
}

/// Parse one line, returning `None` when it does not match the grammar.
pub fn parse_line(line: &str) -> Option<LinePoint> {
    if !is_valid_line(line) {
        return None;
    }

    let mut fields = line.split_whitespace();
    let key = fields.next()?;
    let value = fields.next()?;
    let timestamp = fields.next()?;

    Some(LinePoint {
        key: key.to_string(),
        value: value_field(value),
        timestamp: timestamp.parse::<i64>().ok(),
    })
}

/// Numeric value of a grammar-valid value field.
///
/// Only the leading `digits[.digit]` part counts, so `1.2.3` reads as `1.2`.
/// Values too large for `f64` saturate at `f64::MAX`.
fn value_field(text: &str) -> f64 {
    let end = text
        .match_indices('.')
        .nth(1)
        .map_or(text.len(), |(idx, _)| idx);
    text[..end]
        .parse::<f64>()
        .map_or(0.0, |value| value.min(f64::MAX))
}

/// One raw chunk split into lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<'a> {
    lines: Vec<Cow<'a, str>>,
    incomplete: bool,
}

/// Leftover bookkeeping produced by [`Chunk::reconcile`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Reconciled {
    /// Unterminated tail to keep for the next chunk from the same source
    pub fragment: Option<String>,
    /// Previous fragment that could not be completed and was thrown away
    pub discarded: Option<String>,
}

impl<'a> Chunk<'a> {
    /// Split `data` on `\n`. The chunk is incomplete iff it does not end in a
    /// newline; an empty chunk has no lines at all.
    pub fn split(data: &'a str) -> Self {
        if data.is_empty() {
            return Self {
                lines: Vec::new(),
                incomplete: false,
            };
        }

        let incomplete = !data.ends_with('\n');
        let mut lines: Vec<Cow<'a, str>> = data.split('\n').map(Cow::Borrowed).collect();
        if !incomplete {
            // split leaves an empty string after the final newline
            lines.pop();
        }

        Self { lines, incomplete }
    }

    /// True when the last line is cut short.
    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    /// True when there is nothing to process.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && !self.incomplete
    }

    /// Join the source's previous fragment with this chunk's first line and
    /// detach this chunk's own unterminated tail.
    ///
    /// The join is kept only if it forms a valid line; otherwise the old
    /// fragment is discarded and the first line is left as is.
    pub fn reconcile(&mut self, pending: Option<String>) -> Reconciled {
        let mut reconciled = Reconciled::default();

        // Nothing arrived, so nothing can complete the fragment yet
        if self.is_empty() {
            reconciled.fragment = pending;
            return reconciled;
        }

        if let Some(mut joined) = pending {
            joined.push_str(self.lines.first().map_or("", |line| line.as_ref()));
            if is_valid_line(&joined) {
                match self.lines.first_mut() {
                    Some(first) => *first = Cow::Owned(joined),
                    None => self.lines.push(Cow::Owned(joined)),
                }
            } else {
                reconciled.discarded = Some(joined);
            }
        }

        if self.incomplete {
            reconciled.fragment = self.lines.pop().map(Cow::into_owned);
        }

        reconciled
    }

    /// Lines ready for parsing, in arrival order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|line| line.as_ref())
    }

    /// Parse every line, silently dropping the ones outside the grammar.
    pub fn points(&self) -> Vec<LinePoint> {
        self.lines().filter_map(parse_line).collect()
    }
}
