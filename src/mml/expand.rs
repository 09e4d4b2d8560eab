//! Labeled loop and repeat bracket expansion
//!
//! Both passes rewrite the channel text until no construct is left, so the
//! interpreter only ever sees a flat command string.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Character that marks a label as remote code, e.g. `(!1)`
pub const REMOTE_MARKER: char = '!';

/// Upper bound on rewrite steps of one expansion call
pub const MAX_EXPANSION_STEPS: usize = 10_000;

/// Upper bound on the length of an expanded channel text
pub const MAX_EXPANDED_LEN: usize = 1 << 22;

/// Most digits read as the count of a label invocation
const LABEL_COUNT_DIGITS: usize = 4;

/// Most digits read as the count of a repeat bracket
const LOOP_COUNT_DIGITS: usize = 5;

/// Labeled fragments defined so far in one parse call
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    local: HashMap<String, String>,
    remote: HashMap<String, String>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_remote(label: &str) -> bool {
        label.contains(REMOTE_MARKER)
    }

    pub fn define(&mut self, label: &str, body: &str) {
        let table = if Self::is_remote(label) {
            &mut self.remote
        } else {
            &mut self.local
        };
        table.insert(label.to_string(), body.to_string());
    }

    /// Body of a label; remote calls may carry arguments after a comma
    pub fn get(&self, label: &str) -> Option<&str> {
        if Self::is_remote(label) {
            let name = label.split(',').next().unwrap_or(label);
            self.remote.get(name).map(String::as_str)
        } else {
            self.local.get(label).map(String::as_str)
        }
    }

    pub fn local(&self) -> &HashMap<String, String> {
        &self.local
    }

    pub fn remote(&self) -> &HashMap<String, String> {
        &self.remote
    }
}

/// Expand `(label)[body]` definitions and `(label)count` invocations.
///
/// A local definition plays once in place (or `count` times when digits
/// follow the closing bracket); a remote definition only stores its body.
pub fn expand_labeled_loops(text: &str, table: &mut MacroTable) -> Result<String> {
    let mut text = text.to_string();
    let mut steps = 0;

    while let Some(start) = text.find('(') {
        steps += 1;
        if steps > MAX_EXPANSION_STEPS {
            return Err(Error::ExpansionLimit(MAX_EXPANSION_STEPS));
        }

        let end = text[start..]
            .find(')')
            .map(|i| start + i)
            .ok_or(Error::Unterminated {
                construct: "label",
                position: start,
            })?;
        let label = text[start + 1..end].to_string();
        let after = end + 1;

        if text[after..].starts_with('[') {
            let close = matching_bracket(&text, after)?;
            let body = text[after + 1..close].to_string();
            table.define(&label, &body);
            if MacroTable::is_remote(&label) {
                text.replace_range(start..=close, "");
            } else {
                // leave `(label)` behind so the definition plays as an invocation
                text.replace_range(after..=close, "");
            }
        } else {
            let (count, digits) = read_count(&text[after..], LABEL_COUNT_DIGITS);
            let body = table.get(&label).ok_or_else(|| Error::UndefinedMacro {
                label: label.clone(),
                position: start,
            })?;
            let expanded = repeat_within(body, count, text.len() - (after + digits - start))?;
            text.replace_range(start..after + digits, &expanded);
        }
    }

    if let Some(position) = text.find(')') {
        return Err(Error::Unbalanced { ch: ')', position });
    }

    Ok(text)
}

/// Expand `[[body]]count` super loops, then `[body]count` loops, innermost
/// first. A missing count plays the body once.
///
/// Single brackets inside a super loop are dropped and their counts stay in
/// the text, so `[[c[d]2]]2` becomes `cd2cd2`.
pub fn expand_loops(text: &str) -> Result<String> {
    let mut text = text.to_string();
    let mut cursor = 0;
    let mut steps = 0;

    while let Some(found) = text[cursor..].find("[[") {
        steps += 1;
        if steps > MAX_EXPANSION_STEPS {
            return Err(Error::ExpansionLimit(MAX_EXPANSION_STEPS));
        }

        let start = cursor + found;
        let Some(close) = super_loop_end(&text, start) else {
            // `[[` opening two plain loops, handled below
            cursor = start + 1;
            continue;
        };
        let body: String = text[start + 2..close]
            .chars()
            .filter(|&c| c != '[' && c != ']')
            .collect();
        let (count, digits) = read_count(&text[close + 2..], LOOP_COUNT_DIGITS);
        let end = close + 2 + digits;
        let expanded = repeat_within(&body, count, text.len() - (end - start))?;
        text.replace_range(start..end, &expanded);
        cursor = start;
    }

    expand_plain_loops(&text)
}

fn expand_plain_loops(text: &str) -> Result<String> {
    let mut text = text.to_string();
    let mut steps = 0;

    while let Some(close) = text.find(']') {
        steps += 1;
        if steps > MAX_EXPANSION_STEPS {
            return Err(Error::ExpansionLimit(MAX_EXPANSION_STEPS));
        }

        let open = text[..close].rfind('[').ok_or(Error::Unbalanced {
            ch: ']',
            position: close,
        })?;
        let (count, digits) = read_count(&text[close + 1..], LOOP_COUNT_DIGITS);
        let end = close + 1 + digits;
        let expanded = repeat_within(&text[open + 1..close], count, text.len() - (end - open))?;
        text.replace_range(open..end, &expanded);
    }

    if let Some(position) = text.find('[') {
        return Err(Error::Unterminated {
            construct: "loop",
            position,
        });
    }

    Ok(text)
}

/// `body` repeated `count` times, unless that takes the text past
/// [`MAX_EXPANDED_LEN`] with `kept` bytes around it
fn repeat_within(body: &str, count: usize, kept: usize) -> Result<String> {
    body.len()
        .checked_mul(count)
        .and_then(|len| len.checked_add(kept))
        .filter(|&len| len <= MAX_EXPANDED_LEN)
        .ok_or(Error::ExpansionTooLong(MAX_EXPANDED_LEN))?;
    Ok(body.repeat(count))
}

/// Index of the `]` matching the `[` at `open`
fn matching_bracket(text: &str, open: usize) -> Result<usize> {
    let mut depth = 0usize;
    for (i, b) in text.bytes().enumerate().skip(open) {
        match b {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(Error::Unterminated {
        construct: "label body",
        position: open,
    })
}

/// Index of the `]]` closing the super loop opened at `start`, skipping
/// plain loops nested inside it
fn super_loop_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = start + 2;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => depth += 1,
            b']' if depth > 0 => depth -= 1,
            b']' if bytes.get(i + 1) == Some(&b']') => return Some(i),
            b']' => return None,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Read up to `max_digits` leading digits; no digits means a count of 1.
/// Returns the count and the number of bytes consumed.
fn read_count(text: &str, max_digits: usize) -> (usize, usize) {
    let digits = text
        .bytes()
        .take(max_digits)
        .take_while(u8::is_ascii_digit)
        .count();
    match text[..digits].parse() {
        Ok(count) => (count, digits),
        Err(_) => (1, 0),
    }
}
