//! Address validation and pattern matching
//!
//! Message addresses are plain paths:
//! ```text
//! /synth/1/freq
//! /mixer/channel/3/gain
//! ```
//!
//! Patterns (for listeners) add:
//! - `*` matches any run of characters within one segment
//! - `?` matches exactly one character within one segment
//! - `[abc]`, `[a-z]`, `[!abc]` match one character from a set
//! - `{foo,bar}` matches one of the listed strings
//! - `//` matches any number of leading or intermediate segments

use crate::{Error, Result};

/// Characters never allowed in a message address
pub const RESERVED_CHARS: &[char] = &[' ', '#', '*', ',', '?', '[', ']', '{', '}'];

/// Check a message address, rejecting empty addresses, a missing leading
/// `/`, `//` and reserved characters
pub fn validate(address: &str) -> Result<()> {
    if address.is_empty() {
        return Err(Error::InvalidAddress("empty address".to_string()));
    }

    if !address.starts_with('/') {
        return Err(Error::InvalidAddress(format!(
            "address must start with '/': {}",
            address
        )));
    }

    if address.contains("//") {
        return Err(Error::InvalidAddress(format!(
            "address contains '//': {}",
            address
        )));
    }

    if let Some(c) = address.chars().find(|c| RESERVED_CHARS.contains(c)) {
        return Err(Error::InvalidAddress(format!(
            "address contains reserved character {:?}: {}",
            c, address
        )));
    }

    Ok(())
}

pub fn is_valid(address: &str) -> bool {
    validate(address).is_ok()
}

/// A compiled address pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    regex: Option<regex_lite::Regex>,
}

impl Pattern {
    /// Compile a pattern string
    pub fn compile(s: &str) -> Result<Self> {
        if !s.starts_with('/') {
            return Err(Error::InvalidPattern(format!(
                "pattern must start with '/': {}",
                s
            )));
        }

        let is_literal = !s.contains("//") && !s.contains(['*', '?', '[', '{']);
        let regex = if is_literal {
            None
        } else {
            let regex_str = format!("^{}$", translate(s)?);
            Some(
                regex_lite::Regex::new(&regex_str)
                    .map_err(|e| Error::InvalidPattern(e.to_string()))?,
            )
        };

        Ok(Self {
            raw: s.to_string(),
            regex,
        })
    }

    /// Check if an address matches this pattern
    pub fn matches(&self, address: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(address),
            None => address == self.raw,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_literal(&self) -> bool {
        self.regex.is_none()
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl TryFrom<&str> for Pattern {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Pattern::compile(s)
    }
}

/// Translate OSC pattern syntax into a regex body
fn translate(pattern: &str) -> Result<String> {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                chars.next();
                // Zero or more whole segments, then the separator
                out.push_str("(?:/[^/]*)*/");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                let mut closed = false;
                for c in chars.by_ref() {
                    match c {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '-' => out.push('-'),
                        '\\' | '^' | '[' => {
                            out.push('\\');
                            out.push(c);
                        }
                        c => out.push(c),
                    }
                }
                if !closed {
                    return Err(Error::InvalidPattern(format!("unclosed '[' in {}", pattern)));
                }
                out.push(']');
            }
            '{' => {
                let mut body = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    body.push(c);
                }
                if !closed {
                    return Err(Error::InvalidPattern(format!("unclosed '{{' in {}", pattern)));
                }
                let alternatives: Vec<String> =
                    body.split(',').map(regex_lite::escape).collect();
                out.push_str("(?:");
                out.push_str(&alternatives.join("|"));
                out.push(')');
            }
            c => {
                let mut tmp = [0u8; 4];
                out.push_str(&regex_lite::escape(c.encode_utf8(&mut tmp)));
            }
        }
    }

    Ok(out)
}
