//! Type tags
//!
//! The one place that maps argument values to their type codes, shared by
//! both encoders so the typetag and the payload can never disagree.

use crate::types::Argument;
use crate::{Error, Result};

/// Deepest `[` nesting accepted by [`parse`]
pub const MAX_ARRAY_DEPTH: usize = 64;

/// One node of a parsed typetag string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Code(char),
    Array(Vec<TypeTag>),
}

/// Type code of a single argument
pub fn type_code(arg: &Argument) -> char {
    match arg {
        Argument::Int(_) => 'i',
        Argument::Long(_) => 'h',
        Argument::Float(_) => 'f',
        Argument::Double(_) => 'd',
        Argument::String(_) => 's',
        Argument::Blob(_) => 'b',
        Argument::Char(_) => 'c',
        Argument::Bool(true) => 'T',
        Argument::Bool(false) => 'F',
        Argument::Nil => 'N',
        Argument::Impulse => 'I',
        Argument::Time(_) => 't',
        Argument::TypedBlob(_) => 'B',
        Argument::Midi(_) => 'm',
        Argument::Array(_) => '[',
    }
}

/// Derive the typetag string (without the leading comma)
pub fn typetags(args: &[Argument]) -> String {
    let mut out = String::with_capacity(args.len());
    write_tags(args, &mut out);
    out
}

fn write_tags(args: &[Argument], out: &mut String) {
    for arg in args {
        match arg {
            Argument::Array(inner) => {
                out.push('[');
                write_tags(inner, out);
                out.push(']');
            }
            other => out.push(type_code(other)),
        }
    }
}

/// Parse a typetag string into a tree, nesting on `[` / `]`.
///
/// A leading comma is skipped if present.
pub fn parse(tags: &str) -> Result<Vec<TypeTag>> {
    let tags = tags.strip_prefix(',').unwrap_or(tags);
    let mut stack: Vec<Vec<TypeTag>> = vec![Vec::new()];

    for c in tags.chars() {
        match c {
            '[' => {
                if stack.len() > MAX_ARRAY_DEPTH {
                    return Err(Error::DecodeError(format!(
                        "array nesting too deep in typetag (limit {})",
                        MAX_ARRAY_DEPTH
                    )));
                }
                stack.push(Vec::new());
            }
            ']' => {
                if stack.len() < 2 {
                    return Err(Error::DecodeError(format!(
                        "unbalanced ']' in typetag {:?}",
                        tags
                    )));
                }
                let inner = stack.pop().unwrap_or_default();
                if let Some(parent) = stack.last_mut() {
                    parent.push(TypeTag::Array(inner));
                }
            }
            c => {
                if let Some(current) = stack.last_mut() {
                    current.push(TypeTag::Code(c));
                }
            }
        }
    }

    if stack.len() != 1 {
        return Err(Error::DecodeError(format!(
            "unterminated '[' in typetag {:?}",
            tags
        )));
    }

    Ok(stack.pop().unwrap_or_default())
}
