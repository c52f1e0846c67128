//! Rendering of emitted records as C preprocessor object-like macros.
//!
//! Every record becomes `#define NAME VALUE` followed by a line break. Text
//! and byte values are double-quoted; numbers are not. PEM text keeps its
//! internal line breaks inside the quotes.

use itertools::Itertools;

use crate::error::{ProvisionError, Result};

/// Value bound to a macro name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MacroValue {
    /// Quoted string literal.
    Text(String),
    /// Quoted string literal of `\xNN` escapes, one per byte.
    Bytes(Vec<u8>),
    /// Unquoted decimal integer.
    Decimal(u64),
    /// Unquoted `0x`-prefixed lowercase hex integer.
    Hex(u64),
}

impl MacroValue {
    /// Body of the literal as it appears after the macro name.
    pub fn render(&self) -> String {
        match self {
            MacroValue::Text(text) => format!("\"{}\"", escape_text(text)),
            MacroValue::Bytes(bytes) => format!("\"{}\"", escape_bytes(bytes)),
            MacroValue::Decimal(value) => value.to_string(),
            MacroValue::Hex(value) => format!("{:#x}", value),
        }
    }
}

/// One named definition in the secrets header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmittedRecord {
    pub name: String,
    pub value: MacroValue,
}

impl EmittedRecord {
    pub fn new(name: impl Into<String>, value: MacroValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn render(&self) -> Result<String> {
        format_macro(&self.name, &self.value)
    }
}

/// Render `#define NAME VALUE\n`.
///
/// The name must be an upper-case C identifier; anything else would either
/// fail to preprocess or silently define a different symbol.
pub fn format_macro(name: &str, value: &MacroValue) -> Result<String> {
    if !is_macro_name(name) {
        return Err(ProvisionError::InvalidMacroName(name.to_string()));
    }
    Ok(format!("#define {} {}\n", name, value.render()))
}

fn is_macro_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Encode bytes as a C string body of `\xNN` escapes (lowercase hex).
pub fn escape_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\x{:02x}", b)).join("")
}

// Line breaks pass through untouched so PEM armour stays readable.
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(c),
        }
    }
    escaped
}
