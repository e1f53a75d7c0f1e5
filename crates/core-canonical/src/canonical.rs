//! Deterministic byte encoding of structured payloads
//!
//! Two payloads with the same logical fields must always encode to the
//! same bytes, regardless of field insertion order, locale, or process
//! state. The encoding is compact JSON with lexicographically sorted
//! object keys, `,` entry separators and `:` key separators, no
//! incidental whitespace, and UTF-8 output. `null` is written explicitly
//! so that an absent optional field and an omitted field never collapse
//! into the same bytes.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::value::Payload;

/// Maximum nesting depth accepted by the encoder.
const MAX_DEPTH: usize = 64;

/// Encode a payload into its canonical byte sequence.
pub fn canonicalize(payload: &Payload) -> Result<Vec<u8>> {
    let mut out = String::new();
    write_object(&mut out, payload, 0)?;
    Ok(out.into_bytes())
}

/// Encode a single value into its canonical string form.
///
/// Mostly useful for tests and for diff rendering; `canonicalize` is the
/// digest input path.
pub fn canonical_string(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_value(&mut out, value, 0)?;
    Ok(out)
}

fn write_value(out: &mut String, value: &Value, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::TooDeep {
            max_depth: MAX_DEPTH,
        });
    }

    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            // serde_json numbers are finite by construction; its shortest
            // round-trip rendering is deterministic across platforms.
            out.push_str(&n.to_string());
        }
        Value::String(s) => write_escaped(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item, depth + 1)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push('{');
            for (i, (key, val)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(out, key);
                out.push(':');
                write_value(out, val, depth + 1)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_object(out: &mut String, map: &Payload, depth: usize) -> Result<()> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    out.push('{');
    for (i, (key, val)) in entries.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_escaped(out, key);
        out.push(':');
        write_value(out, val, depth + 1)?;
    }
    out.push('}');
    Ok(())
}

/// JSON string escaping: `"` and `\`, the short control escapes, and
/// `\u00XX` for remaining control characters. Non-ASCII passes through as
/// UTF-8, matching compact JSON emitters that do not ASCII-escape.
fn write_escaped(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
