//! The AMI wire message: an ordered list of key/value fields.

use crate::constants::{BLOCK_TERMINATOR, LINE_TERMINATOR};
use crate::error::{AmiError, AmiResult};
use serde::{Deserialize, Serialize};

/// Validate a user-provided field key or value before it goes on the wire.
///
/// AMI blocks are line-delimited and colon-split; embedded CR/LF would let a
/// caller inject whole protocol blocks, and a colon in a key would shift the
/// split point when the peer echoes it back.
fn validate_field(key: &str, value: &str) -> AmiResult<()> {
    if key.is_empty() {
        return Err(AmiError::InvalidAction {
            message: "field key must not be empty".to_string(),
        });
    }
    if key.contains(':') {
        return Err(AmiError::InvalidAction {
            message: format!("field key {key:?} must not contain a colon"),
        });
    }
    if key.contains('\r') || key.contains('\n') || value.contains('\r') || value.contains('\n') {
        return Err(AmiError::InvalidAction {
            message: format!("field {key:?} must not contain CR or LF"),
        });
    }
    Ok(())
}

/// One AMI block: an ordered sequence of `(key, value)` fields.
///
/// Duplicate keys are permitted and their order is preserved — actions like
/// `Originate` legitimately carry several `Variable` fields. Key comparison
/// is ASCII case-insensitive throughout.
///
/// ```
/// use asterisk_ami_tokio::AmiMessage;
///
/// let mut msg = AmiMessage::new();
/// msg.set("Action", "Originate");
/// msg.set("Variable", "a=1");
/// msg.set("Variable", "b=2");
///
/// assert_eq!(msg.get("action"), Some("Originate"));
/// assert_eq!(msg.values("Variable").collect::<Vec<_>>(), ["a=1", "b=2"]);
/// assert_eq!(msg.get("Missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmiMessage {
    fields: Vec<(String, String)>,
}

impl AmiMessage {
    /// Create an empty message.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field. Existing fields with the same key are kept — repeated
    /// keys are part of the wire format, not an overwrite.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    /// First value whose key matches, case-insensitively. Absence is a valid
    /// outcome, never an error.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Every value whose key matches, in insertion order.
    pub fn values<'a>(&'a self, key: impl AsRef<str> + 'a) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key.as_ref()))
            .map(|(_, v)| v.as_str())
    }

    /// All fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields, duplicates included.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` when the message carries no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialize into one wire block: `Key: Value` CRLF lines in insertion
    /// order, closed by a blank line.
    ///
    /// Validates every field against CR/LF injection and colon-bearing keys,
    /// so a malformed message is rejected before any bytes leave the process.
    pub fn to_wire_format(&self) -> AmiResult<String> {
        use std::fmt::Write;

        let mut block = String::new();
        for (key, value) in &self.fields {
            validate_field(key, value)?;
            let _ = write!(block, "{key}: {value}{LINE_TERMINATOR}");
        }
        block.push_str(LINE_TERMINATOR);
        Ok(block)
    }

    /// Parse the interior of one block (terminator already stripped).
    ///
    /// Each line splits at the first colon; a single leading space is trimmed
    /// from the value, matching how the peer serializes `Key: Value`. A
    /// non-blank line without a colon is a malformed block.
    pub fn from_wire_block(raw: &str) -> AmiResult<Self> {
        let mut fields = Vec::new();
        for line in raw.split(LINE_TERMINATOR) {
            if line.is_empty() {
                continue;
            }
            let Some(pos) = line.find(':') else {
                return Err(AmiError::MalformedLine {
                    line: line.to_string(),
                });
            };
            let key = &line[..pos];
            let rest = &line[pos + 1..];
            let value = rest.strip_prefix(' ').unwrap_or(rest);
            fields.push((key.to_string(), value.to_string()));
        }
        Ok(Self { fields })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AmiMessage {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl std::fmt::Display for AmiMessage {
    /// Human-readable rendering, one `Key: Value` per line. Not the wire
    /// format — use [`to_wire_format`](Self::to_wire_format) for that.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (key, value) in &self.fields {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

// to_wire_format closes the block with one extra LINE_TERMINATOR; the framer
// strips BLOCK_TERMINATOR. The two must stay in lockstep.
const _: () = assert!(BLOCK_TERMINATOR.len() == 2 * LINE_TERMINATOR.len());
