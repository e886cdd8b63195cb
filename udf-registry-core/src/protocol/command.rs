//! Info command construction and `key=value` field parsing.

use std::fmt;

use super::constants::{COMMAND_SEPARATOR, FIELD_SEPARATOR};
use crate::error::{Result, UdfError};
use crate::udf::UdfType;

/// A single administrative command addressed to one node.
///
/// Rendered as `name` when it has no parameters, otherwise as
/// `name:key=value;key=value;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoCommand {
    name: &'static str,
    params: Vec<(&'static str, String)>,
    subject: Option<(String, UdfType)>,
}

impl InfoCommand {
    /// Creates a command with no parameters.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            params: Vec::new(),
            subject: None,
        }
    }

    /// Appends a `key=value` parameter.
    pub fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.params.push((key, value.to_string()));
        self
    }

    /// Records the module this command is about, used when mapping a
    /// not-found report to an error.
    pub fn subject(mut self, name: impl Into<String>, udf_type: UdfType) -> Self {
        self.subject = Some((name.into(), udf_type));
        self
    }

    /// Returns the command name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the value of a parameter, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the module this command is about.
    pub fn target(&self) -> Option<(&str, UdfType)> {
        self.subject.as_ref().map(|(name, t)| (name.as_str(), *t))
    }

    /// Renders the command as sent on the wire, without the trailing newline.
    pub fn render(&self) -> String {
        if self.params.is_empty() {
            return self.name.to_string();
        }

        let capacity = self.name.len()
            + 1
            + self
                .params
                .iter()
                .map(|(k, v)| k.len() + v.len() + 2)
                .sum::<usize>();
        let mut out = String::with_capacity(capacity);
        out.push_str(self.name);
        out.push(COMMAND_SEPARATOR);
        for (key, value) in &self.params {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push(FIELD_SEPARATOR);
        }
        out
    }
}

impl fmt::Display for InfoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { COMMAND_SEPARATOR } else { FIELD_SEPARATOR };
            // content parameters can be megabytes long
            if value.len() > 64 {
                write!(f, "{}{}=<{} bytes>", sep, key, value.len())?;
            } else {
                write!(f, "{}{}={}", sep, key, value)?;
            }
        }
        Ok(())
    }
}

/// Parsed `key=value` pairs of one response or record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fields<'a> {
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> Fields<'a> {
    /// Parses `key=value` pairs separated by `separator`.
    ///
    /// Empty segments are skipped; keys are trimmed.
    ///
    /// # Errors
    ///
    /// Returns `UdfError::Transport` if a segment has no `=`.
    pub fn parse(text: &'a str, separator: char) -> Result<Self> {
        let mut pairs = Vec::new();
        for segment in text.split(separator) {
            let segment = segment.trim_matches(|c| c == '\n' || c == '\r');
            if segment.is_empty() {
                continue;
            }
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                UdfError::Transport(format!("malformed response field '{}'", segment))
            })?;
            pairs.push((key.trim(), value));
        }
        Ok(Self { pairs })
    }

    /// Returns the value of the first field named `key`.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    /// Returns the value of `key`, failing if it is absent.
    pub fn require(&self, key: &str) -> Result<&'a str> {
        self.get(key)
            .ok_or_else(|| UdfError::Transport(format!("response is missing field '{}'", key)))
    }

    /// Returns the value of `key` parsed as an unsigned integer.
    pub fn require_u64(&self, key: &str) -> Result<u64> {
        let value = self.require(key)?;
        value.trim().parse::<u64>().map_err(|_| {
            UdfError::Transport(format!("field '{}' is not a valid size: '{}'", key, value))
        })
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` if no fields were parsed.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
