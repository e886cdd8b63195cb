//! UDF module descriptors and identity rules.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, UdfError};

/// Maximum length of a module name in bytes.
pub const MAX_NAME_LEN: usize = 127;

/// Characters that delimit fields in info commands and may not appear in names.
const RESERVED_NAME_CHARS: &[char] = &[';', ',', '=', ':', '\t', '\n', '\r'];

/// Language of a UDF module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UdfType {
    /// Lua source module.
    #[default]
    Lua,
}

impl UdfType {
    /// Returns the token used for this type on the wire.
    pub fn as_wire(&self) -> &'static str {
        match self {
            UdfType::Lua => "LUA",
        }
    }
}

impl fmt::Display for UdfType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for UdfType {
    type Err = UdfError;

    fn from_str(s: &str) -> Result<Self> {
        // Older nodes report the numeric enum value.
        if s.eq_ignore_ascii_case("lua") || s == "0" {
            Ok(UdfType::Lua)
        } else {
            Err(UdfError::Argument(format!("unsupported UDF type '{}'", s)))
        }
    }
}

/// Validates a module name against the registry's naming rules.
///
/// # Errors
///
/// Returns `UdfError::Argument` if the name is empty, longer than
/// [`MAX_NAME_LEN`] bytes, or contains an info-protocol delimiter.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(UdfError::Argument("module name must not be empty".to_string()));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(UdfError::Argument(format!(
            "module name is {} bytes, maximum is {}",
            name.len(),
            MAX_NAME_LEN
        )));
    }

    if let Some(c) = name.chars().find(|c| RESERVED_NAME_CHARS.contains(c)) {
        return Err(UdfError::Argument(format!(
            "module name contains reserved character {:?}",
            c
        )));
    }

    Ok(())
}

/// Metadata of a module registered on the cluster, without its content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UdfDescriptor {
    name: String,
    udf_type: UdfType,
    hash: String,
    size: u64,
}

impl UdfDescriptor {
    /// Creates a new descriptor.
    pub fn new(name: impl Into<String>, udf_type: UdfType, hash: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            udf_type,
            hash: hash.into(),
            size,
        }
    }

    /// Returns the module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the module type.
    pub fn udf_type(&self) -> UdfType {
        self.udf_type
    }

    /// Returns the hex-encoded content fingerprint.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Returns the content length in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns `true` if this descriptor has the given identity.
    pub fn is(&self, name: &str, udf_type: UdfType) -> bool {
        self.name == name && self.udf_type == udf_type
    }
}

/// A module together with its content, as returned by a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdfModule {
    descriptor: UdfDescriptor,
    content: Vec<u8>,
}

impl UdfModule {
    /// Creates a module from its descriptor and content.
    ///
    /// Callers are expected to have verified `descriptor.hash()` against
    /// the content.
    pub fn new(descriptor: UdfDescriptor, content: Vec<u8>) -> Self {
        Self { descriptor, content }
    }

    /// Returns the descriptor.
    pub fn descriptor(&self) -> &UdfDescriptor {
        &self.descriptor
    }

    /// Returns the module name.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Returns the module type.
    pub fn udf_type(&self) -> UdfType {
        self.descriptor.udf_type()
    }

    /// Returns the content fingerprint.
    pub fn hash(&self) -> &str {
        self.descriptor.hash()
    }

    /// Returns the module content.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Consumes the module, returning its content.
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}
