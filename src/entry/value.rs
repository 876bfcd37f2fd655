//! Attribute values in raw and normalized forms.

use crate::error::ModifyResult;
use crate::schema::{AttributeDescriptor, SchemaRegistry};
use std::borrow::Cow;

/// A single attribute value: opaque bytes plus a lazily computed
/// schema-normalized form.
///
/// A value is never compared for equality using its raw form; callers
/// normalize through [`ensure_normalized`](Self::ensure_normalized)
/// before any uniqueness or deletion-match comparison.
#[derive(Debug, Clone)]
pub struct Value {
    raw: Vec<u8>,
    normalized: Option<Vec<u8>>,
}

impl Value {
    /// Create a value from raw bytes, with no normalized form yet.
    pub fn new(raw: Vec<u8>) -> Self {
        Self {
            raw,
            normalized: None,
        }
    }

    /// Create a value from text.
    pub fn text(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }

    /// The value as supplied.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The normalized form, if computed.
    pub fn normalized(&self) -> Option<&[u8]> {
        self.normalized.as_deref()
    }

    /// Attach a precomputed normalized form.
    pub fn set_normalized(&mut self, normalized: Vec<u8>) {
        self.normalized = Some(normalized);
    }

    /// Normalize the value per the attribute's matching rule, if not
    /// already done, and return the normalized bytes.
    pub fn ensure_normalized(
        &mut self,
        registry: &SchemaRegistry,
        descriptor: &AttributeDescriptor,
    ) -> ModifyResult<&[u8]> {
        if self.normalized.is_none() {
            self.normalized = Some(registry.normalize(descriptor, &self.raw)?);
        }
        Ok(self.normalized.as_deref().unwrap_or(&self.raw))
    }

    /// Whether this value's normalized form equals the given bytes.
    ///
    /// Returns false when this value has not been normalized yet; the
    /// pipeline normalizes before any comparison is made.
    pub fn matches_normalized(&self, normalized: &[u8]) -> bool {
        self.normalized.as_deref() == Some(normalized)
    }

    /// The raw value rendered for diagnostics.
    pub fn display(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl From<Vec<u8>> for Value {
    fn from(raw: Vec<u8>) -> Self {
        Self::new(raw)
    }
}
