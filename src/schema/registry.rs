//! Schema registry for loading, resolving, and normalizing attribute types.
//!
//! The registry is the write path's schema context: it resolves attribute
//! names to descriptors (case-insensitively, once per record) and
//! canonicalizes values per the attribute's matching rule so that
//! semantically-equal values compare byte-equal.

use super::embedded;
use super::types::{AttributeDescriptor, MatchingRule, SystemAttribute};
use crate::dn;
use crate::entry::Entry;
use crate::error::{ModifyError, ModifyResult, SchemaError, SchemaResult};

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Registry of attribute-type descriptors with normalization services.
///
/// Descriptors are shared via `Arc` so that entries and modification
/// records can hold resolved references without copying definitions.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    attributes: HashMap<String, Arc<AttributeDescriptor>>,
}

impl SchemaRegistry {
    /// Create a registry with the embedded core attribute types.
    pub fn new() -> SchemaResult<Self> {
        Self::with_embedded_attributes()
    }

    /// Create a registry with the embedded core attribute types.
    ///
    /// Uses the definitions embedded in the library and doesn't require
    /// external schema files. For site-specific schema, use
    /// [`from_schema_dir`](Self::from_schema_dir).
    pub fn with_embedded_attributes() -> SchemaResult<Self> {
        let mut registry = Self {
            attributes: HashMap::new(),
        };
        for descriptor in Self::load_attributes_from_str(embedded::core_attribute_types())? {
            registry.add_attribute(descriptor)?;
        }
        Ok(registry)
    }

    /// Create a registry from a directory containing `attributes.json`.
    ///
    /// The embedded core attribute types are always loaded first; the
    /// file may add further definitions but not redefine core ones.
    pub fn from_schema_dir<P: AsRef<Path>>(schema_dir: P) -> SchemaResult<Self> {
        let mut registry = Self::with_embedded_attributes()?;
        let path = schema_dir.as_ref().join("attributes.json");
        let content = fs::read_to_string(&path)?;
        for descriptor in Self::load_attributes_from_str(&content)? {
            registry.add_attribute(descriptor)?;
        }
        Ok(registry)
    }

    /// Parse attribute definitions from a JSON string.
    fn load_attributes_from_str(content: &str) -> SchemaResult<Vec<AttributeDescriptor>> {
        let descriptors: Vec<AttributeDescriptor> = serde_json::from_str(content)?;
        Ok(descriptors)
    }

    /// Add an attribute definition to the registry.
    ///
    /// The descriptor's system-attribute identity is resolved here, once,
    /// so later processing compares enum values instead of names.
    pub fn add_attribute(&mut self, mut descriptor: AttributeDescriptor) -> SchemaResult<()> {
        let key = descriptor.name.to_ascii_lowercase();
        if self.attributes.contains_key(&key) {
            return Err(SchemaError::DuplicateAttribute {
                name: descriptor.name,
            });
        }
        descriptor.system = SystemAttribute::from_name(&descriptor.name);
        self.attributes.insert(key, Arc::new(descriptor));
        Ok(())
    }

    /// Resolve an attribute name to its descriptor, case-insensitively.
    pub fn resolve(&self, name: &str) -> Option<Arc<AttributeDescriptor>> {
        self.attributes.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Resolve an attribute name, failing with `UndefinedAttributeType`.
    pub fn require(&self, name: &str) -> ModifyResult<Arc<AttributeDescriptor>> {
        self.resolve(name)
            .ok_or_else(|| ModifyError::UndefinedAttributeType {
                attribute: name.to_string(),
            })
    }

    /// Number of registered attribute types.
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Canonicalize a raw value per the attribute's matching rule.
    pub fn normalize(&self, descriptor: &AttributeDescriptor, raw: &[u8]) -> ModifyResult<Vec<u8>> {
        match descriptor.matching_rule {
            MatchingRule::OctetString => Ok(raw.to_vec()),
            MatchingRule::CaseIgnore => Ok(fold_string(raw, true)),
            MatchingRule::CaseExact => Ok(fold_string(raw, false)),
            MatchingRule::Integer => normalize_integer(&descriptor.name, raw),
            MatchingRule::GeneralizedTime => normalize_generalized_time(&descriptor.name, raw),
            MatchingRule::DistinguishedName => {
                let text = utf8_value(&descriptor.name, raw)?;
                Ok(dn::normalize_dn(self, text)?.into_bytes())
            }
        }
    }

    /// Check the mutated entry still conforms to the schema.
    ///
    /// Run for client-originated operations after apply; replicated data
    /// is assumed already validated at its origin.
    pub fn validate_entry(&self, entry: &Entry) -> ModifyResult<()> {
        if entry.get("objectClass").is_none() {
            return Err(ModifyError::SchemaViolation {
                detail: format!("entry '{}' has no objectClass", entry.dn().raw()),
            });
        }
        for set in entry.attribute_sets() {
            if self.resolve(set.name()).is_none() {
                return Err(ModifyError::SchemaViolation {
                    detail: format!("attribute '{}' is not defined in the schema", set.name()),
                });
            }
            if set.descriptor().single_valued && set.len() > 1 {
                return Err(ModifyError::SchemaViolation {
                    detail: format!("attribute '{}' must be single-valued", set.name()),
                });
            }
        }
        Ok(())
    }
}

/// Decode a value that must be UTF-8 text.
fn utf8_value<'a>(attribute: &str, raw: &'a [u8]) -> ModifyResult<&'a str> {
    std::str::from_utf8(raw).map_err(|_| ModifyError::InvalidAttributeSyntax {
        attribute: attribute.to_string(),
        detail: "value is not valid UTF-8".to_string(),
    })
}

/// Trim, collapse whitespace runs, and optionally case-fold a string value.
///
/// Values that are not UTF-8 get byte-level ASCII folding only.
fn fold_string(raw: &[u8], case_fold: bool) -> Vec<u8> {
    match std::str::from_utf8(raw) {
        Ok(text) => {
            let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if case_fold {
                collapsed.to_lowercase().into_bytes()
            } else {
                collapsed.into_bytes()
            }
        }
        Err(_) => {
            if case_fold {
                raw.to_ascii_lowercase()
            } else {
                raw.to_vec()
            }
        }
    }
}

/// Canonical decimal form: optional sign, no leading zeros.
fn normalize_integer(attribute: &str, raw: &[u8]) -> ModifyResult<Vec<u8>> {
    let text = utf8_value(attribute, raw)?.trim();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ModifyError::InvalidAttributeSyntax {
            attribute: attribute.to_string(),
            detail: format!("'{text}' is not an integer"),
        });
    }
    let trimmed = digits.trim_start_matches('0');
    let canonical = if trimmed.is_empty() {
        "0".to_string()
    } else {
        format!("{sign}{trimmed}")
    };
    Ok(canonical.into_bytes())
}

/// Canonical generalized-time form: `YYYYMMDDHHMMSSZ` in UTC.
///
/// Fractional seconds are accepted on input and dropped; the stored
/// granularity is one second.
fn normalize_generalized_time(attribute: &str, raw: &[u8]) -> ModifyResult<Vec<u8>> {
    let text = utf8_value(attribute, raw)?.trim();
    let body = text
        .strip_suffix('Z')
        .ok_or_else(|| ModifyError::InvalidAttributeSyntax {
            attribute: attribute.to_string(),
            detail: format!("'{text}' is missing the UTC designator"),
        })?;
    let (seconds_part, fraction) = match body.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (body, ""),
    };
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ModifyError::InvalidAttributeSyntax {
            attribute: attribute.to_string(),
            detail: format!("'{text}' has a malformed fractional part"),
        });
    }
    let parsed = NaiveDateTime::parse_from_str(seconds_part, "%Y%m%d%H%M%S").map_err(|e| {
        ModifyError::InvalidAttributeSyntax {
            attribute: attribute.to_string(),
            detail: format!("'{text}' is not a generalized time: {e}"),
        }
    })?;
    Ok(parsed.format("%Y%m%d%H%M%SZ").to_string().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::with_embedded_attributes().unwrap()
    }

    #[test]
    fn test_resolution_is_case_insensitive() {
        let registry = registry();
        let descriptor = registry.resolve("MAIL").unwrap();
        assert_eq!(descriptor.name, "mail");
        assert!(registry.resolve("noSuchAttribute").is_none());
    }

    #[test]
    fn test_require_reports_undefined_attribute() {
        let err = registry().require("frobnicator").unwrap_err();
        assert!(matches!(err, ModifyError::UndefinedAttributeType { .. }));
    }

    #[test]
    fn test_system_attributes_resolved_once() {
        let registry = registry();
        assert_eq!(
            registry.resolve("modifyTimestamp").unwrap().system,
            Some(SystemAttribute::ModifyTimestamp)
        );
        assert_eq!(registry.resolve("mail").unwrap().system, None);
    }

    #[test]
    fn test_case_ignore_normalization() {
        let registry = registry();
        let descriptor = registry.resolve("cn").unwrap();
        let normalized = registry.normalize(&descriptor, b"  Alice   SMITH ").unwrap();
        assert_eq!(normalized, b"alice smith");
    }

    #[test]
    fn test_integer_normalization() {
        let registry = registry();
        let descriptor = registry.resolve("employeeNumber").unwrap();
        assert_eq!(registry.normalize(&descriptor, b"0042").unwrap(), b"42");
        assert_eq!(registry.normalize(&descriptor, b"-007").unwrap(), b"-7");
        assert_eq!(registry.normalize(&descriptor, b"000").unwrap(), b"0");
        assert!(registry.normalize(&descriptor, b"12ab").is_err());
    }

    #[test]
    fn test_generalized_time_normalization() {
        let registry = registry();
        let descriptor = registry.resolve("modifyTimestamp").unwrap();
        assert_eq!(
            registry.normalize(&descriptor, b"20240229120000.123Z").unwrap(),
            b"20240229120000Z"
        );
        assert!(registry.normalize(&descriptor, b"20240230120000Z").is_err());
        assert!(registry.normalize(&descriptor, b"20240229120000").is_err());
    }

    #[test]
    fn test_duplicate_definition_rejected() {
        let mut registry = registry();
        let err = registry
            .add_attribute(AttributeDescriptor {
                name: "MAIL".to_string(),
                matching_rule: MatchingRule::CaseIgnore,
                single_valued: false,
                user_modifiable: true,
                operational: false,
                system: None,
            })
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateAttribute { .. }));
    }
}
