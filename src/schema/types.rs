//! Core schema type definitions for directory attributes.
//!
//! This module contains the fundamental data structures that describe
//! attribute types, their matching rules, and their modification
//! characteristics as used by the write path.

use serde::{Deserialize, Serialize};

/// Name of the distinguished-name pseudo-attribute targeted by renames.
pub const ATTR_DN: &str = "distinguishedName";

/// Name of the principal-name attribute subject to syntax validation.
pub const ATTR_PRINCIPAL_NAME: &str = "userPrincipalName";

/// Name of the security-descriptor attribute subject to structural validation.
pub const ATTR_SECURITY_DESCRIPTOR: &str = "nTSecurityDescriptor";

/// Operational attribute recording the last modification time.
pub const ATTR_MODIFY_TIMESTAMP: &str = "modifyTimestamp";

/// Operational attribute recording the last modifying actor.
pub const ATTR_MODIFIERS_NAME: &str = "modifiersName";

/// Definition of a directory attribute type.
///
/// Describes the characteristics the write path needs: how values are
/// normalized for comparison, cardinality, and whether clients may
/// modify the attribute directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDescriptor {
    /// Canonical attribute name
    pub name: String,
    /// Matching rule governing value normalization and equality
    pub matching_rule: MatchingRule,
    /// Whether the attribute may hold at most one value
    #[serde(default)]
    pub single_valued: bool,
    /// Whether non-administrator clients may modify the attribute
    #[serde(default = "default_user_modifiable")]
    pub user_modifiable: bool,
    /// Whether the attribute is maintained by the server rather than clients
    #[serde(default)]
    pub operational: bool,
    /// Resolved system-attribute identity, set once at registry build time
    #[serde(skip)]
    pub system: Option<SystemAttribute>,
}

fn default_user_modifiable() -> bool {
    true
}

impl AttributeDescriptor {
    /// Whether values of this attribute are distinguished names.
    pub fn is_dn_syntax(&self) -> bool {
        self.matching_rule == MatchingRule::DistinguishedName
    }

    /// Whether this is the DN pseudo-attribute.
    pub fn is_dn_attribute(&self) -> bool {
        self.name.eq_ignore_ascii_case(ATTR_DN)
    }
}

/// Matching rules supported by the write path.
///
/// The rule determines how a raw value is canonicalized so that
/// semantically-equal values compare byte-equal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MatchingRule {
    /// Case-insensitive string match with whitespace folding
    CaseIgnore,
    /// Case-sensitive string match with whitespace folding
    CaseExact,
    /// Distinguished-name match (component-wise normalization)
    DistinguishedName,
    /// Integer match (canonical decimal form)
    Integer,
    /// Generalized-time match (canonical UTC form)
    GeneralizedTime,
    /// Exact octet match, no normalization
    OctetString,
}

/// Closed enumeration of server-maintained metadata attributes.
///
/// These attributes may diverge between replicas, so a delete naming a
/// stale value is downgraded to a whole-attribute delete instead of
/// failing. Identified once at schema resolution and compared by value
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemAttribute {
    CreateTimestamp,
    ModifyTimestamp,
    CreatorsName,
    ModifiersName,
}

impl SystemAttribute {
    /// Identify a system attribute from its canonical name.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("createTimestamp") {
            Some(Self::CreateTimestamp)
        } else if name.eq_ignore_ascii_case(ATTR_MODIFY_TIMESTAMP) {
            Some(Self::ModifyTimestamp)
        } else if name.eq_ignore_ascii_case("creatorsName") {
            Some(Self::CreatorsName)
        } else if name.eq_ignore_ascii_case(ATTR_MODIFIERS_NAME) {
            Some(Self::ModifiersName)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_attribute_identification() {
        assert_eq!(
            SystemAttribute::from_name("modifytimestamp"),
            Some(SystemAttribute::ModifyTimestamp)
        );
        assert_eq!(
            SystemAttribute::from_name("CREATORSNAME"),
            Some(SystemAttribute::CreatorsName)
        );
        assert_eq!(SystemAttribute::from_name("mail"), None);
    }

    #[test]
    fn test_descriptor_deserialization_defaults() {
        let descriptor: AttributeDescriptor =
            serde_json::from_str(r#"{"name": "mail", "matchingRule": "caseIgnore"}"#).unwrap();
        assert!(!descriptor.single_valued);
        assert!(descriptor.user_modifiable);
        assert!(!descriptor.operational);
        assert!(descriptor.system.is_none());
    }
}
