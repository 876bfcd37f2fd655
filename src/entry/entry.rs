//! In-memory entry representation owned by a single modify operation.

use super::attribute::AttributeValueSet;
use super::value::Value;
use crate::dn::Dn;
use crate::error::ModifyResult;
use crate::schema::SchemaRegistry;
use std::collections::HashMap;
use std::sync::Arc;

/// A directory entry materialized for the duration of one operation.
///
/// Holds the DN in raw and normalized forms, an unordered collection of
/// attribute value sets keyed case-insensitively by name, and the schema
/// context used to normalize it. Entries are read from the backend at
/// transaction start, mutated in place by the apply engine, and dropped
/// at transaction end whether the transaction commits or aborts.
#[derive(Debug, Clone)]
pub struct Entry {
    dn: Dn,
    attributes: HashMap<String, AttributeValueSet>,
    new_parent_dn: Option<Dn>,
    backend_id: Option<u64>,
    schema: Arc<SchemaRegistry>,
}

impl Entry {
    /// Create an entry with no attributes.
    pub fn new(dn: Dn, schema: Arc<SchemaRegistry>) -> Self {
        Self {
            dn,
            attributes: HashMap::new(),
            new_parent_dn: None,
            backend_id: None,
            schema,
        }
    }

    /// The backend's internal identifier, set when the entry was
    /// materialized from storage. Stable across a rename.
    pub fn backend_id(&self) -> Option<u64> {
        self.backend_id
    }

    pub fn set_backend_id(&mut self, id: u64) {
        self.backend_id = Some(id);
    }

    /// The entry's distinguished name.
    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    /// Point the entry at a new DN after a rename.
    pub fn set_dn(&mut self, dn: Dn) {
        self.dn = dn;
    }

    /// The superior DN, computed on demand.
    pub fn parent_dn(&self) -> Option<Dn> {
        self.dn.parent()
    }

    /// The schema context this entry was normalized against.
    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    /// Look up an attribute set by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&AttributeValueSet> {
        self.attributes.get(&name.to_ascii_lowercase())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AttributeValueSet> {
        self.attributes.get_mut(&name.to_ascii_lowercase())
    }

    /// Attach an attribute set, replacing any set with the same name.
    pub fn insert_set(&mut self, set: AttributeValueSet) {
        self.attributes.insert(set.name().to_ascii_lowercase(), set);
    }

    /// Unlink an attribute set from the entry.
    pub fn remove(&mut self, name: &str) -> Option<AttributeValueSet> {
        self.attributes.remove(&name.to_ascii_lowercase())
    }

    /// Iterate over all attribute sets.
    pub fn attribute_sets(&self) -> impl Iterator<Item = &AttributeValueSet> {
        self.attributes.values()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Pending re-parent target set by a DN replace whose new superior
    /// differs from the current one.
    pub fn pending_new_parent(&self) -> Option<&Dn> {
        self.new_parent_dn.as_ref()
    }

    pub fn set_pending_new_parent(&mut self, parent: Dn) {
        self.new_parent_dn = Some(parent);
    }

    /// Replace an attribute with the given text values, resolving the
    /// descriptor and normalizing each value.
    pub fn set_text_values(&mut self, name: &str, values: &[&str]) -> ModifyResult<()> {
        let schema = Arc::clone(&self.schema);
        let descriptor = schema.require(name)?;
        let mut set = AttributeValueSet::new(Arc::clone(&descriptor));
        for text in values {
            let mut value = Value::text(text);
            value.ensure_normalized(&schema, &descriptor)?;
            set.push(value);
        }
        self.insert_set(set);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> Entry {
        let schema = Arc::new(SchemaRegistry::with_embedded_attributes().unwrap());
        let dn = Dn::parse(&schema, "cn=Alice,ou=People,dc=x").unwrap();
        Entry::new(dn, schema)
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut entry = entry();
        entry.set_text_values("mail", &["a@x.com"]).unwrap();
        assert!(entry.get("MAIL").is_some());
        assert_eq!(entry.get("mail").unwrap().len(), 1);
        assert!(entry.get("sn").is_none());
    }

    #[test]
    fn test_remove_unlinks_the_set() {
        let mut entry = entry();
        entry.set_text_values("mail", &["a@x.com"]).unwrap();
        let removed = entry.remove("Mail").unwrap();
        assert_eq!(removed.name(), "mail");
        assert!(entry.get("mail").is_none());
    }

    #[test]
    fn test_parent_dn_computed_from_dn() {
        let entry = entry();
        assert_eq!(entry.parent_dn().unwrap().normalized(), "ou=people,dc=x");
    }
}
