//! Modification records and the mutable modification list.

use crate::entry::Value;
use crate::error::ModifyResult;
use crate::schema::{AttributeDescriptor, SchemaRegistry};
use std::sync::Arc;

/// The kind of change a modification record requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModType {
    Add,
    Delete,
    Replace,
}

/// One modification: an operation kind, a target attribute, and values.
///
/// Records are mutable during processing: the apply engine rewrites a
/// Replace into Delete+Add in place, marks no-op deletes `ignored`, and
/// writes the values actually removed by a Delete back onto the record
/// so index and replication maintenance can see them.
#[derive(Debug, Clone)]
pub struct ModificationRecord {
    pub kind: ModType,
    pub attribute: String,
    pub values: Vec<Value>,
    /// Schema descriptor, resolved at most once per record
    pub descriptor: Option<Arc<AttributeDescriptor>>,
    /// Set when a whole-attribute delete targets an absent attribute
    pub ignored: bool,
}

impl ModificationRecord {
    pub fn new(kind: ModType, attribute: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            kind,
            attribute: attribute.into(),
            values,
            descriptor: None,
            ignored: false,
        }
    }

    pub fn add(attribute: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(ModType::Add, attribute, values)
    }

    pub fn delete(attribute: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(ModType::Delete, attribute, values)
    }

    /// A whole-attribute delete (no explicit values).
    pub fn delete_all(attribute: impl Into<String>) -> Self {
        Self::new(ModType::Delete, attribute, Vec::new())
    }

    pub fn replace(attribute: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(ModType::Replace, attribute, values)
    }

    /// Resolve the record's schema descriptor, caching it on the record.
    pub fn resolve_descriptor(
        &mut self,
        registry: &SchemaRegistry,
    ) -> ModifyResult<Arc<AttributeDescriptor>> {
        if let Some(descriptor) = &self.descriptor {
            return Ok(Arc::clone(descriptor));
        }
        let descriptor = registry.require(&self.attribute)?;
        self.descriptor = Some(Arc::clone(&descriptor));
        Ok(descriptor)
    }
}

/// An ordered, mutable sequence of modification records.
///
/// The apply engine iterates with an index-based cursor; inserting a
/// record at the cursor position without advancing is how a Replace
/// splices its Delete ahead of itself.
#[derive(Debug, Clone, Default)]
pub struct ModificationList {
    pub(crate) records: Vec<ModificationRecord>,
}

impl ModificationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<ModificationRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: ModificationRecord) {
        self.records.push(record);
    }

    pub fn insert(&mut self, index: usize, record: ModificationRecord) {
        self.records.insert(index, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ModificationRecord> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ModificationRecord> {
        self.records.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModificationRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ModificationRecord> {
        self.records.iter_mut()
    }

    /// Find the first non-ignored record for an attribute, by kind.
    pub fn find(&self, kind: ModType, attribute: &str) -> Option<&ModificationRecord> {
        self.records
            .iter()
            .find(|r| r.kind == kind && !r.ignored && r.attribute.eq_ignore_ascii_case(attribute))
    }
}

impl FromIterator<ModificationRecord> for ModificationList {
    fn from_iter<I: IntoIterator<Item = ModificationRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ModificationList {
    type Item = ModificationRecord;
    type IntoIter = std::vec::IntoIter<ModificationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_resolved_once() {
        let registry = SchemaRegistry::with_embedded_attributes().unwrap();
        let mut record = ModificationRecord::add("MAIL", vec![Value::text("a@x.com")]);
        let first = record.resolve_descriptor(&registry).unwrap();
        let second = record.resolve_descriptor(&registry).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name, "mail");
    }

    #[test]
    fn test_insert_at_cursor_position() {
        let mut list = ModificationList::from_records(vec![
            ModificationRecord::add("cn", vec![Value::text("a")]),
            ModificationRecord::add("sn", vec![Value::text("b")]),
        ]);
        list.insert(1, ModificationRecord::delete_all("sn"));
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(1).unwrap().kind, ModType::Delete);
        assert_eq!(list.get(1).unwrap().attribute, "sn");
    }
}
