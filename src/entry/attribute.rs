//! A single attribute's ordered set of values.

use super::value::Value;
use crate::schema::AttributeDescriptor;
use std::sync::Arc;

/// Upper bound on the number of values one attribute may hold.
pub const MAX_VALUES_PER_ATTRIBUTE: usize = 65_535;

/// An attribute and its ordered values on an entry.
///
/// Insertion order carries no semantics but is preserved across mutation.
/// The schema descriptor is resolved once, when the set is created.
#[derive(Debug, Clone)]
pub struct AttributeValueSet {
    name: String,
    descriptor: Arc<AttributeDescriptor>,
    values: Vec<Value>,
    single_valued: bool,
}

impl AttributeValueSet {
    /// Create an empty set for the given resolved attribute type.
    pub fn new(descriptor: Arc<AttributeDescriptor>) -> Self {
        Self {
            name: descriptor.name.clone(),
            single_valued: descriptor.single_valued,
            descriptor,
            values: Vec::new(),
        }
    }

    /// Create a set holding the given values.
    pub fn with_values(descriptor: Arc<AttributeDescriptor>, values: Vec<Value>) -> Self {
        let mut set = Self::new(descriptor);
        set.values = values;
        set
    }

    /// The canonical attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved schema descriptor.
    pub fn descriptor(&self) -> &Arc<AttributeDescriptor> {
        &self.descriptor
    }

    /// Whether the schema restricts this attribute to a single value.
    pub fn is_single_valued(&self) -> bool {
        self.single_valued
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [Value] {
        &mut self.values
    }

    /// Append a value, preserving the order of those already present.
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Index of the value whose normalized form equals the given bytes.
    pub fn position_normalized(&self, normalized: &[u8]) -> Option<usize> {
        self.values
            .iter()
            .position(|v| v.matches_normalized(normalized))
    }

    /// Whether any value's normalized form equals the given bytes.
    pub fn contains_normalized(&self, normalized: &[u8]) -> bool {
        self.position_normalized(normalized).is_some()
    }

    /// Remove the values at the given indices, compacting the remainder
    /// into a dense prefix that preserves their relative order.
    pub fn remove_indices(&mut self, indices: &[usize]) {
        let mut index = 0;
        self.values.retain(|_| {
            let keep = !indices.contains(&index);
            index += 1;
            keep
        });
    }

    /// Take ownership of the values, leaving the set empty.
    pub fn take_values(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.values)
    }
}
