//! Schema catalog: attribute-type descriptors, matching rules, and the
//! registry that resolves and normalizes values for the write path.

pub mod embedded;
pub mod registry;
pub mod types;

pub use registry::SchemaRegistry;
pub use types::{
    ATTR_DN, ATTR_MODIFIERS_NAME, ATTR_MODIFY_TIMESTAMP, ATTR_PRINCIPAL_NAME,
    ATTR_SECURITY_DESCRIPTOR, AttributeDescriptor, MatchingRule, SystemAttribute,
};
