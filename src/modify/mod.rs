//! The entry modification engine: records, validation, rename
//! generation, and the apply pass.

pub mod apply;
pub mod record;
pub mod rename;
pub mod validate;

pub use apply::apply;
pub use record::{ModType, ModificationList, ModificationRecord};
pub use rename::{ModifyRequest, generate_rename_mods};
pub use validate::{normalize_mods, sanity_check};
