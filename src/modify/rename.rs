//! Rename mod-list generation.
//!
//! When a modify request carries a new relative name, the extra
//! modifications implied by the DN change are generated here and appended
//! to the operation's modification list ahead of apply processing.

use super::record::ModificationRecord;
use crate::dn::{self, Dn};
use crate::entry::{Entry, Value};
use crate::error::{ModifyError, ModifyResult};
use crate::schema::{ATTR_DN, SchemaRegistry};

/// A modify request as decoded from the wire: the target DN, the client's
/// modifications, and the optional rename fields.
#[derive(Debug, Clone)]
pub struct ModifyRequest {
    /// DN of the entry to modify
    pub dn: String,
    /// Client-supplied modifications
    pub mods: super::record::ModificationList,
    /// New relative name; present only for rename requests
    pub new_rdn: Option<String>,
    /// Explicit new superior; `None` keeps the current parent
    pub new_superior: Option<String>,
    /// Whether the old RDN value is removed from the entry
    pub delete_old_rdn: bool,
}

impl ModifyRequest {
    /// A plain modify with no rename.
    pub fn modify(dn: impl Into<String>, mods: super::record::ModificationList) -> Self {
        Self {
            dn: dn.into(),
            mods,
            new_rdn: None,
            new_superior: None,
            delete_old_rdn: false,
        }
    }

    /// A rename request, optionally re-parenting under a new superior.
    pub fn rename(
        dn: impl Into<String>,
        new_rdn: impl Into<String>,
        new_superior: Option<String>,
        delete_old_rdn: bool,
    ) -> Self {
        Self {
            dn: dn.into(),
            mods: super::record::ModificationList::new(),
            new_rdn: Some(new_rdn.into()),
            new_superior,
            delete_old_rdn,
        }
    }
}

/// Generate the modifications implied by the request's new relative name.
///
/// Emits a Replace of the DN pseudo-attribute carrying the new normalized
/// DN, then the Add/Delete of RDN attribute values required to keep the
/// entry's naming attribute in step with its DN.
pub fn generate_rename_mods(
    registry: &SchemaRegistry,
    request: &ModifyRequest,
    entry: &Entry,
) -> ModifyResult<Vec<ModificationRecord>> {
    let new_rdn_raw = match request.new_rdn.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return Ok(Vec::new()),
    };

    if dn::contains_unescaped(new_rdn_raw, ',') || dn::contains_unescaped(new_rdn_raw, '+') {
        return Err(ModifyError::unwilling(format!(
            "new RDN '{new_rdn_raw}' contains an unescaped separator; \
             multi-component RDNs are not supported"
        )));
    }

    let new_dn_raw = match request.new_superior.as_deref() {
        Some(superior) => {
            let superior = dn::normalize_dn(registry, superior)?;
            if superior.is_empty() {
                new_rdn_raw.to_string()
            } else {
                format!("{new_rdn_raw},{superior}")
            }
        }
        None => match entry.parent_dn() {
            Some(parent) if !parent.is_root() => {
                format!("{},{}", new_rdn_raw, parent.normalized())
            }
            _ => new_rdn_raw.to_string(),
        },
    };
    let new_dn = Dn::parse(registry, &new_dn_raw)?;

    let new_leading = new_dn.first_rdn()?;
    let old_leading = entry.dn().first_rdn()?;

    let mut records = vec![ModificationRecord::replace(
        ATTR_DN,
        vec![Value::text(new_dn.normalized())],
    )];

    let new_raw_value = raw_rdn_value(new_rdn_raw).unwrap_or(&new_leading.value);
    let old_raw_value = raw_rdn_value(entry.dn().raw()).unwrap_or(&old_leading.value);

    if new_leading.attribute == old_leading.attribute {
        if new_leading.value != old_leading.value {
            records.push(ModificationRecord::add(
                new_leading.attribute.clone(),
                vec![Value::text(new_raw_value)],
            ));
            if request.delete_old_rdn {
                records.push(ModificationRecord::delete(
                    old_leading.attribute.clone(),
                    vec![Value::text(old_raw_value)],
                ));
            }
        }
    } else {
        records.push(ModificationRecord::add(
            new_leading.attribute.clone(),
            vec![Value::text(new_raw_value)],
        ));
        if request.delete_old_rdn {
            // Whole-value delete of the old naming pair, not whole-attribute.
            records.push(ModificationRecord::delete(
                old_leading.attribute.clone(),
                vec![Value::text(old_raw_value)],
            ));
        }
    }

    Ok(records)
}

/// The raw value of the leading RDN of a DN or bare RDN string.
fn raw_rdn_value(s: &str) -> Option<&str> {
    let leading_end = {
        let mut escaped = false;
        let mut end = s.len();
        for (idx, c) in s.char_indices() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == ',' {
                end = idx;
                break;
            }
        }
        end
    };
    s[..leading_end].split_once('=').map(|(_, v)| v.trim())
}
