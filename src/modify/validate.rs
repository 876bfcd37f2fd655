//! Pre-apply validation: the sanity pass and the normalization pass.
//!
//! The sanity pass guards client-originated requests against schema
//! misuse; it is skipped for internally generated and replicated
//! operations. The normalization pass runs for every operation type and
//! canonicalizes all values before the apply engine compares anything.

use super::record::{ModType, ModificationList};
use crate::context::OperationContext;
use crate::error::{ModifyError, ModifyResult};
use crate::schema::{ATTR_PRINCIPAL_NAME, ATTR_SECURITY_DESCRIPTOR, SchemaRegistry};
use std::collections::HashSet;

/// Sanity-check a client-originated modification list.
///
/// Every target attribute must resolve to a schema descriptor; non-user-
/// modifiable attributes are off limits to non-administrators; principal
/// names and security descriptors get syntax validation on Add/Replace,
/// and the security descriptor can never be deleted.
pub fn sanity_check(
    registry: &SchemaRegistry,
    context: &OperationContext,
    mods: &ModificationList,
) -> ModifyResult<()> {
    for record in mods.iter() {
        let descriptor = match &record.descriptor {
            Some(descriptor) => descriptor.clone(),
            None => registry.require(&record.attribute)?,
        };

        if !descriptor.user_modifiable && !context.is_administrator() {
            return Err(ModifyError::constraint(
                &descriptor.name,
                "attribute is not user-modifiable",
            ));
        }

        let writes_values = matches!(record.kind, ModType::Add | ModType::Replace);
        if descriptor.name.eq_ignore_ascii_case(ATTR_PRINCIPAL_NAME) && writes_values {
            for value in &record.values {
                validate_principal_name(value.raw())?;
            }
        }
        if descriptor.name.eq_ignore_ascii_case(ATTR_SECURITY_DESCRIPTOR) {
            if record.kind == ModType::Delete {
                return Err(ModifyError::constraint(
                    &descriptor.name,
                    "the security descriptor cannot be deleted",
                ));
            }
            for value in &record.values {
                validate_security_descriptor(value.raw())?;
            }
        }
    }
    Ok(())
}

/// Resolve descriptors and normalize every value in every record, then
/// reject records that name the same value twice.
///
/// This self-duplicate check is deliberately separate from the apply
/// engine's existing-vs-new check: it sees only the incoming record,
/// before the entry is consulted.
pub fn normalize_mods(registry: &SchemaRegistry, mods: &mut ModificationList) -> ModifyResult<()> {
    for record in mods.iter_mut() {
        let descriptor = record.resolve_descriptor(registry)?;
        let mut seen: HashSet<Vec<u8>> = HashSet::with_capacity(record.values.len());
        for value in &mut record.values {
            let normalized = value.ensure_normalized(registry, &descriptor)?.to_vec();
            if !seen.insert(normalized) {
                return Err(ModifyError::DuplicateValue {
                    attribute: descriptor.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Principal names have the shape `local@realm`, with exactly one `@`
/// and no whitespace or control characters.
fn validate_principal_name(raw: &[u8]) -> ModifyResult<()> {
    let reject = |detail: &str| {
        Err(ModifyError::constraint(
            ATTR_PRINCIPAL_NAME,
            detail.to_string(),
        ))
    };
    let Ok(text) = std::str::from_utf8(raw) else {
        return reject("principal name is not valid UTF-8");
    };
    let mut parts = text.split('@');
    let (local, realm) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(realm), None) => (local, realm),
        _ => return reject("principal name must contain exactly one '@'"),
    };
    if local.is_empty() || realm.is_empty() {
        return reject("principal name has an empty component");
    }
    if text.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return reject("principal name contains whitespace or control characters");
    }
    Ok(())
}

/// Structural validation of a security descriptor, restricted to the
/// owner and group fields. DACL/SACL parts are not interpreted here.
fn validate_security_descriptor(raw: &[u8]) -> ModifyResult<()> {
    let reject = |detail: String| Err(ModifyError::constraint(ATTR_SECURITY_DESCRIPTOR, detail));
    let Ok(text) = std::str::from_utf8(raw) else {
        return reject("security descriptor is not valid UTF-8".to_string());
    };
    let text = text.trim();
    if text.is_empty() {
        return reject("security descriptor is empty".to_string());
    }

    let owner = sddl_section(text, "O:");
    let group = sddl_section(text, "G:");
    if owner.is_none() && group.is_none() {
        return reject("security descriptor names neither owner nor group".to_string());
    }
    for (label, sid) in [("owner", owner), ("group", group)] {
        if let Some(sid) = sid {
            if !is_valid_sid(sid) {
                return reject(format!("security descriptor {label} SID '{sid}' is malformed"));
            }
        }
    }
    Ok(())
}

/// Extract an SDDL section's body: the text between its marker and the
/// next section marker (or end of string).
fn sddl_section<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let end = ["O:", "G:", "D:", "S:"]
        .iter()
        .filter_map(|m| rest.find(m))
        .min()
        .unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// A SID is either the standard `S-1-...` form or a two-letter
/// well-known abbreviation (`BA`, `SY`, `WD`, ...).
fn is_valid_sid(sid: &str) -> bool {
    if let Some(rest) = sid.strip_prefix("S-1-") {
        !rest.is_empty()
            && rest.bytes().all(|b| b.is_ascii_digit() || b == b'-')
            && !rest.ends_with('-')
    } else {
        sid.len() == 2 && sid.bytes().all(|b| b.is_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Actor;
    use crate::entry::Value;
    use crate::modify::record::ModificationRecord;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::with_embedded_attributes().unwrap()
    }

    fn user_context() -> OperationContext {
        OperationContext::new(Actor::User("cn=joe,ou=people,dc=x".into()))
    }

    fn admin_context() -> OperationContext {
        OperationContext::new(Actor::Administrator)
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let mods = ModificationList::from_records(vec![ModificationRecord::add(
            "frobnicator",
            vec![Value::text("x")],
        )]);
        let err = sanity_check(&registry(), &user_context(), &mods).unwrap_err();
        assert!(matches!(err, ModifyError::UndefinedAttributeType { .. }));
    }

    #[test]
    fn test_non_user_modifiable_guard_with_admin_exemption() {
        let mods = ModificationList::from_records(vec![ModificationRecord::replace(
            "memberOf",
            vec![Value::text("cn=g,dc=x")],
        )]);
        let err = sanity_check(&registry(), &user_context(), &mods).unwrap_err();
        assert!(matches!(err, ModifyError::DataConstraintViolation { .. }));
        sanity_check(&registry(), &admin_context(), &mods).unwrap();
    }

    #[test]
    fn test_principal_name_syntax() {
        for (value, ok) in [
            ("alice@example.com", true),
            ("alice", false),
            ("a@b@c", false),
            ("@example.com", false),
            ("alice@", false),
            ("ali ce@example.com", false),
        ] {
            let mods = ModificationList::from_records(vec![ModificationRecord::add(
                "userPrincipalName",
                vec![Value::text(value)],
            )]);
            let result = sanity_check(&registry(), &admin_context(), &mods);
            assert_eq!(result.is_ok(), ok, "principal name '{value}'");
        }
    }

    #[test]
    fn test_security_descriptor_structure() {
        for (value, ok) in [
            ("O:BAG:SY", true),
            ("O:S-1-5-21-1-2-3G:BA", true),
            ("G:SY", true),
            ("D:(A;;GA;;;WD)", false),
            ("O:notasidG:SY", false),
            ("", false),
        ] {
            let mods = ModificationList::from_records(vec![ModificationRecord::replace(
                "nTSecurityDescriptor",
                vec![Value::text(value)],
            )]);
            let result = sanity_check(&registry(), &admin_context(), &mods);
            assert_eq!(result.is_ok(), ok, "security descriptor '{value}'");
        }
    }

    #[test]
    fn test_security_descriptor_delete_always_rejected() {
        let mods =
            ModificationList::from_records(vec![ModificationRecord::delete_all(
                "nTSecurityDescriptor",
            )]);
        let err = sanity_check(&registry(), &admin_context(), &mods).unwrap_err();
        assert!(matches!(err, ModifyError::DataConstraintViolation { .. }));
    }

    #[test]
    fn test_normalization_pass_rejects_self_duplicates() {
        let registry = registry();
        let mut mods = ModificationList::from_records(vec![ModificationRecord::add(
            "mail",
            vec![Value::text("A@x.com"), Value::text("a@X.COM")],
        )]);
        let err = normalize_mods(&registry, &mut mods).unwrap_err();
        assert!(matches!(err, ModifyError::DuplicateValue { .. }));
    }

    #[test]
    fn test_normalization_pass_resolves_and_normalizes() {
        let registry = registry();
        let mut mods = ModificationList::from_records(vec![ModificationRecord::add(
            "mail",
            vec![Value::text("  Alice@X.COM ")],
        )]);
        normalize_mods(&registry, &mut mods).unwrap();
        let record = mods.get(0).unwrap();
        assert!(record.descriptor.is_some());
        assert_eq!(record.values[0].normalized(), Some(&b"alice@x.com"[..]));
    }
}
