//! The modify-apply engine.
//!
//! Applies an ordered modification list to an in-memory entry in a single
//! left-to-right cursor pass. The pass is re-entrant per record: when a
//! record's kind is rewritten (the RFC 4511 Replace expansion), the same
//! record is reprocessed without advancing the cursor until it resolves
//! into a terminal Add or Delete.
//!
//! Any failure aborts the whole pass. The entry is not reused after a
//! failed apply; the transactional controller re-reads a fresh copy on
//! retry.

use super::record::{ModType, ModificationList, ModificationRecord};
use crate::dn::Dn;
use crate::entry::{AttributeValueSet, Entry, MAX_VALUES_PER_ATTRIBUTE, Value};
use crate::error::{ModifyError, ModifyResult};
use crate::schema::{ATTR_DN, SchemaRegistry};

/// Apply every record in `mods` to `entry`, mutating both in place.
///
/// Returns whether a rename (a replace of the DN pseudo-attribute) was
/// processed, so the caller can run the structural rename guards.
pub fn apply(
    registry: &SchemaRegistry,
    mods: &mut ModificationList,
    entry: &mut Entry,
) -> ModifyResult<bool> {
    let mut renamed = false;
    let mut cursor = 0;
    while cursor < mods.records.len() {
        match mods.records[cursor].kind {
            ModType::Replace => {
                // Rewrites the record in place; the cursor stays put so the
                // same position is reprocessed on the next iteration.
                rewrite_replace(registry, mods, cursor, entry, &mut renamed)?;
            }
            ModType::Add => {
                apply_add(registry, &mut mods.records[cursor], entry)?;
                cursor += 1;
            }
            ModType::Delete => {
                apply_delete(registry, &mut mods.records[cursor], entry)?;
                cursor += 1;
            }
        }
    }
    Ok(renamed)
}

/// Resolve a Replace record into Delete and/or Add per RFC 4511 §4.6.
///
/// - no values: replace-with-nothing means delete-if-present, so the
///   record becomes a whole-attribute Delete (which is a no-op when the
///   attribute is absent).
/// - attribute absent: replace-of-nonexistent creates it; the record
///   becomes an Add.
/// - attribute present: the record becomes an Add and a valueless Delete
///   for the same attribute is spliced immediately before it, so the
///   Delete executes first on the next pass.
fn rewrite_replace(
    registry: &SchemaRegistry,
    mods: &mut ModificationList,
    cursor: usize,
    entry: &mut Entry,
    renamed: &mut bool,
) -> ModifyResult<()> {
    let (attribute, has_values, descriptor) = {
        let record = &mods.records[cursor];
        (
            record.attribute.clone(),
            !record.values.is_empty(),
            record.descriptor.clone(),
        )
    };

    if !has_values {
        mods.records[cursor].kind = ModType::Delete;
        return Ok(());
    }

    if attribute.eq_ignore_ascii_case(ATTR_DN) {
        process_dn_replace(registry, &mods.records[cursor], entry)?;
        *renamed = true;
    }

    if entry.get(&attribute).is_none() {
        mods.records[cursor].kind = ModType::Add;
        return Ok(());
    }

    mods.records[cursor].kind = ModType::Add;
    let mut delete = ModificationRecord::delete_all(attribute);
    delete.descriptor = descriptor;
    mods.records.insert(cursor, delete);
    Ok(())
}

/// Handle a genuine replace of the DN pseudo-attribute: move the entry's
/// DN and, when the new superior differs from the current one, stash the
/// pending re-parent so the caller knows structural re-parenting is
/// required rather than a plain attribute change.
fn process_dn_replace(
    registry: &SchemaRegistry,
    record: &ModificationRecord,
    entry: &mut Entry,
) -> ModifyResult<()> {
    if record.values.len() != 1 {
        return Err(ModifyError::constraint(
            ATTR_DN,
            "a DN replace must carry exactly one value",
        ));
    }
    let text = std::str::from_utf8(record.values[0].raw()).map_err(|_| {
        ModifyError::InvalidDnSyntax {
            dn: record.values[0].display().into_owned(),
            detail: "DN value is not valid UTF-8".to_string(),
        }
    })?;
    let new_dn = Dn::parse(registry, text)?;
    let new_parent = new_dn.parent();
    let current_parent = entry.parent_dn();
    if new_parent != current_parent {
        if let Some(parent) = new_parent {
            entry.set_pending_new_parent(parent);
        }
    }
    entry.set_dn(new_dn);
    Ok(())
}

fn apply_add(
    registry: &SchemaRegistry,
    record: &mut ModificationRecord,
    entry: &mut Entry,
) -> ModifyResult<()> {
    let descriptor = record.resolve_descriptor(registry)?;
    for value in &mut record.values {
        value.ensure_normalized(registry, &descriptor)?;
    }

    match entry.get_mut(&record.attribute) {
        None => {
            check_cardinality(&descriptor.name, descriptor.single_valued, record.values.len())?;
            entry.insert_set(AttributeValueSet::with_values(
                descriptor,
                record.values.clone(),
            ));
        }
        Some(set) => {
            for value in set.values_mut() {
                value.ensure_normalized(registry, &descriptor)?;
            }
            for value in &record.values {
                if set.contains_normalized(normalized_bytes(value)?) {
                    return Err(ModifyError::ValueAlreadyExists {
                        attribute: set.name().to_string(),
                        value: value.display().into_owned(),
                    });
                }
            }
            check_cardinality(
                set.name(),
                set.is_single_valued(),
                set.len() + record.values.len(),
            )?;
            for value in record.values.iter().cloned() {
                set.push(value);
            }
        }
    }
    Ok(())
}

fn apply_delete(
    registry: &SchemaRegistry,
    record: &mut ModificationRecord,
    entry: &mut Entry,
) -> ModifyResult<()> {
    let descriptor = record.resolve_descriptor(registry)?;
    let attribute = record.attribute.clone();

    if entry.get(&attribute).is_none() {
        if record.values.is_empty() {
            // Idempotent whole-attribute delete on absence.
            record.ignored = true;
            return Ok(());
        }
        return Err(ModifyError::no_such_attribute(
            &attribute,
            "the attribute does not exist on the entry",
        ));
    }

    for value in &mut record.values {
        value.ensure_normalized(registry, &descriptor)?;
    }
    if let Some(set) = entry.get_mut(&attribute) {
        for value in set.values_mut() {
            value.ensure_normalized(registry, &descriptor)?;
        }
    }

    if record.values.is_empty() {
        return unlink_whole_attribute(record, entry, &attribute);
    }

    // Every named value must exist, compared by normalized form. The
    // exception is the system-maintained metadata attributes: a replica
    // may have locally diverged those, so a mismatched single value is
    // downgraded to a whole-attribute delete instead of erroring.
    let mut indices = Vec::with_capacity(record.values.len());
    let mut force_delete_all = false;
    if let Some(set) = entry.get(&attribute) {
        for value in &record.values {
            let position = set.position_normalized(normalized_bytes(value)?);
            match position {
                Some(index) if !indices.contains(&index) => indices.push(index),
                _ => {
                    if descriptor.system.is_some() && record.values.len() == 1 {
                        force_delete_all = true;
                        break;
                    }
                    return Err(ModifyError::no_such_attribute(
                        &attribute,
                        format!("no value '{}' to delete", value.display()),
                    ));
                }
            }
        }
    }

    if force_delete_all {
        return unlink_whole_attribute(record, entry, &attribute);
    }

    let current_len = entry.get(&attribute).map(|s| s.len()).unwrap_or(0);
    if indices.len() == current_len {
        entry.remove(&attribute);
    } else if let Some(set) = entry.get_mut(&attribute) {
        set.remove_indices(&indices);
    }
    Ok(())
}

/// Unlink the whole attribute, preserving what was actually removed on
/// the record for downstream index and replication maintenance.
fn unlink_whole_attribute(
    record: &mut ModificationRecord,
    entry: &mut Entry,
    attribute: &str,
) -> ModifyResult<()> {
    if let Some(mut set) = entry.remove(attribute) {
        record.values = set.take_values();
    }
    Ok(())
}

fn check_cardinality(attribute: &str, single_valued: bool, count: usize) -> ModifyResult<()> {
    if single_valued && count > 1 {
        return Err(ModifyError::SingleValueViolation {
            attribute: attribute.to_string(),
        });
    }
    if count > MAX_VALUES_PER_ATTRIBUTE {
        return Err(ModifyError::TooManyValues {
            attribute: attribute.to_string(),
            count,
            max: MAX_VALUES_PER_ATTRIBUTE,
        });
    }
    Ok(())
}

fn normalized_bytes(value: &Value) -> ModifyResult<&[u8]> {
    value
        .normalized()
        .ok_or_else(|| ModifyError::internal("value compared before normalization"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn schema() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::with_embedded_attributes().unwrap())
    }

    fn entry_with(attrs: &[(&str, &[&str])]) -> Entry {
        let schema = schema();
        let dn = Dn::parse(&schema, "cn=Alice,ou=People,dc=x").unwrap();
        let mut entry = Entry::new(dn, schema);
        for (name, values) in attrs {
            entry.set_text_values(name, values).unwrap();
        }
        entry
    }

    fn values(texts: &[&str]) -> Vec<Value> {
        texts.iter().map(|t| Value::text(t)).collect()
    }

    fn attr_values(entry: &Entry, name: &str) -> Vec<String> {
        entry
            .get(name)
            .map(|set| {
                set.values()
                    .iter()
                    .map(|v| v.display().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_add_creates_absent_attribute() {
        let mut entry = entry_with(&[]);
        let mut mods = ModificationList::from_records(vec![ModificationRecord::add(
            "mail",
            values(&["a@x.com"]),
        )]);
        let renamed = apply(&schema(), &mut mods, &mut entry).unwrap();
        assert!(!renamed);
        assert_eq!(attr_values(&entry, "mail"), vec!["a@x.com"]);
        assert!(entry.get("mail").unwrap().descriptor().name == "mail");
    }

    #[test]
    fn test_add_existing_value_fails() {
        let mut entry = entry_with(&[("mail", &["A@x.com"])]);
        let mut mods = ModificationList::from_records(vec![ModificationRecord::add(
            "mail",
            values(&["a@X.COM"]),
        )]);
        let err = apply(&schema(), &mut mods, &mut entry).unwrap_err();
        assert!(matches!(err, ModifyError::ValueAlreadyExists { .. }));
    }

    #[test]
    fn test_add_appends_preserving_order() {
        let mut entry = entry_with(&[("mail", &["a@x.com"])]);
        let mut mods = ModificationList::from_records(vec![ModificationRecord::add(
            "mail",
            values(&["b@x.com", "c@x.com"]),
        )]);
        apply(&schema(), &mut mods, &mut entry).unwrap();
        assert_eq!(
            attr_values(&entry, "mail"),
            vec!["a@x.com", "b@x.com", "c@x.com"]
        );
    }

    #[test]
    fn test_add_to_single_valued_attribute_fails() {
        let mut entry = entry_with(&[("displayName", &["Alice"])]);
        let mut mods = ModificationList::from_records(vec![ModificationRecord::add(
            "displayName",
            values(&["Alicia"]),
        )]);
        let err = apply(&schema(), &mut mods, &mut entry).unwrap_err();
        assert!(matches!(err, ModifyError::SingleValueViolation { .. }));
    }

    #[test]
    fn test_whole_delete_of_absent_attribute_is_ignored() {
        let mut entry = entry_with(&[]);
        let mut mods =
            ModificationList::from_records(vec![ModificationRecord::delete_all("mail")]);
        apply(&schema(), &mut mods, &mut entry).unwrap();
        assert!(mods.get(0).unwrap().ignored);
    }

    #[test]
    fn test_valued_delete_of_absent_attribute_fails() {
        let mut entry = entry_with(&[]);
        let mut mods = ModificationList::from_records(vec![ModificationRecord::delete(
            "mail",
            values(&["a@x.com"]),
        )]);
        let err = apply(&schema(), &mut mods, &mut entry).unwrap_err();
        assert!(matches!(err, ModifyError::NoSuchAttribute { .. }));
    }

    #[test]
    fn test_whole_delete_captures_removed_values() {
        let mut entry = entry_with(&[("member", &["cn=u1,dc=x", "cn=u2,dc=x"])]);
        let mut mods =
            ModificationList::from_records(vec![ModificationRecord::delete_all("member")]);
        apply(&schema(), &mut mods, &mut entry).unwrap();
        assert!(entry.get("member").is_none());
        let record = mods.get(0).unwrap();
        assert_eq!(record.values.len(), 2);
        assert_eq!(record.values[0].raw(), b"cn=u1,dc=x");
    }

    #[test]
    fn test_named_delete_compacts_remaining_values() {
        let mut entry = entry_with(&[("mail", &["a@x.com", "b@x.com", "c@x.com"])]);
        let mut mods = ModificationList::from_records(vec![ModificationRecord::delete(
            "mail",
            values(&["b@x.com"]),
        )]);
        apply(&schema(), &mut mods, &mut entry).unwrap();
        assert_eq!(attr_values(&entry, "mail"), vec!["a@x.com", "c@x.com"]);
    }

    #[test]
    fn test_named_delete_of_all_values_unlinks_attribute() {
        let mut entry = entry_with(&[("mail", &["a@x.com", "b@x.com"])]);
        let mut mods = ModificationList::from_records(vec![ModificationRecord::delete(
            "mail",
            values(&["b@x.com", "a@x.com"]),
        )]);
        apply(&schema(), &mut mods, &mut entry).unwrap();
        assert!(entry.get("mail").is_none());
    }

    #[test]
    fn test_named_delete_of_missing_value_fails() {
        let mut entry = entry_with(&[("mail", &["a@x.com"])]);
        let mut mods = ModificationList::from_records(vec![ModificationRecord::delete(
            "mail",
            values(&["b@x.com"]),
        )]);
        let err = apply(&schema(), &mut mods, &mut entry).unwrap_err();
        assert!(matches!(err, ModifyError::NoSuchAttribute { .. }));
    }

    #[test]
    fn test_system_attribute_mismatch_forces_delete_all() {
        let mut entry = entry_with(&[("modifyTimestamp", &["20240101120000Z"])]);
        let mut mods = ModificationList::from_records(vec![ModificationRecord::delete(
            "modifyTimestamp",
            values(&["20230505050505Z"]),
        )]);
        apply(&schema(), &mut mods, &mut entry).unwrap();
        assert!(entry.get("modifyTimestamp").is_none());
        // The record carries what was actually removed, not what was named.
        let record = mods.get(0).unwrap();
        assert_eq!(record.values.len(), 1);
        assert_eq!(record.values[0].raw(), b"20240101120000Z");
    }

    #[test]
    fn test_replace_with_no_values_deletes_if_present() {
        let mut entry = entry_with(&[("mail", &["a@x.com"])]);
        let mut mods =
            ModificationList::from_records(vec![ModificationRecord::replace("mail", vec![])]);
        apply(&schema(), &mut mods, &mut entry).unwrap();
        assert!(entry.get("mail").is_none());
        // Absent case is not an error.
        let mut mods =
            ModificationList::from_records(vec![ModificationRecord::replace("mail", vec![])]);
        apply(&schema(), &mut mods, &mut entry).unwrap();
        assert!(mods.get(0).unwrap().ignored);
    }

    #[test]
    fn test_replace_of_absent_attribute_creates_it() {
        let mut entry = entry_with(&[]);
        let mut mods = ModificationList::from_records(vec![ModificationRecord::replace(
            "mail",
            values(&["b@x.com"]),
        )]);
        apply(&schema(), &mut mods, &mut entry).unwrap();
        assert_eq!(attr_values(&entry, "mail"), vec!["b@x.com"]);
    }

    #[test]
    fn test_replace_splices_delete_before_add() {
        let mut entry = entry_with(&[("mail", &["a@x.com"])]);
        let mut mods = ModificationList::from_records(vec![ModificationRecord::replace(
            "mail",
            values(&["b@x.com"]),
        )]);
        apply(&schema(), &mut mods, &mut entry).unwrap();
        assert_eq!(attr_values(&entry, "mail"), vec!["b@x.com"]);
        // The list now shows the expansion: Delete(mail) then Add(mail).
        assert_eq!(mods.len(), 2);
        assert_eq!(mods.get(0).unwrap().kind, ModType::Delete);
        assert_eq!(mods.get(0).unwrap().values[0].raw(), b"a@x.com");
        assert_eq!(mods.get(1).unwrap().kind, ModType::Add);
    }

    #[test]
    fn test_replace_is_idempotent() {
        let mut entry = entry_with(&[("mail", &["a@x.com"])]);
        for _ in 0..2 {
            let mut mods = ModificationList::from_records(vec![ModificationRecord::replace(
                "mail",
                values(&["b@x.com", "c@x.com"]),
            )]);
            apply(&schema(), &mut mods, &mut entry).unwrap();
        }
        assert_eq!(attr_values(&entry, "mail"), vec!["b@x.com", "c@x.com"]);
    }

    #[test]
    fn test_dn_replace_flags_rename_and_reparent() {
        let mut entry = entry_with(&[]);
        entry
            .set_text_values("distinguishedName", &["cn=Alice,ou=People,dc=x"])
            .unwrap();
        let mut mods = ModificationList::from_records(vec![ModificationRecord::replace(
            "distinguishedName",
            values(&["cn=Alice,ou=Admins,dc=x"]),
        )]);
        let renamed = apply(&schema(), &mut mods, &mut entry).unwrap();
        assert!(renamed);
        assert_eq!(entry.dn().normalized(), "cn=alice,ou=admins,dc=x");
        assert_eq!(
            entry.pending_new_parent().unwrap().normalized(),
            "ou=admins,dc=x"
        );
    }

    #[test]
    fn test_dn_replace_same_parent_has_no_pending_reparent() {
        let mut entry = entry_with(&[]);
        entry
            .set_text_values("distinguishedName", &["cn=Alice,ou=People,dc=x"])
            .unwrap();
        let mut mods = ModificationList::from_records(vec![ModificationRecord::replace(
            "distinguishedName",
            values(&["cn=Bob,ou=People,dc=x"]),
        )]);
        let renamed = apply(&schema(), &mut mods, &mut entry).unwrap();
        assert!(renamed);
        assert!(entry.pending_new_parent().is_none());
        assert_eq!(entry.dn().normalized(), "cn=bob,ou=people,dc=x");
    }

    #[test]
    fn test_cardinality_bound() {
        let schema = schema();
        let mut entry = entry_with(&[]);
        let descriptor = schema.resolve("mail").unwrap();
        let mut set = AttributeValueSet::new(Arc::clone(&descriptor));
        for i in 0..MAX_VALUES_PER_ATTRIBUTE - 1 {
            let mut value = Value::text(&format!("u{i}@x.com"));
            value.set_normalized(format!("u{i}@x.com").into_bytes());
            set.push(value);
        }
        entry.insert_set(set);

        // Reaching exactly the bound succeeds.
        let mut mods = ModificationList::from_records(vec![ModificationRecord::add(
            "mail",
            values(&["last@x.com"]),
        )]);
        apply(&schema, &mut mods, &mut entry).unwrap();
        assert_eq!(entry.get("mail").unwrap().len(), MAX_VALUES_PER_ATTRIBUTE);

        // One more fails.
        let mut mods = ModificationList::from_records(vec![ModificationRecord::add(
            "mail",
            values(&["overflow@x.com"]),
        )]);
        let err = apply(&schema, &mut mods, &mut entry).unwrap_err();
        assert!(matches!(err, ModifyError::TooManyValues { .. }));
    }
}
