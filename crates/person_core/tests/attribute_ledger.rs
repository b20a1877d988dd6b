use chrono::Utc;
use person_core::{
    AttributeChange, AttributeLedger, AttributeType, AuditInfo, LedgerError, PersonAttribute,
    PersonRecord,
};
use std::collections::BTreeSet;
use uuid::Uuid;

fn birthplace() -> AttributeType {
    AttributeType::new(1, "Birthplace")
}

fn civil_status() -> AttributeType {
    AttributeType::new(2, "Civil Status")
}

fn committed(attribute_type: AttributeType, value: &str) -> PersonAttribute {
    let mut attribute = PersonAttribute::new(attribute_type, value);
    attribute.audit = AuditInfo::created(1, Utc::now());
    attribute
}

fn assert_one_active_per_type(person: &PersonRecord) {
    let mut seen = BTreeSet::new();
    for attribute in person.active_attributes() {
        assert!(
            seen.insert(attribute.attribute_type.type_id),
            "type {} active twice",
            attribute.attribute_type.type_id
        );
    }
}

fn assert_index_matches_scan(person: &PersonRecord) {
    for name in ["Birthplace", "Civil Status", "Unknown"] {
        let scanned = person
            .active_attributes()
            .find(|attribute| attribute.attribute_type.name == name);
        let indexed = person.attribute(name);
        assert_eq!(indexed.map(|a| a.uuid), scanned.map(|a| a.uuid), "type {name}");
    }
}

#[test]
fn any_add_sequence_keeps_one_active_value_per_type() {
    let mut person = PersonRecord::new();
    let values = ["Kampala", "Eldoret", "Kampala", "Moshi", "Eldoret"];

    for (step, value) in values.iter().enumerate() {
        let attribute_type = if step % 2 == 0 {
            birthplace()
        } else {
            civil_status()
        };
        let attribute = if step % 3 == 0 {
            committed(attribute_type, value)
        } else {
            PersonAttribute::new(attribute_type, *value)
        };
        person.add_attribute(attribute);

        assert_one_active_per_type(&person);
        assert_index_matches_scan(&person);
    }
}

#[test]
fn mixed_sequences_with_absent_and_voided_values_keep_one_active_value_per_type() {
    let sequences: [&[(i64, Option<&str>, bool, bool)]; 3] = [
        &[
            (1, None, false, false),
            (1, None, true, false),
            (1, Some("Kampala"), false, true),
            (1, Some("Kampala"), true, false),
        ],
        &[
            (2, Some("Married"), true, false),
            (1, Some("Moshi"), false, false),
            (2, None, false, true),
            (2, Some("Single"), true, false),
            (1, None, true, false),
        ],
        &[
            (1, Some("Eldoret"), false, true),
            (1, Some("Eldoret"), false, false),
            (2, Some("Widowed"), true, true),
            (2, Some("Widowed"), false, false),
            (1, Some("Moshi"), true, false),
        ],
    ];

    for steps in sequences {
        let mut person = PersonRecord::new();
        for &(type_id, value, is_committed, is_voided) in steps {
            let attribute_type = if type_id == 1 {
                birthplace()
            } else {
                civil_status()
            };
            let mut attribute =
                PersonAttribute::with_id(Uuid::new_v4(), attribute_type, value.map(str::to_string));
            if is_committed {
                attribute.audit = AuditInfo::created(1, Utc::now());
            }
            if is_voided {
                attribute.void("entered in error");
            }
            person.add_attribute(attribute);

            assert_one_active_per_type(&person);
            assert_index_matches_scan(&person);
        }
    }
}

#[test]
fn adding_same_record_twice_is_noop() {
    let mut person = PersonRecord::new();
    let attribute = PersonAttribute::new(birthplace(), "Kampala");

    assert_eq!(person.add_attribute(attribute.clone()), AttributeChange::Inserted);
    let before: Vec<_> = person.active_attributes().cloned().collect();

    assert_eq!(person.add_attribute(attribute), AttributeChange::Unchanged);
    let after: Vec<_> = person.active_attributes().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn adding_equal_value_of_same_type_is_noop() {
    let mut person = PersonRecord::new();
    let first = committed(birthplace(), "Kampala");
    let first_id = first.uuid;
    person.add_attribute(first);

    let change = person.add_attribute(PersonAttribute::new(birthplace(), "Kampala"));
    assert_eq!(change, AttributeChange::Unchanged);
    assert_eq!(person.attributes().len(), 1);
    assert_eq!(person.attribute("Birthplace").unwrap().uuid, first_id);
}

#[test]
fn replacing_committed_value_voids_and_keeps_history() {
    let mut person = PersonRecord::new();
    let old = committed(birthplace(), "Kampala");
    let old_id = old.uuid;
    person.add_attribute(old);

    let new = PersonAttribute::new(birthplace(), "Moshi");
    let new_id = new.uuid;
    let change = person.add_attribute(new);

    assert_eq!(
        change,
        AttributeChange::Replaced {
            voided: vec![old_id],
            removed: Vec::new(),
        }
    );
    let old = person.attributes().find(old_id).expect("old value kept");
    assert!(old.is_voided());
    assert_eq!(
        old.voided.as_ref().unwrap().void_reason.as_deref(),
        Some("New value: Moshi")
    );
    assert_eq!(person.attribute("Birthplace").unwrap().uuid, new_id);
    assert_eq!(person.attributes().len(), 2);
}

#[test]
fn replacing_transient_value_removes_it() {
    let mut person = PersonRecord::new();
    let staged = PersonAttribute::new(birthplace(), "Kampala");
    let staged_id = staged.uuid;
    person.add_attribute(staged);

    let change = person.add_attribute(PersonAttribute::new(birthplace(), "Moshi"));

    assert_eq!(
        change,
        AttributeChange::Replaced {
            voided: Vec::new(),
            removed: vec![staged_id],
        }
    );
    assert!(person.attributes().find(staged_id).is_none());
    assert_eq!(person.attributes().len(), 1);
    assert_eq!(
        person.attribute("Birthplace").unwrap().value.as_deref(),
        Some("Moshi")
    );
}

#[test]
fn inserted_attribute_points_at_owner() {
    let mut person = PersonRecord::new();
    let attribute = PersonAttribute::new(birthplace(), "Kampala");
    let id = attribute.uuid;
    person.add_attribute(attribute);

    assert_eq!(person.attributes().find(id).unwrap().owner, Some(person.guid()));
}

#[test]
fn voided_attributes_are_invisible_to_every_lookup() {
    let mut voided_first = committed(birthplace(), "Kampala");
    voided_first.void("entered in error");
    let active = PersonAttribute::new(birthplace(), "Moshi");
    let active_id = active.uuid;
    let mut voided_last = committed(civil_status(), "Married");
    voided_last.void("entered in error");

    let mut person = PersonRecord::new();
    person
        .set_attributes(vec![voided_first, active, voided_last])
        .expect("consistent ledger");

    assert_eq!(person.attribute("Birthplace").unwrap().uuid, active_id);
    assert!(person.attribute("Civil Status").is_none());
    assert_eq!(person.attributes_named("Birthplace").len(), 1);
    assert!(person.attributes_named("Civil Status").is_empty());
    assert_eq!(person.attribute_by_type_id(1).unwrap().uuid, active_id);
    assert!(person.attribute_by_type_id(2).is_none());
    assert!(person.attributes_by_type_id(2).is_empty());

    let map = person.attribute_map();
    assert_eq!(map.len(), 1);
    assert_eq!(map["Birthplace"].uuid, active_id);
}

#[test]
fn index_is_invalidated_by_every_mutation() {
    let mut person = PersonRecord::new();
    let first = PersonAttribute::new(birthplace(), "Kampala");
    let first_id = first.uuid;
    person.add_attribute(first);
    assert_eq!(person.attribute("Birthplace").unwrap().uuid, first_id);

    person.remove_attribute(first_id).expect("removed");
    assert!(person.attribute("Birthplace").is_none());

    let second = committed(birthplace(), "Moshi");
    let second_id = second.uuid;
    person.add_attribute(second);
    assert_eq!(person.attribute("Birthplace").unwrap().uuid, second_id);

    assert!(person.void_attribute(second_id, "entered in error"));
    assert!(person.attribute("Birthplace").is_none());

    let third = PersonAttribute::new(civil_status(), "Single");
    let third_id = third.uuid;
    person.set_attributes(vec![third]).expect("consistent ledger");
    assert!(person.attribute("Birthplace").is_none());
    assert_eq!(person.attribute("Civil Status").unwrap().uuid, third_id);
}

#[test]
fn remove_attribute_is_hard_removal_and_noop_when_missing() {
    let mut person = PersonRecord::new();
    let attribute = committed(birthplace(), "Kampala");
    let id = attribute.uuid;
    person.add_attribute(attribute);

    let removed = person.remove_attribute(id).expect("present");
    assert!(!removed.is_voided());
    assert!(person.attributes().is_empty());
    assert!(person.remove_attribute(id).is_none());
}

#[test]
fn checked_constructor_rejects_two_active_values_of_one_type() {
    let first = PersonAttribute::new(birthplace(), "Kampala");
    let second = PersonAttribute::new(birthplace(), "Moshi");
    let (first_id, second_id) = (first.uuid, second.uuid);

    let err = AttributeLedger::try_from_records(vec![first, second]).unwrap_err();
    assert_eq!(
        err,
        LedgerError::DuplicateActiveType {
            type_id: 1,
            first: first_id,
            second: second_id,
        }
    );
}

#[test]
fn unchecked_ledger_resolves_duplicates_to_first_inserted() {
    let first = PersonAttribute::new(birthplace(), "Kampala");
    let second = PersonAttribute::new(birthplace(), "Moshi");
    let first_id = first.uuid;

    let ledger = AttributeLedger::from_records_unchecked(vec![first, second]);
    assert!(ledger.check_invariant().is_err());
    assert_eq!(ledger.get("Birthplace").unwrap().uuid, first_id);
    assert_eq!(ledger.get_by_type_id(1).unwrap().uuid, first_id);
    assert_eq!(ledger.get_all("Birthplace").len(), 2);
    assert_eq!(ledger.attribute_map()["Birthplace"].uuid, first_id);
}

#[test]
fn adding_to_inconsistent_ledger_supersedes_every_active_duplicate() {
    let owner = Uuid::new_v4();
    let committed_dup = committed(birthplace(), "Kampala");
    let staged_dup = PersonAttribute::new(birthplace(), "Eldoret");
    let (committed_id, staged_id) = (committed_dup.uuid, staged_dup.uuid);
    let mut ledger = AttributeLedger::from_records_unchecked(vec![committed_dup, staged_dup]);

    let change = ledger.add(owner, PersonAttribute::new(birthplace(), "Moshi"));

    assert_eq!(
        change,
        AttributeChange::Replaced {
            voided: vec![committed_id],
            removed: vec![staged_id],
        }
    );
    assert!(ledger.check_invariant().is_ok());
    assert_eq!(ledger.active().count(), 1);
}

#[test]
fn deserialization_enforces_reconciliation_invariant() {
    let first = PersonAttribute::new(birthplace(), "Kampala");
    let second = PersonAttribute::new(birthplace(), "Moshi");
    let json = serde_json::to_value(vec![first, second]).unwrap();

    let err = serde_json::from_value::<AttributeLedger>(json).unwrap_err();
    assert!(
        err.to_string().contains("are both active for attribute type 1"),
        "unexpected error: {err}"
    );
}
