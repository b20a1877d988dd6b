//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `person_core` linkage with a fixed sample person.
//! - Keep output deterministic for quick local sanity checks.

use chrono::NaiveDate;
use person_core::{
    AttributeType, ElementTree, PersonAttribute, PersonName, PersonRecord, ToDocument,
};

fn main() {
    println!("person_core version={}", person_core::core_version());

    let mut person = PersonRecord::new();
    person.birth_date = NaiveDate::from_ymd_opt(2000, 3, 1);
    person.add_name(PersonName::new("Sample", "", "Person"));
    person.add_attribute(PersonAttribute::new(
        AttributeType::new(1, "Birthplace"),
        "Kampala",
    ));

    let age = NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|today| person.age_on(today));
    println!("person_core age_on_2024_03_01={age:?}");
    println!(
        "person_core active_attributes={}",
        person.active_attributes().count()
    );

    let mut tree = ElementTree::new();
    match person.export(&mut tree, None) {
        Ok(node) => println!(
            "person_core export={}",
            tree.render(node).unwrap_or_default()
        ),
        Err(err) => eprintln!("person_core export failed: {err}"),
    }
}
