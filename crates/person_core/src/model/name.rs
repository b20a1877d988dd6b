//! Person names and the per-person name collection.
//!
//! # Responsibility
//! - Define the name value record owned by exactly one person.
//! - Provide insertion-ordered, uuid-deduplicated storage with a
//!   deterministic "preferred" rule.
//!
//! # Invariants
//! - No two names in a `NameSet` share a `uuid`.
//! - `owner` is assigned only when a name is actually inserted.
//! - The preferred name is the first inserted one.

use crate::model::meta::{PersonUuid, RecordUuid};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static BLANK_NAME: Lazy<PersonName> = Lazy::new(|| PersonName::with_id(Uuid::nil()));

/// One name a person is known by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    pub uuid: RecordUuid,
    /// Back-reference to the owning person, set by `NameSet::add`.
    pub owner: Option<PersonUuid>,
    pub prefix: String,
    pub given_name: String,
    pub middle_name: String,
    pub family_name: String,
    pub degree: String,
}

impl PersonName {
    /// Creates a transient name with a generated stable ID.
    pub fn new(
        given_name: impl Into<String>,
        middle_name: impl Into<String>,
        family_name: impl Into<String>,
    ) -> Self {
        let mut name = Self::with_id(Uuid::new_v4());
        name.given_name = given_name.into();
        name.middle_name = middle_name.into();
        name.family_name = family_name.into();
        name
    }

    /// Creates an empty name with a caller-provided stable ID.
    pub fn with_id(uuid: RecordUuid) -> Self {
        Self {
            uuid,
            owner: None,
            prefix: String::new(),
            given_name: String::new(),
            middle_name: String::new(),
            family_name: String::new(),
            degree: String::new(),
        }
    }

    /// Shared blank name returned when a person has no names.
    pub fn blank() -> &'static PersonName {
        &BLANK_NAME
    }

    /// Whether every name part is empty.
    pub fn is_blank(&self) -> bool {
        [
            &self.prefix,
            &self.given_name,
            &self.middle_name,
            &self.family_name,
            &self.degree,
        ]
        .iter()
        .all(|part| part.is_empty())
    }
}

/// Insertion-ordered set of names, unique by `uuid`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PersonName>", into = "Vec<PersonName>")]
pub struct NameSet {
    names: Vec<PersonName>,
}

impl NameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `name` to `owner` and inserts it unless a name with the same
    /// uuid is already present. Returns whether it was inserted.
    pub fn add(&mut self, owner: PersonUuid, mut name: PersonName) -> bool {
        if self.contains(name.uuid) {
            return false;
        }
        name.owner = Some(owner);
        self.names.push(name);
        true
    }

    /// Removes the name with `uuid`, if present.
    pub fn remove(&mut self, uuid: RecordUuid) -> Option<PersonName> {
        let position = self.names.iter().position(|name| name.uuid == uuid)?;
        Some(self.names.remove(position))
    }

    /// First inserted name, if any.
    pub fn preferred(&self) -> Option<&PersonName> {
        self.names.first()
    }

    pub fn contains(&self, uuid: RecordUuid) -> bool {
        self.names.iter().any(|name| name.uuid == uuid)
    }

    pub fn get(&self, uuid: RecordUuid) -> Option<&PersonName> {
        self.names.iter().find(|name| name.uuid == uuid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PersonName> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Re-points every name at `owner`.
    pub(crate) fn rebind(&mut self, owner: PersonUuid) {
        for name in &mut self.names {
            name.owner = Some(owner);
        }
    }
}

impl From<Vec<PersonName>> for NameSet {
    /// Keeps the first occurrence of each uuid, owners untouched.
    fn from(value: Vec<PersonName>) -> Self {
        let mut names: Vec<PersonName> = Vec::with_capacity(value.len());
        for name in value {
            if !names.iter().any(|existing| existing.uuid == name.uuid) {
                names.push(name);
            }
        }
        Self { names }
    }
}

impl From<NameSet> for Vec<PersonName> {
    fn from(value: NameSet) -> Self {
        value.names
    }
}

#[cfg(test)]
mod tests {
    use super::{NameSet, PersonName};
    use uuid::Uuid;

    #[test]
    fn get_finds_name_by_uuid() {
        let name = PersonName::new("Ada", "", "Lovelace");
        let id = name.uuid;
        let mut names = NameSet::new();
        names.add(Uuid::new_v4(), name);

        assert_eq!(names.get(id).map(|name| name.family_name.as_str()), Some("Lovelace"));
        assert!(names.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn add_sets_owner_and_rejects_duplicate_uuid() {
        let owner = Uuid::new_v4();
        let name = PersonName::new("Ada", "", "Lovelace");
        let duplicate = name.clone();

        let mut names = NameSet::new();
        assert!(names.add(owner, name));
        assert!(!names.add(owner, duplicate));
        assert_eq!(names.len(), 1);
        assert_eq!(names.preferred().unwrap().owner, Some(owner));
    }

    #[test]
    fn remove_missing_name_is_noop() {
        let mut names = NameSet::new();
        assert!(names.remove(Uuid::new_v4()).is_none());
        assert!(names.is_empty());
    }

    #[test]
    fn blank_name_has_empty_parts() {
        let blank = PersonName::blank();
        assert!(blank.is_blank());
        assert!(blank.uuid.is_nil());
        assert_eq!(blank.owner, None);
    }
}
