//! Postal addresses attached to a person.
//!
//! Same storage rules as names: insertion order, uuid dedup, first inserted
//! is preferred. Unlike names there is no blank fallback; an empty set has
//! no preferred address.

use crate::model::meta::{PersonUuid, RecordUuid};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One postal address of a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonAddress {
    /// Stable record ID; the identity used for dedup and removal.
    pub uuid: RecordUuid,
    /// Owning person's guid, set when the address is attached.
    pub owner: Option<PersonUuid>,
    /// First street line.
    pub address1: String,
    /// Second street line, often empty.
    pub address2: String,
    pub city_village: String,
    pub state_province: String,
    pub postal_code: String,
    pub country: String,
}

impl PersonAddress {
    /// Creates an empty transient address with a generated stable ID.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(uuid: RecordUuid) -> Self {
        Self {
            uuid,
            owner: None,
            address1: String::new(),
            address2: String::new(),
            city_village: String::new(),
            state_province: String::new(),
            postal_code: String::new(),
            country: String::new(),
        }
    }
}

impl Default for PersonAddress {
    fn default() -> Self {
        Self::new()
    }
}

/// Insertion-ordered set of addresses, unique by `uuid`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PersonAddress>", into = "Vec<PersonAddress>")]
pub struct AddressSet {
    addresses: Vec<PersonAddress>,
}

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches and inserts `address` unless its uuid is already present.
    pub fn add(&mut self, owner: PersonUuid, mut address: PersonAddress) -> bool {
        if self.contains(address.uuid) {
            return false;
        }
        address.owner = Some(owner);
        self.addresses.push(address);
        true
    }

    pub fn remove(&mut self, uuid: RecordUuid) -> Option<PersonAddress> {
        let position = self
            .addresses
            .iter()
            .position(|address| address.uuid == uuid)?;
        Some(self.addresses.remove(position))
    }

    /// First inserted address; `None` when empty.
    pub fn preferred(&self) -> Option<&PersonAddress> {
        self.addresses.first()
    }

    pub fn contains(&self, uuid: RecordUuid) -> bool {
        self.addresses.iter().any(|address| address.uuid == uuid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PersonAddress> {
        self.addresses.iter()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub(crate) fn rebind(&mut self, owner: PersonUuid) {
        for address in &mut self.addresses {
            address.owner = Some(owner);
        }
    }
}

impl From<Vec<PersonAddress>> for AddressSet {
    fn from(value: Vec<PersonAddress>) -> Self {
        let mut addresses: Vec<PersonAddress> = Vec::with_capacity(value.len());
        for address in value {
            if !addresses.iter().any(|existing| existing.uuid == address.uuid) {
                addresses.push(address);
            }
        }
        Self { addresses }
    }
}

impl From<AddressSet> for Vec<PersonAddress> {
    fn from(value: AddressSet) -> Self {
        value.addresses
    }
}
