//! Person aggregate root.
//!
//! # Responsibility
//! - Own the name, address and attribute collections of one person.
//! - Expose collection operations that attach child records atomically.
//! - Derive read-side values: preferred name/address, age, vital status.
//!
//! # Invariants
//! - `guid` is never nil; every child record's `owner` equals it.
//! - A voided person carries `VoidInfo`; an active one carries none.
//! - `death_date` and `cause_of_death` are cleared by `mark_alive`.
//! - Cloning is a deep copy; clones never share collections.
//!
//! # See also
//! - `model::attribute` for the reconciliation rules.

use crate::model::address::{AddressSet, PersonAddress};
use crate::model::attribute::{AttributeChange, AttributeLedger, LedgerError, PersonAttribute};
use crate::model::meta::{
    AttributeTypeId, AuditInfo, ConceptId, PersonId, PersonUuid, RecordUuid, UserId, VoidInfo,
};
use crate::model::name::{NameSet, PersonName};
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Validation errors for person records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonValidationError {
    /// The stable guid must not be nil.
    NilGuid,
    /// Death details are set while the person is not marked dead.
    InvalidDeathState,
    /// A child record points at another person.
    ForeignChild(RecordUuid),
    /// The attribute ledger violates its invariant.
    Ledger(LedgerError),
}

impl Display for PersonValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilGuid => write!(f, "person guid must not be nil"),
            Self::InvalidDeathState => {
                write!(f, "death_date/cause_of_death require dead = true")
            }
            Self::ForeignChild(uuid) => {
                write!(f, "child record {uuid} is owned by another person")
            }
            Self::Ledger(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PersonValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ledger(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LedgerError> for PersonValidationError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

/// One real-world person and the collections attached to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PersonRecordWire")]
pub struct PersonRecord {
    /// Present once the storage collaborator has persisted the person.
    pub person_id: Option<PersonId>,
    /// Stable global ID; never nil.
    guid: PersonUuid,
    /// Free-form gender code.
    pub gender: Option<String>,
    /// Calendar date of birth, if known.
    pub birth_date: Option<NaiveDate>,
    /// `true` when `birth_date` is an approximation.
    pub birth_date_estimated: bool,
    /// Vital status flag; death details require it.
    dead: bool,
    death_date: Option<NaiveDate>,
    /// Coded cause of death.
    cause_of_death: Option<ConceptId>,
    /// Names in insertion order; the first is preferred.
    names: NameSet,
    /// Addresses in insertion order; the first is preferred.
    addresses: AddressSet,
    /// Attribute history with at most one active value per type.
    attributes: AttributeLedger,
    /// Creation and last-change metadata.
    pub audit: AuditInfo,
    /// Soft-delete marker; `None` for an active person.
    voided: Option<VoidInfo>,
}

/// Deserialization shape; converted through `PersonRecord::validate`.
#[derive(Deserialize)]
struct PersonRecordWire {
    person_id: Option<PersonId>,
    guid: PersonUuid,
    gender: Option<String>,
    birth_date: Option<NaiveDate>,
    #[serde(default)]
    birth_date_estimated: bool,
    #[serde(default)]
    dead: bool,
    death_date: Option<NaiveDate>,
    cause_of_death: Option<ConceptId>,
    #[serde(default)]
    names: NameSet,
    #[serde(default)]
    addresses: AddressSet,
    #[serde(default)]
    attributes: AttributeLedger,
    #[serde(default)]
    audit: AuditInfo,
    voided: Option<VoidInfo>,
}

impl TryFrom<PersonRecordWire> for PersonRecord {
    type Error = PersonValidationError;

    fn try_from(value: PersonRecordWire) -> Result<Self, Self::Error> {
        let mut person = Self {
            person_id: value.person_id,
            guid: value.guid,
            gender: value.gender,
            birth_date: value.birth_date,
            birth_date_estimated: value.birth_date_estimated,
            dead: value.dead,
            death_date: value.death_date,
            cause_of_death: value.cause_of_death,
            names: value.names,
            addresses: value.addresses,
            attributes: value.attributes,
            audit: value.audit,
            voided: value.voided,
        };
        person.validate()?;
        // Children stored without an owner are attached on load.
        person.names.rebind(person.guid);
        person.addresses.rebind(person.guid);
        person.attributes.rebind(person.guid);
        Ok(person)
    }
}

impl PersonRecord {
    /// Creates a transient person with a generated guid and empty collections.
    pub fn new() -> Self {
        Self::blank(Uuid::new_v4())
    }

    /// Creates a transient person with a caller-provided guid.
    ///
    /// Used by import/sync paths where identity already exists externally.
    pub fn with_guid(guid: PersonUuid) -> Result<Self, PersonValidationError> {
        if guid.is_nil() {
            return Err(PersonValidationError::NilGuid);
        }
        Ok(Self::blank(guid))
    }

    fn blank(guid: PersonUuid) -> Self {
        Self {
            person_id: None,
            guid,
            gender: None,
            birth_date: None,
            birth_date_estimated: false,
            dead: false,
            death_date: None,
            cause_of_death: None,
            names: NameSet::new(),
            addresses: AddressSet::new(),
            attributes: AttributeLedger::new(),
            audit: AuditInfo::default(),
            voided: None,
        }
    }

    /// Checks record-level invariants.
    ///
    /// # Errors
    /// - `NilGuid` for a nil guid.
    /// - `InvalidDeathState` when death details exist on a living person.
    /// - `ForeignChild` when a child's owner is set to another guid.
    /// - `Ledger` when the attribute ledger is inconsistent.
    pub fn validate(&self) -> Result<(), PersonValidationError> {
        if self.guid.is_nil() {
            return Err(PersonValidationError::NilGuid);
        }
        if !self.dead && (self.death_date.is_some() || self.cause_of_death.is_some()) {
            return Err(PersonValidationError::InvalidDeathState);
        }

        let owners = self
            .names
            .iter()
            .map(|name| (name.uuid, name.owner))
            .chain(self.addresses.iter().map(|address| (address.uuid, address.owner)))
            .chain(self.attributes.iter().map(|record| (record.uuid, record.owner)));
        for (uuid, owner) in owners {
            if owner.is_some_and(|owner| owner != self.guid) {
                return Err(PersonValidationError::ForeignChild(uuid));
            }
        }

        self.attributes.check_invariant()?;
        Ok(())
    }

    pub fn guid(&self) -> PersonUuid {
        self.guid
    }

    /// Assigns a new guid and re-points every child record at it.
    pub fn set_guid(&mut self, guid: PersonUuid) -> Result<(), PersonValidationError> {
        if guid.is_nil() {
            return Err(PersonValidationError::NilGuid);
        }
        self.guid = guid;
        self.names.rebind(guid);
        self.addresses.rebind(guid);
        self.attributes.rebind(guid);
        Ok(())
    }

    // Vital status

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Alias of `is_dead`.
    pub fn dead(&self) -> bool {
        self.is_dead()
    }

    pub fn death_date(&self) -> Option<NaiveDate> {
        self.death_date
    }

    pub fn cause_of_death(&self) -> Option<ConceptId> {
        self.cause_of_death
    }

    /// Marks the person dead with optional date and coded cause.
    pub fn mark_dead(&mut self, death_date: Option<NaiveDate>, cause: Option<ConceptId>) {
        self.dead = true;
        self.death_date = death_date;
        self.cause_of_death = cause;
    }

    /// Marks the person alive and clears death details.
    pub fn mark_alive(&mut self) {
        self.dead = false;
        self.death_date = None;
        self.cause_of_death = None;
    }

    /// Whole years elapsed from birth to the local current date.
    pub fn age(&self) -> Option<i32> {
        self.age_on(Local::now().date_naive())
    }

    /// Whole years elapsed from birth to `today`.
    ///
    /// A birthday not yet reached in `today`'s year subtracts one. Future
    /// birth dates yield zero or negative ages. A Feb 29 birthday counts as
    /// reached on Mar 1 in non-leap years.
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        let birth_date = self.birth_date?;
        let mut age = today.year() - birth_date.year();
        if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
            age -= 1;
        }
        Some(age)
    }

    // Soft delete

    pub fn is_voided(&self) -> bool {
        self.voided.is_some()
    }

    pub fn void_info(&self) -> Option<&VoidInfo> {
        self.voided.as_ref()
    }

    /// Voids the person. Existing void metadata is replaced.
    pub fn void(
        &mut self,
        reason: impl Into<String>,
        voided_by: Option<UserId>,
        date_voided: Option<DateTime<Utc>>,
    ) {
        self.voided = Some(VoidInfo {
            voided_by,
            date_voided,
            void_reason: Some(reason.into()),
        });
    }

    /// Restores a voided person; clears actor, timestamp and reason together.
    pub fn unvoid(&mut self) {
        self.voided = None;
    }

    // Names

    pub fn names(&self) -> &NameSet {
        &self.names
    }

    /// Attaches and inserts `name` unless its uuid is already present.
    pub fn add_name(&mut self, name: PersonName) -> bool {
        self.names.add(self.guid, name)
    }

    pub fn remove_name(&mut self, uuid: RecordUuid) -> Option<PersonName> {
        self.names.remove(uuid)
    }

    /// Replaces all names; duplicates by uuid keep the first occurrence.
    pub fn set_names(&mut self, names: Vec<PersonName>) {
        self.names = NameSet::from(names);
        self.names.rebind(self.guid);
    }

    /// The preferred (first inserted) name, or a shared blank name.
    pub fn preferred_name(&self) -> &PersonName {
        self.names.preferred().unwrap_or(PersonName::blank())
    }

    pub fn given_name(&self) -> &str {
        &self.preferred_name().given_name
    }

    pub fn middle_name(&self) -> &str {
        &self.preferred_name().middle_name
    }

    pub fn family_name(&self) -> &str {
        &self.preferred_name().family_name
    }

    // Addresses

    pub fn addresses(&self) -> &AddressSet {
        &self.addresses
    }

    pub fn add_address(&mut self, address: PersonAddress) -> bool {
        self.addresses.add(self.guid, address)
    }

    pub fn remove_address(&mut self, uuid: RecordUuid) -> Option<PersonAddress> {
        self.addresses.remove(uuid)
    }

    pub fn set_addresses(&mut self, addresses: Vec<PersonAddress>) {
        self.addresses = AddressSet::from(addresses);
        self.addresses.rebind(self.guid);
    }

    /// The preferred (first inserted) address; `None` when there is none.
    pub fn preferred_address(&self) -> Option<&PersonAddress> {
        self.addresses.preferred()
    }

    // Attributes

    pub fn attributes(&self) -> &AttributeLedger {
        &self.attributes
    }

    /// Reconciles `attribute` into this person's ledger.
    ///
    /// See `AttributeLedger::add` for the contract.
    pub fn add_attribute(&mut self, attribute: PersonAttribute) -> AttributeChange {
        self.attributes.add(self.guid, attribute)
    }

    /// Physically removes an attribute without voiding it.
    pub fn remove_attribute(&mut self, uuid: RecordUuid) -> Option<PersonAttribute> {
        self.attributes.remove(uuid)
    }

    /// Voids an active attribute, keeping it as history.
    pub fn void_attribute(&mut self, uuid: RecordUuid, reason: impl Into<String>) -> bool {
        self.attributes.void(uuid, reason)
    }

    /// Replaces all attributes after checking the ledger invariant.
    pub fn set_attributes(
        &mut self,
        attributes: Vec<PersonAttribute>,
    ) -> Result<(), PersonValidationError> {
        let mut ledger = AttributeLedger::try_from_records(attributes)?;
        ledger.rebind(self.guid);
        self.attributes = ledger;
        Ok(())
    }

    pub fn active_attributes(&self) -> impl Iterator<Item = &PersonAttribute> {
        self.attributes.active()
    }

    pub fn attribute(&self, type_name: &str) -> Option<&PersonAttribute> {
        self.attributes.get(type_name)
    }

    pub fn attribute_by_type_id(&self, type_id: AttributeTypeId) -> Option<&PersonAttribute> {
        self.attributes.get_by_type_id(type_id)
    }

    pub fn attributes_named(&self, type_name: &str) -> Vec<&PersonAttribute> {
        self.attributes.get_all(type_name)
    }

    pub fn attributes_by_type_id(&self, type_id: AttributeTypeId) -> Vec<&PersonAttribute> {
        self.attributes.get_all_by_type_id(type_id)
    }

    pub fn attribute_map(&self) -> BTreeMap<&str, &PersonAttribute> {
        self.attributes.attribute_map()
    }
}

impl Default for PersonRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Persons are equal by `person_id`; transient persons fall back to `guid`.
impl PartialEq for PersonRecord {
    fn eq(&self, other: &Self) -> bool {
        match (self.person_id, other.person_id) {
            (Some(left), Some(right)) => left == right,
            (None, None) => self.guid == other.guid,
            _ => false,
        }
    }
}

impl Eq for PersonRecord {}

impl Hash for PersonRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.person_id {
            Some(person_id) => person_id.hash(state),
            None => self.guid.hash(state),
        }
    }
}

impl Display for PersonRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.person_id {
            Some(person_id) => write!(f, "Person(personId={person_id})"),
            None => write!(f, "Person(personId=null)"),
        }
    }
}
