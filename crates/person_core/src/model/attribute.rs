//! Typed person attributes and the reconciling attribute ledger.
//!
//! # Responsibility
//! - Define attribute records that reference an external type registry.
//! - Keep at most one active value per attribute type on insertion.
//! - Serve name-keyed lookups from a lazily built, cached index.
//!
//! # Invariants
//! - Among active records no two share an attribute type. `add` preserves
//!   this; `try_from_records` and deserialization reject violations.
//! - No two records in a ledger share a `uuid`.
//! - Voided records are retained as history and never returned by lookups.
//! - Every mutation through the ledger invalidates the cached index.
//! - The index maps a type name to the first active record of that type in
//!   insertion order. The same rule breaks ties in ledgers loaded through
//!   `from_records_unchecked`.
//!
//! # Concurrency
//! The index lives in an unsynchronized cell: the ledger is `Send` but not
//! `Sync`. Shared use needs an external lock around reads and writes alike.

use crate::model::meta::{AttributeTypeId, AuditInfo, PersonUuid, RecordUuid, UserId, VoidInfo};
use log::{debug, log_enabled, warn, Level};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const REPLACED_VALUE_REASON_PREFIX: &str = "New value: ";

/// Reference to an attribute type defined by the type registry.
///
/// Identity is `type_id`; `name` is the lookup key used by callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeType {
    pub type_id: AttributeTypeId,
    pub name: String,
}

impl AttributeType {
    pub fn new(type_id: AttributeTypeId, name: impl Into<String>) -> Self {
        Self {
            type_id,
            name: name.into(),
        }
    }

    /// Whether both references point at the same registry entry.
    pub fn same_type(&self, other: &AttributeType) -> bool {
        self.type_id == other.type_id
    }
}

impl Display for AttributeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One typed demographic value of a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonAttribute {
    pub uuid: RecordUuid,
    /// Back-reference to the owning person, set when the ledger accepts it.
    pub owner: Option<PersonUuid>,
    pub attribute_type: AttributeType,
    /// Opaque payload; compatibility with the type is not checked here.
    pub value: Option<String>,
    /// `creator` is present once a collaborator has committed the record.
    pub audit: AuditInfo,
    pub voided: Option<VoidInfo>,
}

impl PersonAttribute {
    /// Creates a transient (uncommitted) attribute with a generated stable ID.
    pub fn new(attribute_type: AttributeType, value: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), attribute_type, Some(value.into()))
    }

    /// Creates an attribute with a caller-provided stable ID.
    pub fn with_id(
        uuid: RecordUuid,
        attribute_type: AttributeType,
        value: Option<String>,
    ) -> Self {
        Self {
            uuid,
            owner: None,
            attribute_type,
            value,
            audit: AuditInfo::default(),
            voided: None,
        }
    }

    /// Returns the committing user, if any.
    pub fn creator(&self) -> Option<UserId> {
        self.audit.creator
    }

    pub fn is_voided(&self) -> bool {
        self.voided.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.voided.is_none()
    }

    /// Marks the attribute voided. Keeps existing void metadata when already
    /// voided.
    pub fn void(&mut self, reason: impl Into<String>) {
        if self.voided.is_none() {
            self.voided = Some(VoidInfo::with_reason(reason));
        }
    }

    /// Clears void metadata.
    pub fn unvoid(&mut self) {
        self.voided = None;
    }

    /// Whether this attribute holds `value`. An absent value never matches,
    /// not even another absent value.
    pub fn holds_value(&self, value: Option<&str>) -> bool {
        matches!((self.value.as_deref(), value), (Some(current), Some(other)) if current == other)
    }
}

/// Outcome of `AttributeLedger::add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeChange {
    /// The record or an equal value was already active; nothing changed.
    Unchanged,
    /// The record was inserted without superseding anything.
    Inserted,
    /// The record was inserted and superseded active records of its type.
    Replaced {
        /// Committed records kept as voided history.
        voided: Vec<RecordUuid>,
        /// Transient records dropped from the ledger.
        removed: Vec<RecordUuid>,
    },
}

impl AttributeChange {
    pub fn is_changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Ledger invariant violations reported by checked constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Two active records share one attribute type.
    DuplicateActiveType {
        type_id: AttributeTypeId,
        first: RecordUuid,
        second: RecordUuid,
    },
    /// Two records share one uuid.
    DuplicateRecord(RecordUuid),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateActiveType {
                type_id,
                first,
                second,
            } => write!(
                f,
                "attributes {first} and {second} are both active for attribute type {type_id}"
            ),
            Self::DuplicateRecord(uuid) => write!(f, "attribute {uuid} appears more than once"),
        }
    }
}

impl Error for LedgerError {}

/// Attribute set of one person.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<PersonAttribute>", into = "Vec<PersonAttribute>")]
pub struct AttributeLedger {
    records: Vec<PersonAttribute>,
    index: OnceCell<BTreeMap<String, usize>>,
}

impl AttributeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from existing records, rejecting invariant violations.
    ///
    /// # Errors
    /// - `DuplicateRecord` when two records share a uuid.
    /// - `DuplicateActiveType` when two active records share a type.
    pub fn try_from_records(records: Vec<PersonAttribute>) -> Result<Self, LedgerError> {
        check_records(&records)?;
        Ok(Self {
            records,
            index: OnceCell::new(),
        })
    }

    /// Builds a ledger from legacy records without rejecting violations.
    ///
    /// Lookups then resolve duplicate active types to the first record in
    /// the given order.
    pub fn from_records_unchecked(records: Vec<PersonAttribute>) -> Self {
        if let Err(err) = check_records(&records) {
            warn!(
                "event=attribute_ledger_load module=ledger status=inconsistent records={} error={}",
                records.len(),
                err
            );
        }
        Self {
            records,
            index: OnceCell::new(),
        }
    }

    /// Reconciles `attribute` into the ledger on behalf of `owner`.
    ///
    /// # Contract
    /// - A record whose uuid is already present is ignored.
    /// - An active record of the same type holding an equal value makes the
    ///   call a no-op.
    /// - Otherwise every active record of the same type is superseded:
    ///   committed ones (with a creator) are voided with reason
    ///   `New value: <value>` and kept, transient ones are removed.
    /// - The owner back-reference is set only when the record is inserted.
    pub fn add(&mut self, owner: PersonUuid, mut attribute: PersonAttribute) -> AttributeChange {
        if self.contains(attribute.uuid) {
            debug!(
                "event=attribute_add module=ledger status=unchanged reason=known_record attribute={}",
                attribute.uuid
            );
            return AttributeChange::Unchanged;
        }

        let same_type: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, current)| {
                current.is_active() && current.attribute_type.same_type(&attribute.attribute_type)
            })
            .map(|(position, _)| position)
            .collect();

        if same_type
            .iter()
            .any(|&position| self.records[position].holds_value(attribute.value.as_deref()))
        {
            debug!(
                "event=attribute_add module=ledger status=unchanged reason=same_value type_id={}",
                attribute.attribute_type.type_id
            );
            return AttributeChange::Unchanged;
        }

        let reason = format!(
            "{REPLACED_VALUE_REASON_PREFIX}{}",
            attribute.value.as_deref().unwrap_or_default()
        );
        let mut voided = Vec::new();
        let mut removed = Vec::new();
        // Reverse order keeps pending positions valid across removals.
        for position in same_type.into_iter().rev() {
            if self.records[position].audit.is_committed() {
                let current = &mut self.records[position];
                current.void(reason.as_str());
                voided.push(current.uuid);
            } else {
                removed.push(self.records.remove(position).uuid);
            }
        }
        voided.reverse();
        removed.reverse();

        attribute.owner = Some(owner);
        debug!(
            "event=attribute_add module=ledger status=ok type_id={} attribute={} voided={} removed={}",
            attribute.attribute_type.type_id,
            attribute.uuid,
            voided.len(),
            removed.len()
        );
        self.records.push(attribute);
        self.invalidate_index();

        if voided.is_empty() && removed.is_empty() {
            AttributeChange::Inserted
        } else {
            AttributeChange::Replaced { voided, removed }
        }
    }

    /// Physically removes the record with `uuid`. Does not void.
    pub fn remove(&mut self, uuid: RecordUuid) -> Option<PersonAttribute> {
        let position = self.records.iter().position(|record| record.uuid == uuid)?;
        let removed = self.records.remove(position);
        self.invalidate_index();
        Some(removed)
    }

    /// Voids the active record with `uuid`. Returns whether anything changed.
    pub fn void(&mut self, uuid: RecordUuid, reason: impl Into<String>) -> bool {
        let Some(record) = self
            .records
            .iter_mut()
            .find(|record| record.uuid == uuid && record.is_active())
        else {
            return false;
        };
        record.void(reason);
        self.invalidate_index();
        true
    }

    /// Non-voided records in insertion order.
    pub fn active(&self) -> impl Iterator<Item = &PersonAttribute> {
        self.records.iter().filter(|record| record.is_active())
    }

    /// All records, voided history included, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PersonAttribute> {
        self.records.iter()
    }

    /// First active attribute whose type is named `type_name`.
    pub fn get(&self, type_name: &str) -> Option<&PersonAttribute> {
        self.index()
            .get(type_name)
            .map(|&position| &self.records[position])
    }

    /// First active attribute whose type id is `type_id`.
    pub fn get_by_type_id(&self, type_id: AttributeTypeId) -> Option<&PersonAttribute> {
        self.active()
            .find(|record| record.attribute_type.type_id == type_id)
    }

    /// All active attributes whose type is named `type_name`.
    pub fn get_all(&self, type_name: &str) -> Vec<&PersonAttribute> {
        self.active()
            .filter(|record| record.attribute_type.name == type_name)
            .collect()
    }

    /// All active attributes whose type id is `type_id`.
    pub fn get_all_by_type_id(&self, type_id: AttributeTypeId) -> Vec<&PersonAttribute> {
        self.active()
            .filter(|record| record.attribute_type.type_id == type_id)
            .collect()
    }

    /// Active attributes keyed by type name.
    pub fn attribute_map(&self) -> BTreeMap<&str, &PersonAttribute> {
        self.index()
            .iter()
            .map(|(name, &position)| (name.as_str(), &self.records[position]))
            .collect()
    }

    /// Any record, active or voided, with `uuid`.
    pub fn find(&self, uuid: RecordUuid) -> Option<&PersonAttribute> {
        self.records.iter().find(|record| record.uuid == uuid)
    }

    pub fn contains(&self, uuid: RecordUuid) -> bool {
        self.records.iter().any(|record| record.uuid == uuid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Re-checks the ledger invariants.
    pub fn check_invariant(&self) -> Result<(), LedgerError> {
        check_records(&self.records)
    }

    /// Human-readable listing of every record: `<type> : <value> : voided? <bool>`.
    ///
    /// Contains attribute values; do not send it to logs.
    pub fn describe(&self) -> String {
        self.records
            .iter()
            .map(|record| {
                format!(
                    "{} : {} : voided? {}\n",
                    record.attribute_type,
                    record.value.as_deref().unwrap_or("null"),
                    record.is_voided()
                )
            })
            .collect()
    }

    pub(crate) fn rebind(&mut self, owner: PersonUuid) {
        for record in &mut self.records {
            record.owner = Some(owner);
        }
    }

    fn index(&self) -> &BTreeMap<String, usize> {
        self.index.get_or_init(|| {
            if log_enabled!(Level::Debug) {
                let types = self
                    .records
                    .iter()
                    .map(|record| {
                        format!("{}:{}", record.attribute_type.type_id, record.is_voided())
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                debug!(
                    "event=attribute_index_build module=ledger status=start records={} types=[{}]",
                    self.records.len(),
                    types
                );
            }

            let mut index = BTreeMap::new();
            for (position, record) in self.records.iter().enumerate() {
                if record.is_active() {
                    index
                        .entry(record.attribute_type.name.clone())
                        .or_insert(position);
                }
            }
            index
        })
    }

    fn invalidate_index(&mut self) {
        self.index.take();
    }
}

impl PartialEq for AttributeLedger {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl Eq for AttributeLedger {}

impl TryFrom<Vec<PersonAttribute>> for AttributeLedger {
    type Error = LedgerError;

    fn try_from(value: Vec<PersonAttribute>) -> Result<Self, Self::Error> {
        Self::try_from_records(value)
    }
}

impl From<AttributeLedger> for Vec<PersonAttribute> {
    fn from(value: AttributeLedger) -> Self {
        value.records
    }
}

fn check_records(records: &[PersonAttribute]) -> Result<(), LedgerError> {
    let mut seen_uuids = BTreeSet::new();
    let mut active_types: BTreeMap<AttributeTypeId, RecordUuid> = BTreeMap::new();
    for record in records {
        if !seen_uuids.insert(record.uuid) {
            return Err(LedgerError::DuplicateRecord(record.uuid));
        }
        if !record.is_active() {
            continue;
        }
        if let Some(&first) = active_types.get(&record.attribute_type.type_id) {
            return Err(LedgerError::DuplicateActiveType {
                type_id: record.attribute_type.type_id,
                first,
                second: record.uuid,
            });
        }
        active_types.insert(record.attribute_type.type_id, record.uuid);
    }
    Ok(())
}
