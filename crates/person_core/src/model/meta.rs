//! Identifier aliases and shared audit/void metadata.
//!
//! # Responsibility
//! - Name the identifier shapes handed out by collaborating subsystems.
//! - Model the audit and soft-delete metadata shared by persons and their
//!   child records.
//!
//! # Invariants
//! - A record is voided iff it carries a `VoidInfo`; actor, timestamp and
//!   reason cannot exist on an active record.
//! - Audit fields are written by infrastructure, never by core operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted person row identifier issued by the storage collaborator.
pub type PersonId = i64;
/// Identifier of a system user (creator, modifier, voider).
pub type UserId = i64;
/// Identifier of a coded concept in the vocabulary subsystem.
pub type ConceptId = i64;
/// Identifier of an attribute type in the external type registry.
pub type AttributeTypeId = i64;

/// Stable global identity of a person.
///
/// Child records store it as their owner back-reference.
pub type PersonUuid = Uuid;
/// Stable global identity of a name, address or attribute record.
pub type RecordUuid = Uuid;

/// Creation and last-change metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub creator: Option<UserId>,
    pub date_created: Option<DateTime<Utc>>,
    pub changed_by: Option<UserId>,
    pub date_changed: Option<DateTime<Utc>>,
}

impl AuditInfo {
    /// Audit stamp for a record committed by `creator` at `at`.
    pub fn created(creator: UserId, at: DateTime<Utc>) -> Self {
        Self {
            creator: Some(creator),
            date_created: Some(at),
            ..Self::default()
        }
    }

    /// Whether a collaborator has committed the record.
    pub fn is_committed(&self) -> bool {
        self.creator.is_some()
    }
}

/// Soft-delete metadata. Presence means the owning record is voided.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidInfo {
    pub voided_by: Option<UserId>,
    pub date_voided: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

impl VoidInfo {
    /// Void marker carrying only a reason; actor and time are left for
    /// infrastructure to stamp.
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            void_reason: Some(reason.into()),
            ..Self::default()
        }
    }
}
