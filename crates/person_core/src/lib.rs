//! Core domain logic for person records.
//! This crate is the single source of truth for attribute reconciliation and
//! the derived-value policies over a person's names, addresses and attributes.

pub mod export;
pub mod logging;
pub mod model;

pub use export::{DocumentBuilder, DocumentError, Element, ElementTree, NodeId, ToDocument};
pub use logging::{
    default_log_level, init_logging, init_logging_with, logging_status, LogSink, LoggingConfig,
};
pub use model::address::{AddressSet, PersonAddress};
pub use model::attribute::{
    AttributeChange, AttributeLedger, AttributeType, LedgerError, PersonAttribute,
};
pub use model::meta::{
    AttributeTypeId, AuditInfo, ConceptId, PersonId, PersonUuid, RecordUuid, UserId, VoidInfo,
};
pub use model::name::{NameSet, PersonName};
pub use model::person::{PersonRecord, PersonValidationError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
