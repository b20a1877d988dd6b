//! Person domain model.
//!
//! # Responsibility
//! - Define the person aggregate and the records it owns.
//! - Keep reconciliation and derived-value policies next to the data.
//!
//! # Invariants
//! - Child records are identified by a stable `uuid`.
//! - Deletion of persons and attributes is a soft void, not a hard delete.
//! - At most one active attribute exists per attribute type.

pub mod address;
pub mod attribute;
pub mod meta;
pub mod name;
pub mod person;
