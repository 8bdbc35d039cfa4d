//! Catalog domain model.
//!
//! # Responsibility
//! - Define read models (`Book`, `Author`, `Category`, `CatalogEntry`) and
//!   caller-owned write inputs.
//! - Validate write inputs before they reach storage.
//!
//! # Invariants
//! - Every entity is identified by a caller-assigned, immutable id.
//! - Deletion is a `deleted_at` tombstone, never a hard delete, so read
//!   models carry no deletion field: tombstoned rows are never returned.

pub mod author;
pub mod book;
pub mod catalog;
pub mod category;
pub mod validation;
