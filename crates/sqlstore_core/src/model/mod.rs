//! Data shapes exchanged between callers and the persistence engine.
//!
//! # Responsibility
//! - Define the storage-format `Row` and paging envelopes.
//! - Define identity contracts for id-keyed operations.
//!
//! # Invariants
//! - A `Row` preserves column insertion order; SQL builders rely on it.

pub mod identity;
pub mod paging;
pub mod row;

pub use identity::{is_empty, IdKey, Identifiable, MaybeEmpty, ID_COLUMN};
pub use paging::{DataPage, PagingParams};
pub use row::Row;
