//! Relational storage for sealed records (SQLite via `rusqlite`).
//!
//! This crate owns the schema, the per-call execution context and the
//! parameterized row queries, plus the entity-agnostic pieces of the read
//! path: signature checks yielding a typed [`Verification`] and the ordered
//! post-load decorator list. It never begins or commits transactions.

mod context;
mod db;
mod error;
pub mod integrity;
pub mod options;
pub mod rows;

pub use context::{CancelFlag, Ctx};
pub use db::Database;
pub use error::StoreError;
pub use integrity::{Corruption, CorruptionReason, Integrity, Verification};
pub use options::{from_fn, LoadOption};
