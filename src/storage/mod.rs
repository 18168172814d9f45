//! Storage engines for flat records
//!
//! The keyed store talks to storage only through [`StorageEngine`] and
//! [`UnitOfWork`]. Two engines ship with the crate:
//!
//! - [`MemoryEngine`]: process-local tables, values kept verbatim
//! - [`SqliteEngine`]: one SQLite table per flat schema; timestamps lose
//!   their zone on the way in
//!
//! # Invariants
//!
//! - Every read and write happens inside a unit of work
//! - A unit of work dropped without commit leaves no trace
//! - Rows come back in insertion order
//! - Duplicate keys on insert surface as `FLAT_STORAGE_INTEGRITY`

mod config;
mod engine;
mod errors;
mod memory;
mod sqlite;

pub use config::SqliteConfig;
pub use engine::{create_tables, filters_apply, Predicate, StorageEngine, UnitOfWork};
pub use errors::{StorageError, StorageResult};
pub use memory::MemoryEngine;
pub use sqlite::SqliteEngine;
