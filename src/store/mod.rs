//! Generic keyed store
//!
//! CRUD over the records of one linked schema: lookups by filter or key,
//! inserts, upserts and deletes. Each call is one unit of work.

mod errors;
mod key;
mod keyed;

pub use errors::{StoreError, StoreResult};
pub use key::Key;
pub use keyed::KeyedStore;
