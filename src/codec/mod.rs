//! Record codec
//!
//! Converts structured records into flat records and back. Composite fields
//! are carried as serialized text, scalar fields are passed through subject
//! to the schema's fixed-timezone policy.

mod convert;
mod errors;
mod serialized;
mod timezone;

pub use convert::{flatten, rehydrate};
pub use errors::{CodecError, CodecResult};
pub use serialized::{decode_field, encode_field};
pub use timezone::TimezoneEnforcer;
