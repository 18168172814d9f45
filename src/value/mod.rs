//! Value model shared by structured and flat records
//!
//! - `Value`: dynamic field value (scalars, collections, nested records)
//! - `Record`: an instance of a structured schema
//! - `FlatRecord`: schema-ordered scalar columns for a storage engine
//! - `Timestamp`: wall clock plus optional named timezone

mod flat_record;
mod timestamp;
#[allow(clippy::module_inception)]
mod value;

pub use flat_record::FlatRecord;
pub use timestamp::{parse_timezone, Timestamp};
pub use value::{Record, Value};
