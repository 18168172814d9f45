//! Observability
//!
//! Structured JSON logging and lifecycle scopes. Observability is read-only:
//! logging never changes the outcome of an operation and never fails it.
//!
//! ```ignore
//! use flatstore::observability::{Logger, ObservationScope};
//!
//! Logger::info("TABLE_CREATED", &[("table", "Model")]);
//!
//! let scope = ObservationScope::new("UPSERT_LIST");
//! // ... do work ...
//! scope.complete();
//! ```

mod logger;
mod scope;

pub use logger::{Logger, Severity};
pub use scope::{ObservationScope, Timer};
