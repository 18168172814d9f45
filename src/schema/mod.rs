//! Schema subsystem
//!
//! Structured schemas describe records with arbitrarily nested fields. Each
//! structured schema is linked once to a flat schema whose columns are all
//! storable scalars.
//!
//! # Design Principles
//!
//! - Schemas are immutable once built
//! - Scalar vs composite is decided once per field, at generation time
//! - Unsupported unions fail when the schema is built, never at use time
//! - Linking is explicit and happens before any store operation

mod classifier;
mod errors;
mod flat;
mod registry;
mod types;

pub use classifier::{classify, classify_type, Classification, ScalarKind};
pub use errors::{SchemaError, SchemaResult, ValidationDetails};
pub use flat::{generate_flat_schema, FlatField, FlatSchema};
pub use registry::{LinkOptions, LinkedSchema, SchemaRegistry};
pub use types::{
    EnumBacking, EnumRepr, EnumType, FieldDescriptor, FieldType, StructuredSchema,
    StructuredSchemaBuilder,
};
