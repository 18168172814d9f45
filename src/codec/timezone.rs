//! Fixed-timezone policy enforcement
//!
//! Encode direction: a zoned timestamp must carry exactly the policy zone.
//! A naive timestamp is accepted. Either way the wall clock is stored
//! without its zone, so stored values and lookup values share one form.
//!
//! Decode direction: a naive stored timestamp gets the policy zone attached;
//! a stored timestamp with another zone indicates corrupted state.
//!
//! Storage engines that drop offsets therefore lose nothing: the zone of
//! every timestamp column is known from the schema.

use chrono_tz::Tz;

use super::errors::{CodecError, CodecResult};
use crate::value::Value;

/// Applies a schema's fixed-timezone policy to timestamp values
pub struct TimezoneEnforcer;

impl TimezoneEnforcer {
    /// Verifies one value before it is written.
    pub fn verify(field: &str, value: &Value, policy: Option<Tz>) -> CodecResult<()> {
        let (Some(policy), Value::Timestamp(ts)) = (policy, value) else {
            return Ok(());
        };
        match ts.zone() {
            Some(zone) if zone != policy => Err(Self::mismatch(field, value, policy)),
            _ => Ok(()),
        }
    }

    /// Verifies one value and returns its stored form: under a policy,
    /// timestamps lose their zone.
    pub fn canonical(field: &str, value: &Value, policy: Option<Tz>) -> CodecResult<Value> {
        Self::verify(field, value, policy)?;
        match (policy, value) {
            (Some(_), Value::Timestamp(ts)) => Ok(Value::Timestamp(ts.without_zone())),
            _ => Ok(value.clone()),
        }
    }

    /// Normalises one value after it is read.
    pub fn normalize(field: &str, value: Value, policy: Option<Tz>) -> CodecResult<Value> {
        let Some(policy) = policy else {
            return Ok(value);
        };
        let Value::Timestamp(ts) = value else {
            return Ok(value);
        };
        match ts.zone() {
            None => Ok(Value::Timestamp(ts.with_zone(policy))),
            Some(zone) if zone == policy => Ok(value),
            Some(_) => Err(Self::mismatch(field, &value, policy)),
        }
    }

    fn mismatch(field: &str, value: &Value, policy: Tz) -> CodecError {
        let shown = match value {
            Value::Timestamp(ts) => ts.to_text(),
            other => other.type_name().to_string(),
        };
        CodecError::TimezoneMismatch {
            field: field.to_string(),
            value: shown,
            expected: policy.name().to_string(),
        }
    }
}
