//! Flat records: the unit handed to a storage engine
//!
//! Columns keep the order of the flat schema they were produced for.

use super::value::Value;

/// Ordered column/value pairs, every value a storable scalar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatRecord {
    columns: Vec<(String, Value)>,
}

impl FlatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Appends a column, replacing an existing column of the same name.
    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut Value> {
        self.columns
            .iter_mut()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_columns(self) -> Vec<(String, Value)> {
        self.columns
    }
}

impl FromIterator<(String, Value)> for FlatRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = FlatRecord::new();
        for (column, value) in iter {
            record.push(column, value);
        }
        record
    }
}
