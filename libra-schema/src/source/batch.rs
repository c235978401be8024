//! In-memory record source.

use crate::error::SchemaResult;

use super::{RawRecord, RecordSource, SchemaSelector, select};

/// Records that are already in the engine's shape.
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    records: Vec<RawRecord>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn push(&mut self, record: RawRecord) -> &mut Self {
        self.records.push(record);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawRecord> {
        self.records.iter()
    }
}

impl From<Vec<RawRecord>> for RecordBatch {
    fn from(records: Vec<RawRecord>) -> Self {
        Self { records }
    }
}

impl FromIterator<RawRecord> for RecordBatch {
    fn from_iter<I: IntoIterator<Item = RawRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl RecordSource for RecordBatch {
    fn records(&self, selector: &SchemaSelector) -> SchemaResult<Vec<RawRecord>> {
        Ok(select(self.records.clone(), selector))
    }

    fn describe(&self) -> String {
        format!("record batch ({} records)", self.records.len())
    }
}
