use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::models::{Extracted, FieldId, PartialRecord, Value};

/// In-memory aggregate of partial records keyed by entity name.
///
/// Records are created lazily on the first write under a name and live as
/// long as the store. Every write is a field-level overwrite performed
/// under one lock, so two stages writing the same entity never interleave
/// a read-modify-write.
#[derive(Debug, Clone, Default)]
pub struct AggregateStore {
    records: Arc<Mutex<HashMap<String, PartialRecord>>>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PartialRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite one field of `name`'s record.
    pub fn merge_field(&self, name: &str, field: FieldId, value: Extracted<Value>) {
        self.merge(name, [(field, value)]);
    }

    /// Overwrite a set of fields of `name`'s record atomically.
    ///
    /// Fields not listed keep whatever was written before.
    pub fn merge(&self, name: &str, fields: impl IntoIterator<Item = (FieldId, Extracted<Value>)>) {
        let mut records = self.lock();
        let record = records
            .entry(name.to_string())
            .or_insert_with(|| PartialRecord::new(name));
        for (field, value) in fields {
            record.apply(field, value);
        }
    }

    /// Snapshot of `name`'s record, if any stage has written it.
    pub fn get(&self, name: &str) -> Option<PartialRecord> {
        self.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
