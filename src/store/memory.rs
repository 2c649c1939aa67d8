//! In-memory answer store.

use serde_json::Value;

use super::traits::{AnswerRecord, AnswerStore};

/// Answer store that lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    record: AnswerRecord,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record.
    pub fn with_record(record: AnswerRecord) -> Self {
        Self { record }
    }
}

impl AnswerStore for MemoryStore {
    fn read(&self, key: &str) -> Option<Value> {
        self.record.get(key).cloned()
    }

    fn write(&mut self, key: &str, value: Value) {
        tracing::debug!(store_key = %key, "Answer written");
        self.record.insert(key.to_string(), value);
    }

    fn reset(&mut self) {
        tracing::debug!(entries = self.record.len(), "Answer store reset");
        self.record.clear();
    }

    fn record(&self) -> &AnswerRecord {
        &self.record
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unknown_key_reads_none() {
        let store = MemoryStore::new();
        assert_eq!(store.read("ns:missing"), None);
    }

    #[test]
    fn write_replaces_whole_value() {
        let mut store = MemoryStore::new();
        store.write("ns:s1", json!({"age": "18-45", "gender": ["Female"]}));
        store.write("ns:s1", json!({"age": "45-65"}));
        // No partial merge: `gender` is gone.
        assert_eq!(store.read("ns:s1"), Some(json!({"age": "45-65"})));
    }

    #[test]
    fn repeated_reads_and_writes_are_stable() {
        let mut store = MemoryStore::new();
        store.write("ns:s1", json!({"sex": "Male"}));
        let first = store.read("ns:s1");
        assert_eq!(first, store.read("ns:s1"));

        let before = store.record().clone();
        store.write("ns:s1", json!({"sex": "Male"}));
        assert_eq!(store.record(), &before);
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = MemoryStore::with_record(AnswerRecord::from([
            ("a".to_string(), json!(1)),
            ("b".to_string(), json!(2)),
        ]));
        store.reset();
        assert!(store.record().is_empty());
    }
}
