//! `AnswerStore` trait: the shared answer record every step reads and
//! writes.

use std::collections::BTreeMap;

use serde_json::Value;

/// Flat mapping from step store key to that step's submitted value.
///
/// This is also the persisted layout: one JSON object, no versioning.
pub type AnswerRecord = BTreeMap<String, Value>;

/// Session-wide answer storage.
///
/// Only the mounted step writes, so implementations need no locking.
/// Reads and writes never fail; backends that persist log their own
/// failures and keep the in-memory record authoritative.
pub trait AnswerStore {
    /// Current value for `key`, `None` if that step was never submitted.
    fn read(&self, key: &str) -> Option<Value>;

    /// Replace the value at `key` in full.
    fn write(&mut self, key: &str, value: Value);

    /// Drop every answer.
    fn reset(&mut self);

    /// The whole record.
    fn record(&self) -> &AnswerRecord;
}

impl<S: AnswerStore + ?Sized> AnswerStore for Box<S> {
    fn read(&self, key: &str) -> Option<Value> {
        (**self).read(key)
    }

    fn write(&mut self, key: &str, value: Value) {
        (**self).write(key, value)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn record(&self) -> &AnswerRecord {
        (**self).record()
    }
}
