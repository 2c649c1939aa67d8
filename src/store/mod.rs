//! Shared answer store: one value per step, kept for the whole session.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{AnswerRecord, AnswerStore};
