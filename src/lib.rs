//! Cough survey: a multi-step wizard flow controller.

pub mod channels;
pub mod config;
pub mod error;
pub mod store;
pub mod wizard;
