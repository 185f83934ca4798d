//! Shared types and error helpers used across all sheetbot crates.

pub mod error;
pub mod types;

pub use {
    error::FromMessage,
    types::{FieldMap, FieldValue, Platform},
};
