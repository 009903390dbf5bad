//! Shared types used across the order saga crates.

mod types;

pub use types::AggregateId;
