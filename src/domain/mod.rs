//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod placeholders;
pub mod posts;
pub mod slug;
pub mod types;
pub mod visibility;
