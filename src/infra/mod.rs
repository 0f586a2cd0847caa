//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod generation;
pub mod http;
pub mod invalidation;
pub mod store;
pub mod telemetry;
pub mod uploads;
