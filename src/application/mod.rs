//! Application services over the post store and its collaborators.

pub mod error;
pub mod generation;
pub mod posts;
pub mod repos;
pub mod uploads;
