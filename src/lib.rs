//! Tsuzuri: a file-backed blog content pipeline.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
