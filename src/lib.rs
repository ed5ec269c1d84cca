//! Nekoview - random image fetcher
//!
//! This library crate exposes the source registry, fetch session and
//! preference store for the CLI host and for integration testing.

pub mod config;
pub mod fetch;
pub mod source;
