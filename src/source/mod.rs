//! Image source system.
//!
//! A generic [`SourceProvider`] trait hides each remote gallery API behind one
//! normalized contract, and the [`ProviderRegistry`] resolves sources by id.
//!
//! # Module layout
//!
//! - [`provider`] -- Trait definition and normalized result types.
//! - [`providers`] -- Concrete sources (nekos.moe, waifu.im, e621).
//! - [`registry`] -- Id-to-source lookup with first-entry fallback.
//! - [`http`] -- Shared HTTP client with timeouts, retries and rate limiting.

pub mod http;
pub mod provider;
pub mod providers;
pub mod registry;

pub use provider::{
    FetchedImage, ImageResult, InfoCache, RandomImage, RawInfo, SourceProvider, UNKNOWN_ARTIST,
};
pub use registry::{ProviderRegistry, SourceDescriptor};
