//! Concrete image source implementations.
//!
//! Each submodule wraps a single remote API and implements the
//! [`SourceProvider`](super::SourceProvider) trait.

pub mod e621;
pub mod nekos_moe;
pub mod waifu_im;

pub use e621::E621Provider;
pub use nekos_moe::NekosMoeProvider;
pub use waifu_im::WaifuImProvider;
