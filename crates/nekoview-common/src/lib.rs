//! Nekoview-Common: shared types used by the nekoview core and its host.
//!
//! - **Error Handling**: the [`FetchError`] taxonomy every provider returns
//! - **Content Filter**: [`NsfwMode`] and the single mode-to-query mapping
//! - **Path Utilities**: image extension detection for files and URLs
//!
//! # Examples
//!
//! ```
//! use nekoview_common::{FetchError, NsfwMode};
//! use nekoview_common::nsfw::{to_query, FilterQuery, FilterSyntax};
//!
//! let mode = NsfwMode::parse_lenient("Block NSFW");
//! assert_eq!(
//!     to_query(mode, FilterSyntax::RatingTag),
//!     FilterQuery::Tag("rating:safe"),
//! );
//!
//! fn example() -> nekoview_common::FetchResult<()> {
//!     Err(FetchError::EmptyResult)
//! }
//! assert!(example().is_err());
//! ```

pub mod error;
pub mod nsfw;
pub mod paths;

pub use error::{ErrorKind, FetchError, FetchResult};
pub use nsfw::{ContentFilter, NsfwMode};
