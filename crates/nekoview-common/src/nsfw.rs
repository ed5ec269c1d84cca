//! Content-filter policy.
//!
//! The three-way NSFW semantic is defined once here. Each provider only
//! declares *how* its API spells a filter ([`FilterSyntax`]); [`to_query`]
//! decides *what* to send for a given [`NsfwMode`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User-selected content filter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NsfwMode {
    /// Only safe-for-work images.
    #[default]
    Block,
    /// No filter applied; the provider's mixed default.
    AllowMixed,
    /// Only explicit images.
    OnlyNsfw,
}

impl NsfwMode {
    /// All modes in presentation order.
    pub const ALL: [NsfwMode; 3] = [Self::Block, Self::AllowMixed, Self::OnlyNsfw];

    /// Stable string used when persisting the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::AllowMixed => "allow_mixed",
            Self::OnlyNsfw => "only_nsfw",
        }
    }

    /// Parse a stored value, accepting legacy display labels.
    ///
    /// Anything unrecognized normalizes to [`NsfwMode::Block`].
    ///
    /// # Examples
    ///
    /// ```
    /// use nekoview_common::NsfwMode;
    ///
    /// assert_eq!(NsfwMode::parse_lenient("only_nsfw"), NsfwMode::OnlyNsfw);
    /// assert_eq!(NsfwMode::parse_lenient("Only NSFW"), NsfwMode::OnlyNsfw);
    /// assert_eq!(NsfwMode::parse_lenient("whatever"), NsfwMode::Block);
    /// ```
    pub fn parse_lenient(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "block" | "block_nsfw" => Self::Block,
            "allow_mixed" | "allow_nsfw" | "allow" | "mixed" => Self::AllowMixed,
            "only_nsfw" | "only" | "nsfw_only" => Self::OnlyNsfw,
            _ => Self::Block,
        }
    }

    /// Map the legacy boolean `nsfw` preference onto a mode.
    pub fn from_legacy_flag(nsfw: bool) -> Self {
        if nsfw {
            Self::AllowMixed
        } else {
            Self::Block
        }
    }

    /// The shared three-way filter semantic for this mode.
    pub fn filter(&self) -> ContentFilter {
        match self {
            Self::Block => ContentFilter::SafeOnly,
            Self::AllowMixed => ContentFilter::Unfiltered,
            Self::OnlyNsfw => ContentFilter::ExplicitOnly,
        }
    }
}

impl fmt::Display for NsfwMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NsfwMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

/// What a provider should return for a given mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFilter {
    SafeOnly,
    Unfiltered,
    ExplicitOnly,
}

/// How a provider's API expresses a content filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSyntax {
    /// `?{name}=true|false`, parameter left out when unfiltered.
    BoolParam(&'static str),
    /// `?{name}=true|false|null`, where `null` means unfiltered.
    NullableBoolParam(&'static str),
    /// A `rating:*` search tag, no tag when unfiltered.
    RatingTag,
}

/// Provider-specific rendering of a content filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterQuery {
    /// A query parameter `name=value`.
    Param(&'static str, &'static str),
    /// An additional search tag.
    Tag(&'static str),
    /// Nothing to send.
    Omit,
}

/// Translate a mode into the representation a provider understands.
///
/// # Examples
///
/// ```
/// use nekoview_common::nsfw::{to_query, FilterQuery, FilterSyntax};
/// use nekoview_common::NsfwMode;
///
/// assert_eq!(
///     to_query(NsfwMode::Block, FilterSyntax::BoolParam("nsfw")),
///     FilterQuery::Param("nsfw", "false"),
/// );
/// assert_eq!(
///     to_query(NsfwMode::OnlyNsfw, FilterSyntax::RatingTag),
///     FilterQuery::Tag("rating:explicit"),
/// );
/// ```
pub fn to_query(mode: NsfwMode, syntax: FilterSyntax) -> FilterQuery {
    match (mode.filter(), syntax) {
        (ContentFilter::SafeOnly, FilterSyntax::BoolParam(name))
        | (ContentFilter::SafeOnly, FilterSyntax::NullableBoolParam(name)) => {
            FilterQuery::Param(name, "false")
        }
        (ContentFilter::ExplicitOnly, FilterSyntax::BoolParam(name))
        | (ContentFilter::ExplicitOnly, FilterSyntax::NullableBoolParam(name)) => {
            FilterQuery::Param(name, "true")
        }
        (ContentFilter::Unfiltered, FilterSyntax::NullableBoolParam(name)) => {
            FilterQuery::Param(name, "null")
        }
        (ContentFilter::Unfiltered, FilterSyntax::BoolParam(_)) => FilterQuery::Omit,
        (ContentFilter::SafeOnly, FilterSyntax::RatingTag) => FilterQuery::Tag("rating:safe"),
        (ContentFilter::ExplicitOnly, FilterSyntax::RatingTag) => {
            FilterQuery::Tag("rating:explicit")
        }
        (ContentFilter::Unfiltered, FilterSyntax::RatingTag) => FilterQuery::Omit,
    }
}
