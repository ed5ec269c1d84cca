//! e621 image source.
//!
//! Queries `GET {api}/posts.json?tags=order:random {extra} {rating}&limit=1`.
//! e621 requires a descriptive `User-Agent` and allows at most two requests
//! per second, so every request goes through a [`governor`] rate limiter.
//! Extra tags are read from the `e621_tags` preference on each fetch.

use std::num::NonZeroU32;

use async_trait::async_trait;
use bytes::Bytes;
use nekoview_common::nsfw::{to_query, FilterQuery, FilterSyntax};
use nekoview_common::{FetchError, FetchResult, NsfwMode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{E621Config, HttpConfig, Preferences};
use crate::source::http::{build_url, HttpClient};
use crate::source::provider::{id_to_string, InfoCache, RandomImage, RawInfo, SourceProvider};

const FILTER: FilterSyntax = FilterSyntax::RatingTag;

/// Entries in the `artist` tag category that do not name an artist.
const NON_ARTIST_TAGS: &[&str] = &[
    "conditional_dnp",
    "sound_warning",
    "unknown_artist",
    "epilepsy_warning",
    "third-party_edit",
];

#[derive(Debug, Deserialize)]
struct E621Response {
    posts: Vec<E621Post>,
}

#[derive(Debug, Deserialize)]
struct E621Post {
    id: u64,
    file: E621File,
}

#[derive(Debug, Deserialize)]
struct E621File {
    url: Option<String>,
}

/// Random posts from e621.
pub struct E621Provider {
    http: HttpClient,
    config: E621Config,
    prefs: Option<Preferences>,
    cache: InfoCache,
}

impl E621Provider {
    /// Create the provider. When `prefs` is given, its `e621_tags` value is
    /// appended to every search.
    pub fn new(
        config: E621Config,
        http: &HttpConfig,
        prefs: Option<Preferences>,
    ) -> anyhow::Result<Self> {
        let mut client = HttpClient::new(http, Some(&config.user_agent))?;
        if let Some(per_second) = NonZeroU32::new(config.requests_per_second) {
            client = client.with_rate_limit(per_second);
        }

        Ok(Self {
            http: client,
            config,
            prefs,
            cache: InfoCache::new(),
        })
    }

    /// Full `tags` query value for `mode`.
    fn search_tags(&self, mode: NsfwMode) -> String {
        let extra = self.prefs.as_ref().map(Preferences::e621_tags).unwrap_or_default();

        let mut tags = vec!["order:random".to_string()];
        tags.extend(extra.split_whitespace().map(str::to_string));
        if let FilterQuery::Tag(rating) = to_query(mode, FILTER) {
            tags.push(rating.to_string());
        }
        tags.join(" ")
    }

    fn first_post(info: &RawInfo) -> Option<&Value> {
        info.get("posts")?.get(0)
    }
}

#[async_trait]
impl SourceProvider for E621Provider {
    fn namespace(&self) -> &'static str {
        "e621"
    }

    async fn fetch_random_image_url(&self, mode: NsfwMode) -> FetchResult<RandomImage> {
        let tags = self.search_tags(mode);
        let url = build_url(
            &self.config.api_base,
            "/posts.json",
            &[("tags", tags.as_str()), ("limit", "1")],
        )?;
        debug!(url = %url, mode = %mode, "e621 random post");

        let info: RawInfo = self.http.get_json(&url).await?;
        let body: E621Response = serde_json::from_value(info.clone())
            .map_err(|e| FetchError::parse(format!("e621 response: {e}")))?;
        let post = body.posts.into_iter().next().ok_or(FetchError::EmptyResult)?;
        let image_url = post.file.url.ok_or_else(|| {
            FetchError::parse(format!("e621 post {} has no file URL", post.id))
        })?;

        self.cache.store(info.clone());
        Ok(RandomImage {
            url: image_url,
            info,
        })
    }

    async fn fetch_bytes(&self, url: &str) -> FetchResult<Bytes> {
        self.http.get_bytes(url).await
    }

    fn last_info(&self) -> Option<RawInfo> {
        self.cache.get()
    }

    fn artist(&self, info: Option<&RawInfo>) -> Option<String> {
        self.cache.with(info, |info| {
            Self::first_post(info)?
                .pointer("/tags/artist")?
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .find(|tag| !NON_ARTIST_TAGS.contains(tag))
                .map(str::to_string)
        })
    }

    fn source_link(&self, info: Option<&RawInfo>) -> Option<String> {
        let id = self.item_id(info)?;
        Some(format!("{}/{}", self.config.post_base.trim_end_matches('/'), id))
    }

    fn item_id(&self, info: Option<&RawInfo>) -> Option<String> {
        self.cache
            .with(info, |info| Self::first_post(info)?.get("id").and_then(id_to_string))
    }
}
