//! waifu.im image source.
//!
//! `GET {api}/search?is_nsfw=true|false|null` returns
//! `{"images":[{"url", "image_id", "artist", "source"}]}` where `artist` is
//! either a plain string, an object with a `name`, or null.

use async_trait::async_trait;
use bytes::Bytes;
use nekoview_common::nsfw::{to_query, FilterQuery, FilterSyntax};
use nekoview_common::{FetchError, FetchResult, NsfwMode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{HttpConfig, WaifuImConfig};
use crate::source::http::{build_url, HttpClient};
use crate::source::provider::{id_to_string, InfoCache, RandomImage, RawInfo, SourceProvider};

const FILTER: FilterSyntax = FilterSyntax::NullableBoolParam("is_nsfw");

#[derive(Debug, Deserialize)]
struct WaifuResponse {
    images: Vec<WaifuImage>,
}

#[derive(Debug, Deserialize)]
struct WaifuImage {
    url: String,
}

/// Random images from waifu.im.
pub struct WaifuImProvider {
    http: HttpClient,
    config: WaifuImConfig,
    cache: InfoCache,
}

impl WaifuImProvider {
    pub fn new(config: WaifuImConfig, http: &HttpConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: HttpClient::new(http, None)?,
            config,
            cache: InfoCache::new(),
        })
    }

    fn first_image(info: &RawInfo) -> Option<&Value> {
        info.get("images")?.get(0)
    }
}

#[async_trait]
impl SourceProvider for WaifuImProvider {
    fn namespace(&self) -> &'static str {
        "waifu.im"
    }

    async fn fetch_random_image_url(&self, mode: NsfwMode) -> FetchResult<RandomImage> {
        let url = match to_query(mode, FILTER) {
            FilterQuery::Param(name, value) => {
                build_url(&self.config.api_base, "/search", &[(name, value)])?
            }
            _ => build_url(&self.config.api_base, "/search", &[])?,
        };
        debug!(url = %url, mode = %mode, "waifu.im search");

        let info: RawInfo = self.http.get_json(&url).await?;
        let body: WaifuResponse = serde_json::from_value(info.clone())
            .map_err(|e| FetchError::parse(format!("waifu.im response: {e}")))?;
        let image_url = body
            .images
            .into_iter()
            .next()
            .ok_or(FetchError::EmptyResult)?
            .url;

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
            let artist = match Self::first_image(info)?.get("artist")? {
                Value::Object(map) => map.get("name")?.as_str()?.to_string(),
                Value::String(s) => s.clone(),
                _ => return None,
            };
            (!artist.is_empty()).then_some(artist)
        })
    }

    fn source_link(&self, info: Option<&RawInfo>) -> Option<String> {
        self.cache.with(info, |info| {
            Self::first_image(info)?
                .get("source")?
                .as_str()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    }

    fn item_id(&self, info: Option<&RawInfo>) -> Option<String> {
        self.cache.with(info, |info| {
            Self::first_image(info)?.get("image_id").and_then(id_to_string)
        })
    }
}
