//! nekos.moe image source.
//!
//! `GET {api}/random/image?nsfw=true|false` returns
//! `{"images":[{"id": "...", "artist": "..."}]}`. The image itself lives at
//! `{image_base}/{id}` and the post page at `{post_base}/{id}`.

use async_trait::async_trait;
use bytes::Bytes;
use nekoview_common::nsfw::{to_query, FilterQuery, FilterSyntax};
use nekoview_common::{FetchError, FetchResult, NsfwMode};
use serde::Deserialize;
use tracing::debug;

use crate::config::{HttpConfig, NekosMoeConfig};
use crate::source::http::{build_url, HttpClient};
use crate::source::provider::{id_to_string, InfoCache, RandomImage, RawInfo, SourceProvider};

const FILTER: FilterSyntax = FilterSyntax::BoolParam("nsfw");

#[derive(Debug, Deserialize)]
struct NekosResponse {
    images: Vec<NekosImage>,
}

#[derive(Debug, Deserialize)]
struct NekosImage {
    id: String,
}

/// Random images from nekos.moe.
pub struct NekosMoeProvider {
    http: HttpClient,
    config: NekosMoeConfig,
    cache: InfoCache,
}

impl NekosMoeProvider {
    pub fn new(config: NekosMoeConfig, http: &HttpConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: HttpClient::new(http, None)?,
            config,
            cache: InfoCache::new(),
        })
    }

    fn first_image(info: &RawInfo) -> Option<&serde_json::Value> {
        info.get("images")?.get(0)
    }
}

#[async_trait]
impl SourceProvider for NekosMoeProvider {
    fn namespace(&self) -> &'static str {
        "nekos.moe"
    }

    async fn fetch_random_image_url(&self, mode: NsfwMode) -> FetchResult<RandomImage> {
        let url = match to_query(mode, FILTER) {
            FilterQuery::Param(name, value) => {
                build_url(&self.config.api_base, "/random/image", &[(name, value)])?
            }
            _ => build_url(&self.config.api_base, "/random/image", &[])?,
        };
        debug!(url = %url, mode = %mode, "nekos.moe random image");

        let info: RawInfo = self.http.get_json(&url).await?;
        let body: NekosResponse = serde_json::from_value(info.clone())
            .map_err(|e| FetchError::parse(format!("nekos.moe response: {e}")))?;
        let image = body.images.first().ok_or(FetchError::EmptyResult)?;

        let image_url = format!("{}/{}", self.config.image_base.trim_end_matches('/'), image.id);
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
            Self::first_image(info)?
                .get("artist")?
                .as_str()
                .filter(|a| !a.is_empty())
                .map(str::to_string)
        })
    }

    fn source_link(&self, info: Option<&RawInfo>) -> Option<String> {
        let id = self.item_id(info)?;
        Some(format!("{}/{}", self.config.post_base.trim_end_matches('/'), id))
    }

    fn item_id(&self, info: Option<&RawInfo>) -> Option<String> {
        self.cache
            .with(info, |info| Self::first_image(info)?.get("id").and_then(id_to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> NekosMoeProvider {
        NekosMoeProvider::new(NekosMoeConfig::default(), &HttpConfig::default()).unwrap()
    }

    #[test]
    fn metadata_from_info() {
        let p = provider();
        let info = json!({"images": [{"id": "HkL3ab", "artist": "kazuharu"}]});

        assert_eq!(p.artist(Some(&info)).as_deref(), Some("kazuharu"));
        assert_eq!(
            p.source_link(Some(&info)).as_deref(),
            Some("https://nekos.moe/post/HkL3ab")
        );
        assert_eq!(p.suggest_filename(Some("png"), Some(&info)), "nekos.moe_HkL3ab.png");
    }

    #[test]
    fn missing_fields_are_none_not_errors() {
        let p = provider();
        let info = json!({"images": [{"id": "x"}]});
        assert_eq!(p.artist(Some(&info)), None);

        let empty = json!({});
        assert_eq!(p.artist(Some(&empty)), None);
        assert_eq!(p.source_link(Some(&empty)), None);
    }

    #[test]
    fn falls_back_to_cached_info() {
        let p = provider();
        assert_eq!(p.artist(None), None);
        assert!(p.suggest_filename(None, None).starts_with("nekos.moe_"));

        p.cache.store(json!({"images": [{"id": "abc", "artist": "someone"}]}));
        assert_eq!(p.artist(None).as_deref(), Some("someone"));
        assert_eq!(p.suggest_filename(None, None), "nekos.moe_abc");
    }

    #[test]
    fn normalize_builds_result() {
        let p = provider();
        let info = json!({"images": [{"id": "abc", "artist": "someone"}]});
        let result = p.normalize(
            "nekos_moe",
            RandomImage {
                url: "https://nekos.moe/image/abc".into(),
                info,
            },
        );
        assert_eq!(result.source_id, "nekos_moe");
        assert_eq!(result.artist_label(), "someone");
        assert_eq!(result.source_link.as_deref(), Some("https://nekos.moe/post/abc"));
        assert_eq!(result.suggested_filename(Some("jpg")), "nekos.moe_abc.jpg");
    }
}
