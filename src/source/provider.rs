//! Trait definition and types for image source providers.
//!
//! This module defines the [`SourceProvider`] trait that every remote gallery
//! backend (nekos.moe, waifu.im, e621, ...) implements, along with the
//! normalized result types the orchestrator works with.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use nekoview_common::paths::extension_from_url;
use nekoview_common::{FetchResult, NsfwMode};
use parking_lot::Mutex;
use serde::Serialize;

/// Opaque provider-specific response, kept verbatim for metadata lookups.
pub type RawInfo = serde_json::Value;

/// Label shown when a provider has no artist for an image.
pub const UNKNOWN_ARTIST: &str = "Unknown";

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A random image location returned by a provider, with the response it came
/// from.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomImage {
    /// Fully-qualified URL of the image bytes.
    pub url: String,
    /// Provider response the URL was taken from.
    pub info: RawInfo,
}

/// Normalized output of a successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageResult {
    /// Registry id of the source that produced this image.
    pub source_id: String,
    /// Fully-qualified URL of the image bytes.
    pub image_url: String,
    /// Artist name, if the provider reported one.
    pub artist: Option<String>,
    /// Canonical human-viewable post URL, if known.
    pub source_link: Option<String>,
    /// Provider response, retained for filename suggestions.
    pub raw_info: RawInfo,
    filename_stem: String,
}

impl ImageResult {
    /// Artist name, or [`UNKNOWN_ARTIST`] when absent.
    pub fn artist_label(&self) -> &str {
        self.artist.as_deref().unwrap_or(UNKNOWN_ARTIST)
    }

    /// Filename without extension, e.g. `waifu.im_7261`.
    pub fn filename_stem(&self) -> &str {
        &self.filename_stem
    }

    /// Suggested filename, with `extension` appended when given.
    pub fn suggested_filename(&self, extension: Option<&str>) -> String {
        with_extension(&self.filename_stem, extension)
    }
}

/// An [`ImageResult`] together with the downloaded payload.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub result: ImageResult,
    /// Bytes exactly as served; never re-encoded.
    pub bytes: Bytes,
    /// Extension detected from the content, falling back to the URL.
    pub extension: Option<String>,
}

impl FetchedImage {
    pub fn new(result: ImageResult, bytes: Bytes) -> Self {
        let extension =
            sniff_extension(&bytes).or_else(|| extension_from_url(&result.image_url));
        Self {
            result,
            bytes,
            extension,
        }
    }

    pub fn suggested_filename(&self) -> String {
        self.result.suggested_filename(self.extension.as_deref())
    }

    /// Write the payload verbatim to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, &self.bytes)
            .with_context(|| format!("Failed to save image to {:?}", path))
    }
}

/// Detect the image format from magic bytes.
fn sniff_extension(bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Async trait that all image source providers must implement.
///
/// Each provider wraps a single remote API and hides its response schema
/// behind this contract, so callers never branch on which source they talk to.
/// Metadata accessors take an explicit `info`, falling back to the provider's
/// own cache of its last successful fetch.
///
/// Providers are shared as `Arc<dyn SourceProvider>`.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Filename prefix for images from this provider (e.g. `"waifu.im"`).
    fn namespace(&self) -> &'static str;

    /// Fetch the location of one random image.
    ///
    /// Fails with `Network` on transport errors or a non-2xx status,
    /// `EmptyResult` when the provider returns nothing, and `Parse` when the
    /// body does not match the expected schema. On success the provider's
    /// last-info cache is updated.
    async fn fetch_random_image_url(&self, mode: NsfwMode) -> FetchResult<RandomImage>;

    /// Download `url`. Non-2xx statuses are `Network` errors.
    async fn fetch_bytes(&self, url: &str) -> FetchResult<Bytes>;

    /// Response of the last successful fetch, if any.
    fn last_info(&self) -> Option<RawInfo>;

    /// Artist name from `info` (or the cached info). Never fails.
    fn artist(&self, info: Option<&RawInfo>) -> Option<String>;

    /// Canonical post URL from `info` (or the cached info). Never fails.
    fn source_link(&self, info: Option<&RawInfo>) -> Option<String>;

    /// Stable item id from `info` (or the cached info).
    fn item_id(&self, info: Option<&RawInfo>) -> Option<String>;

    /// `{namespace}_{id}[.{ext}]`, using a timestamp when the id is unknown.
    fn suggest_filename(&self, extension: Option<&str>, info: Option<&RawInfo>) -> String {
        let stem = filename_stem(self.namespace(), self.item_id(info));
        with_extension(&stem, extension)
    }

    /// Build the normalized result for an image this provider returned.
    fn normalize(&self, source_id: &str, image: RandomImage) -> ImageResult {
        let info = Some(&image.info);
        ImageResult {
            source_id: source_id.to_string(),
            artist: self.artist(info),
            source_link: self.source_link(info),
            filename_stem: filename_stem(self.namespace(), self.item_id(info)),
            image_url: image.url,
            raw_info: image.info,
        }
    }
}

fn filename_stem(namespace: &str, id: Option<String>) -> String {
    let id = id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| chrono::Utc::now().timestamp().to_string());
    format!("{namespace}_{id}")
}

fn with_extension(stem: &str, extension: Option<&str>) -> String {
    match extension.map(|e| e.trim_start_matches('.')).filter(|e| !e.is_empty()) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

/// Render a JSON id (string or number) as text.
pub(crate) fn id_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Last-info cache
// ---------------------------------------------------------------------------

/// A provider's cache of its last successful response.
#[derive(Debug, Default)]
pub struct InfoCache {
    last: Mutex<Option<RawInfo>>,
}

impl InfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, info: RawInfo) {
        *self.last.lock() = Some(info);
    }

    pub fn get(&self) -> Option<RawInfo> {
        self.last.lock().clone()
    }

    /// Apply `f` to the supplied info, or to the cached one when `info` is
    /// `None`.
    pub fn with<R>(&self, info: Option<&RawInfo>, f: impl FnOnce(&RawInfo) -> Option<R>) -> Option<R> {
        match info {
            Some(info) => f(info),
            None => self.last.lock().as_ref().and_then(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(stem: &str) -> ImageResult {
        ImageResult {
            source_id: "stub".into(),
            image_url: "https://cdn.test/a/img.webp".into(),
            artist: None,
            source_link: None,
            raw_info: json!({}),
            filename_stem: stem.into(),
        }
    }

    #[test]
    fn artist_label_defaults_to_unknown() {
        let mut r = result("stub_1");
        assert_eq!(r.artist_label(), "Unknown");
        r.artist = Some("ixy".into());
        assert_eq!(r.artist_label(), "ixy");
    }

    #[test]
    fn suggested_filename_with_and_without_extension() {
        let r = result("waifu.im_7261");
        assert_eq!(r.suggested_filename(Some("png")), "waifu.im_7261.png");
        assert_eq!(r.suggested_filename(Some(".png")), "waifu.im_7261.png");
        assert_eq!(r.suggested_filename(Some("")), "waifu.im_7261");
        assert_eq!(r.suggested_filename(None), "waifu.im_7261");
    }

    #[test]
    fn filename_stem_falls_back_to_timestamp() {
        let stem = filename_stem("e621", None);
        let id = stem.strip_prefix("e621_").unwrap();
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_digit()));

        let blank = filename_stem("e621", Some("  ".into()));
        assert_ne!(blank, "e621_  ");
    }

    #[test]
    fn fetched_image_sniffs_png() {
        let png = Bytes::from_static(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR");
        let image = FetchedImage::new(result("nekos.moe_x"), png.clone());
        assert_eq!(image.extension.as_deref(), Some("png"));
        assert_eq!(image.suggested_filename(), "nekos.moe_x.png");
        assert_eq!(image.bytes, png);
    }

    #[test]
    fn fetched_image_falls_back_to_url_extension() {
        let image = FetchedImage::new(result("s_1"), Bytes::from_static(b"not an image"));
        assert_eq!(image.extension.as_deref(), Some("webp"));
    }

    #[test]
    fn fetched_image_saves_bytes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let payload = Bytes::from_static(b"\xff\xd8\xff\xe0 raw jpeg-ish bytes");
        let image = FetchedImage::new(result("s_1"), payload.clone());

        image.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), payload.to_vec());
    }

    #[test]
    fn info_cache_prefers_supplied_info() {
        let cache = InfoCache::new();
        let pick = |v: &RawInfo| v.get("id").and_then(id_to_string);

        assert_eq!(cache.with(None, pick), None);

        cache.store(json!({"id": 7}));
        assert_eq!(cache.with(None, pick).as_deref(), Some("7"));
        assert_eq!(
            cache.with(Some(&json!({"id": "abc"})), pick).as_deref(),
            Some("abc")
        );
    }
}
