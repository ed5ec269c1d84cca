//! Shared test harness for integration tests.
//!
//! Provides [`MockGalleries`], a single wiremock server standing in for all
//! three gallery APIs, and a [`Config`] that points every provider at it.

#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nekoview::config::Config;

/// Smallest payload `image::guess_format` recognises as PNG.
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// JPEG magic bytes.
pub const JPEG: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF\0";

/// Mock server hosting the nekos.moe, waifu.im and e621 APIs under
/// `/nekos`, `/waifu` and `/e621`.
pub struct MockGalleries {
    pub server: MockServer,
}

impl MockGalleries {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Config with every provider pointed at this server.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.providers.nekos_moe.api_base = self.url("/nekos/api/v1");
        config.providers.nekos_moe.image_base = self.url("/nekos/image");
        config.providers.nekos_moe.post_base = "https://nekos.moe/post".to_string();
        config.providers.waifu_im.api_base = self.url("/waifu");
        config.providers.e621.api_base = self.url("/e621");
        config.providers.e621.requests_per_second = 50;
        config.http.metadata_timeout_secs = 2;
        config.http.download_timeout_secs = 2;
        config
    }

    /// Serve `bytes` at `route`.
    pub async fn mount_bytes(&self, route: &str, bytes: &[u8]) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.to_vec()))
            .mount(&self.server)
            .await;
    }

    /// Answer the nekos.moe random endpoint with a single image `id`.
    pub async fn mount_nekos(&self, id: &str, artist: &str) {
        Mock::given(method("GET"))
            .and(path("/nekos/api/v1/random/image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(nekos_body(id, artist)))
            .mount(&self.server)
            .await;
        self.mount_bytes(&format!("/nekos/image/{id}"), PNG).await;
    }

    /// Answer the waifu.im search endpoint with a single image served from
    /// this server.
    pub async fn mount_waifu(&self, image_id: u64, artist: Value) {
        let file = format!("/waifu/files/{image_id}.jpg");
        Mock::given(method("GET"))
            .and(path("/waifu/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(waifu_body(image_id, &self.url(&file), artist)),
            )
            .mount(&self.server)
            .await;
        self.mount_bytes(&file, JPEG).await;
    }
}

pub fn nekos_body(id: &str, artist: &str) -> Value {
    json!({
        "images": [{
            "id": id,
            "artist": artist,
            "nsfw": false,
            "tags": ["cat ears"]
        }]
    })
}

pub fn waifu_body(image_id: u64, url: &str, artist: Value) -> Value {
    json!({
        "images": [{
            "image_id": image_id,
            "url": url,
            "source": format!("https://www.pixiv.net/en/artworks/{image_id}"),
            "is_nsfw": false,
            "artist": artist
        }]
    })
}

pub fn e621_body(id: u64, url: Option<&str>, artists: &[&str]) -> Value {
    json!({
        "posts": [{
            "id": id,
            "file": { "url": url, "ext": "png" },
            "tags": { "artist": artists, "general": ["solo"] },
            "rating": "s"
        }]
    })
}
