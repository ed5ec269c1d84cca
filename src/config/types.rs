use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub http: HttpConfig,

    /// Where user preferences are stored (default: ~/.config/nekoview/preferences.toml)
    #[serde(default)]
    pub preferences_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub nekos_moe: NekosMoeConfig,

    #[serde(default)]
    pub waifu_im: WaifuImConfig,

    #[serde(default)]
    pub e621: E621Config,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NekosMoeConfig {
    #[serde(default = "default_nekos_api_base")]
    pub api_base: String,

    /// Image URLs are `{image_base}/{id}`
    #[serde(default = "default_nekos_image_base")]
    pub image_base: String,

    /// Post pages are `{post_base}/{id}`
    #[serde(default = "default_nekos_post_base")]
    pub post_base: String,
}

fn default_nekos_api_base() -> String {
    "https://nekos.moe/api/v1".to_string()
}
fn default_nekos_image_base() -> String {
    "https://nekos.moe/image".to_string()
}
fn default_nekos_post_base() -> String {
    "https://nekos.moe/post".to_string()
}

impl Default for NekosMoeConfig {
    fn default() -> Self {
        Self {
            api_base: default_nekos_api_base(),
            image_base: default_nekos_image_base(),
            post_base: default_nekos_post_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaifuImConfig {
    #[serde(default = "default_waifu_api_base")]
    pub api_base: String,
}

fn default_waifu_api_base() -> String {
    "https://api.waifu.im".to_string()
}

impl Default for WaifuImConfig {
    fn default() -> Self {
        Self {
            api_base: default_waifu_api_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct E621Config {
    #[serde(default = "default_e621_api_base")]
    pub api_base: String,

    #[serde(default = "default_e621_post_base")]
    pub post_base: String,

    /// e621 rejects requests without a descriptive User-Agent
    #[serde(default = "default_e621_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_e621_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_e621_api_base() -> String {
    "https://e621.net".to_string()
}
fn default_e621_post_base() -> String {
    "https://e621.net/posts".to_string()
}
fn default_e621_user_agent() -> String {
    format!("nekoview/{} (random image viewer)", env!("CARGO_PKG_VERSION"))
}
fn default_e621_requests_per_second() -> u32 {
    2
}

impl Default for E621Config {
    fn default() -> Self {
        Self {
            api_base: default_e621_api_base(),
            post_base: default_e621_post_base(),
            user_agent: default_e621_user_agent(),
            requests_per_second: default_e621_requests_per_second(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    /// Timeout for the random-image metadata request
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,

    /// Timeout for downloading the image bytes
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Retries after an HTTP 429 before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_metadata_timeout() -> u64 {
    10
}
fn default_download_timeout() -> u64 {
    20
}
fn default_max_retries() -> u32 {
    3
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            metadata_timeout_secs: default_metadata_timeout(),
            download_timeout_secs: default_download_timeout(),
            max_retries: default_max_retries(),
        }
    }
}
