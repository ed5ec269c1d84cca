pub mod preferences;
mod types;

pub use preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences};
pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./nekoview.toml", "~/.config/nekoview/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Resolve the preferences file location, expanding `~`.
pub fn preferences_path(config: &Config) -> PathBuf {
    let raw = config
        .preferences_path
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "~/.config/nekoview/preferences.toml".to_string());
    PathBuf::from(shellexpand::tilde(&raw).as_ref())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.http.metadata_timeout_secs == 0 {
        anyhow::bail!("http.metadata_timeout_secs cannot be 0");
    }
    if config.http.download_timeout_secs == 0 {
        anyhow::bail!("http.download_timeout_secs cannot be 0");
    }

    let e621 = &config.providers.e621;
    if e621.requests_per_second == 0 {
        anyhow::bail!("providers.e621.requests_per_second cannot be 0");
    }
    if e621.user_agent.trim().is_empty() {
        anyhow::bail!("providers.e621.user_agent must identify the client");
    }

    for (name, base) in [
        ("providers.nekos_moe.api_base", &config.providers.nekos_moe.api_base),
        ("providers.waifu_im.api_base", &config.providers.waifu_im.api_base),
        ("providers.e621.api_base", &e621.api_base),
    ] {
        reqwest::Url::parse(base).with_context(|| format!("{name} is not a valid URL: {base}"))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.http.metadata_timeout_secs, 10);
        assert_eq!(config.http.download_timeout_secs, 20);
        assert_eq!(config.providers.e621.requests_per_second, 2);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[providers.waifu_im]
api_base = "http://127.0.0.1:9000"

[http]
max_retries = 0
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.providers.waifu_im.api_base, "http://127.0.0.1:9000");
        assert_eq!(config.http.max_retries, 0);
        assert_eq!(config.http.metadata_timeout_secs, 10);
        assert_eq!(config.providers.nekos_moe.api_base, "https://nekos.moe/api/v1");
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = Config::default();
        config.http.download_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_empty_user_agent() {
        let mut config = Config::default();
        config.providers.e621.user_agent = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_invalid_base_url() {
        let mut config = Config::default();
        config.providers.nekos_moe.api_base = "not a url".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn explicit_preferences_path_is_kept() {
        let config = Config {
            preferences_path: Some(PathBuf::from("/tmp/prefs.toml")),
            ..Default::default()
        };
        assert_eq!(preferences_path(&config), PathBuf::from("/tmp/prefs.toml"));
    }

    #[test]
    fn missing_custom_path_is_an_error() {
        assert!(load_config_or_default(Some(Path::new("/nonexistent/nekoview.toml"))).is_err());
    }
}
