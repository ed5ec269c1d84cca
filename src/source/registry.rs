//! Provider registry mapping stable source ids to [`SourceProvider`]s.
//!
//! The [`ProviderRegistry`] keeps sources in registration order for display
//! and resolves lookups by id, falling back to the first-registered source for
//! unknown or missing ids. It is built once at startup and shared read-only.

use std::fmt;
use std::sync::Arc;

use nekoview_common::{FetchError, FetchResult};
use tracing::warn;

use super::provider::SourceProvider;
use super::providers::{E621Provider, NekosMoeProvider, WaifuImProvider};
use crate::config::{Config, Preferences};

/// Immutable description of one registered source.
#[derive(Clone)]
pub struct SourceDescriptor {
    /// Stable key, unique across the registry (e.g. `"waifu_im"`).
    pub id: String,
    /// Name shown to users.
    pub display_name: String,
    /// One-line description shown to users.
    pub description: String,
    /// The implementation behind this source.
    pub provider: Arc<dyn SourceProvider>,
}

impl SourceDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        provider: Arc<dyn SourceProvider>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: description.into(),
            provider,
        }
    }
}

impl fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("namespace", &self.provider.namespace())
            .finish()
    }
}

/// A registry of image sources, in registration order.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use nekoview::source::{ProviderRegistry, SourceDescriptor};
///
/// let mut registry = ProviderRegistry::new();
/// registry.register(SourceDescriptor::new("mine", "Mine", "My gallery", Arc::new(my_provider)));
///
/// let source = registry.get(Some("unknown"))?; // falls back to "mine"
/// ```
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    sources: Vec<SourceDescriptor>,
}

impl ProviderRegistry {
    /// Create an empty registry with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in sources: nekos.moe, waifu.im and e621.
    ///
    /// `prefs` supplies the free-text tag filter for e621.
    pub fn with_defaults(config: &Config, prefs: Option<Preferences>) -> anyhow::Result<Self> {
        let mut registry = Self::new();
        registry.register(SourceDescriptor::new(
            "nekos_moe",
            "nekos.moe",
            "Catgirl artwork from nekos.moe",
            Arc::new(NekosMoeProvider::new(
                config.providers.nekos_moe.clone(),
                &config.http,
            )?),
        ));
        registry.register(SourceDescriptor::new(
            "waifu_im",
            "waifu.im",
            "Anime artwork from waifu.im",
            Arc::new(WaifuImProvider::new(
                config.providers.waifu_im.clone(),
                &config.http,
            )?),
        ));
        registry.register(SourceDescriptor::new(
            "e621",
            "e621",
            "Furry artwork from e621, filtered by your tags",
            Arc::new(E621Provider::new(
                config.providers.e621.clone(),
                &config.http,
                prefs,
            )?),
        ));
        Ok(registry)
    }

    /// Register a source.
    ///
    /// A duplicate id replaces the earlier descriptor in place, so the last
    /// registration wins while the display order stays stable.
    pub fn register(&mut self, descriptor: SourceDescriptor) {
        if let Some(existing) = self.sources.iter_mut().find(|s| s.id == descriptor.id) {
            warn!(source_id = %descriptor.id, "Duplicate source id registered; replacing");
            *existing = descriptor;
        } else {
            self.sources.push(descriptor);
        }
    }

    /// Look up a source by id.
    ///
    /// Unknown or missing ids resolve to the first-registered source. Fails
    /// only when the registry is empty.
    pub fn get(&self, id: Option<&str>) -> FetchResult<&SourceDescriptor> {
        id.and_then(|id| self.sources.iter().find(|s| s.id == id))
            .or_else(|| self.sources.first())
            .ok_or(FetchError::NoProvidersConfigured)
    }

    /// All sources in registration order.
    pub fn list(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sources.iter().any(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
