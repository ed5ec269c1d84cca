//! Single-flight fetch orchestration.
//!
//! The [`FetchOrchestrator`] owns the [`FetchState`]. A request resolves the
//! provider, then runs `fetch_random_image_url` followed by `fetch_bytes` on a
//! spawned task. The outcome is posted back as a [`FetchCompletion`] and
//! applied with [`FetchOrchestrator::complete`] on the owning task. Every
//! request carries a generation number; completions from older generations
//! are dropped.

use std::sync::Arc;

use nekoview_common::{FetchError, FetchResult, NsfwMode};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::source::{FetchedImage, ProviderRegistry, SourceProvider};

/// Outcome of one fetch, tagged with the generation that requested it.
#[derive(Debug)]
pub struct FetchCompletion {
    pub generation: u64,
    pub source_id: String,
    pub outcome: FetchResult<FetchedImage>,
}

/// Notification delivered to callers.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    /// A fetch was accepted and is now in flight.
    Started { source_id: String },
    /// A fetch succeeded; the image is now the current result.
    Loaded(Arc<FetchedImage>),
    /// A fetch failed; the previous result is still current.
    Failed { source_id: String, error: FetchError },
}

/// Transient fetch state owned by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    is_loading: bool,
    last_result: Option<Arc<FetchedImage>>,
    last_error: Option<FetchError>,
}

impl FetchState {
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// The most recent successful fetch. Survives later failures.
    pub fn last_result(&self) -> Option<&Arc<FetchedImage>> {
        self.last_result.as_ref()
    }

    /// Error of the most recent fetch, cleared by the next success.
    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }
}

/// Drives "fetch a random image from the selected source".
pub struct FetchOrchestrator {
    registry: Arc<ProviderRegistry>,
    state: FetchState,
    generation: u64,
    completions: mpsc::Sender<FetchCompletion>,
}

impl FetchOrchestrator {
    /// Create an idle orchestrator that posts completions on `completions`.
    pub fn new(registry: Arc<ProviderRegistry>, completions: mpsc::Sender<FetchCompletion>) -> Self {
        Self {
            registry,
            state: FetchState::default(),
            generation: 0,
            completions,
        }
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Start fetching from `source_id` (or the registry's first source).
    ///
    /// Returns `None` without doing anything while a fetch is already in
    /// flight. Otherwise the fetch is spawned and a `Started` event returned.
    /// Must be called from within a Tokio runtime.
    pub fn request_fetch(&mut self, source_id: Option<&str>, mode: NsfwMode) -> Option<FetchEvent> {
        if self.state.is_loading {
            debug!(generation = self.generation, "Fetch already in flight; ignoring request");
            return None;
        }

        self.state.is_loading = true;
        self.generation += 1;
        let generation = self.generation;
        let tx = self.completions.clone();

        let (resolved_id, provider) = match self.registry.get(source_id) {
            Ok(descriptor) => (descriptor.id.clone(), Some(Arc::clone(&descriptor.provider))),
            Err(_) => (source_id.unwrap_or_default().to_string(), None),
        };

        info!(source_id = %resolved_id, mode = %mode, generation, "Fetching random image");

        let task_source_id = resolved_id.clone();
        tokio::spawn(async move {
            let outcome = match provider {
                Some(provider) => run_fetch(provider.as_ref(), &task_source_id, mode).await,
                None => Err(FetchError::NoProvidersConfigured),
            };
            let completion = FetchCompletion {
                generation,
                source_id: task_source_id,
                outcome,
            };
            if tx.send(completion).await.is_err() {
                debug!(generation, "Completion receiver dropped; discarding result");
            }
        });

        Some(FetchEvent::Started {
            source_id: resolved_id,
        })
    }

    /// Apply a completion posted by a fetch task.
    ///
    /// Returns the event to deliver, or `None` for a stale generation.
    pub fn complete(&mut self, completion: FetchCompletion) -> Option<FetchEvent> {
        if completion.generation != self.generation || !self.state.is_loading {
            debug!(
                generation = completion.generation,
                current = self.generation,
                "Discarding stale fetch completion"
            );
            return None;
        }

        self.state.is_loading = false;
        match completion.outcome {
            Ok(image) => {
                let image = Arc::new(image);
                info!(
                    source_id = %completion.source_id,
                    url = %image.result.image_url,
                    bytes = image.bytes.len(),
                    "Image loaded"
                );
                self.state.last_result = Some(Arc::clone(&image));
                self.state.last_error = None;
                Some(FetchEvent::Loaded(image))
            }
            Err(error) => {
                warn!(
                    source_id = %completion.source_id,
                    error = %error,
                    "Fetch failed; keeping previous image"
                );
                self.state.last_error = Some(error.clone());
                Some(FetchEvent::Failed {
                    source_id: completion.source_id,
                    error,
                })
            }
        }
    }

    /// Abandon the in-flight fetch, if any. Its completion will be discarded.
    ///
    /// Returns `true` if a fetch was in flight.
    pub fn invalidate(&mut self) -> bool {
        let was_loading = self.state.is_loading;
        self.generation += 1;
        self.state.is_loading = false;
        if was_loading {
            debug!(generation = self.generation, "In-flight fetch invalidated");
        }
        was_loading
    }
}

async fn run_fetch(
    provider: &dyn SourceProvider,
    source_id: &str,
    mode: NsfwMode,
) -> FetchResult<FetchedImage> {
    let image = provider.fetch_random_image_url(mode).await?;
    let result = provider.normalize(source_id, image);
    let bytes = provider.fetch_bytes(&result.image_url).await?;
    Ok(FetchedImage::new(result, bytes))
}
