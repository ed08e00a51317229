use std::sync::Arc;

use pipeline_core::GenerationLocks;
use pipeline_provider::{ChatProvider, SpeechProvider};
use pipeline_store::Store;

/// Shared application state accessible from all route handlers.
///
/// The provider and speech clients come in as trait objects so tests can
/// substitute scripted doubles; nothing below this point knows which
/// backend is wired in.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub provider: Arc<dyn ChatProvider>,
    pub speech: Arc<dyn SpeechProvider>,
    pub locks: GenerationLocks,
    /// Completion model used for both turn passes.
    pub model: String,
    /// Default synthesis voice.
    pub voice: String,
}
