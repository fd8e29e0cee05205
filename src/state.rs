//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the session store handle and the classifier chain. Both are
//! cheap to clone; all session data lives behind the store's own lock.

use std::sync::Arc;

use crate::classify::Classifier;
use crate::services::session::SessionStore;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub store: SessionStore,
    /// Category classifier used when a tag arrives without one.
    pub classifier: Arc<dyn Classifier>,
}

impl AppState {
    #[must_use]
    pub fn new(store: SessionStore, classifier: Arc<dyn Classifier>) -> Self {
        Self { store, classifier }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::classify::KeywordClassifier;
    use crate::services::session::StoreConfig;

    /// Default store with the keyword classifier.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(SessionStore::new(StoreConfig::default()), Arc::new(KeywordClassifier::new()))
    }

    /// Default store with a caller-supplied classifier.
    #[must_use]
    pub fn test_app_state_with_classifier(classifier: Arc<dyn Classifier>) -> AppState {
        AppState::new(SessionStore::new(StoreConfig::default()), classifier)
    }
}
