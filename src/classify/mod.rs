//! Category classifier — guesses a tag's category when the client omits it.
//!
//! DESIGN
//! ======
//! `Classifier` is a narrow async trait so the gateway can hold either a
//! remote model or the local word lists behind one `Arc<dyn Classifier>`,
//! and tests can swap in a mock. Classification always runs in the gateway
//! before the store is touched; nothing here is called under the store lock.
//!
//! `FallbackClassifier` wraps a primary classifier with the keyword lists:
//! a primary error or a primary "don't know" both defer to the keywords.

pub mod keyword;
pub mod llm;

use std::sync::Arc;

use tracing::{info, warn};

use crate::frame::ErrorCode;
use crate::services::tag::Category;

pub use keyword::KeywordClassifier;
pub use llm::{ClassifierConfig, LlmClassifier};

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("classifier request failed: {0}")]
    Request(String),

    #[error("classifier responded with status {status}")]
    Response { status: u16, body: String },

    #[error("classifier response parse failed: {0}")]
    Parse(String),

    #[error("classifier HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for ClassifyError {
    fn error_code(&self) -> &'static str {
        "E_CLASSIFIER"
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// TRAIT
// =============================================================================

/// Map free tag text to one of the fixed categories.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// `Ok(None)` means the classifier has no opinion.
    ///
    /// # Errors
    ///
    /// Returns a [`ClassifyError`] if a remote classifier could not be
    /// reached or its reply could not be read.
    async fn classify(&self, text: &str) -> Result<Option<Category>, ClassifyError>;
}

/// Primary classifier with the keyword lists behind it.
pub struct FallbackClassifier {
    primary: Arc<dyn Classifier>,
    fallback: KeywordClassifier,
}

impl FallbackClassifier {
    #[must_use]
    pub fn new(primary: Arc<dyn Classifier>) -> Self {
        Self { primary, fallback: KeywordClassifier::new() }
    }
}

#[async_trait::async_trait]
impl Classifier for FallbackClassifier {
    async fn classify(&self, text: &str) -> Result<Option<Category>, ClassifyError> {
        match self.primary.classify(text).await {
            Ok(Some(category)) => return Ok(Some(category)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, text, "classifier failed; using keyword lists"),
        }
        self.fallback.classify(text).await
    }
}

/// Build the classifier chain: the model endpoint when configured, keyword
/// lists otherwise.
///
/// # Errors
///
/// Returns an error if the HTTP client for the model endpoint fails to build.
pub fn from_config(config: Option<&ClassifierConfig>) -> Result<Arc<dyn Classifier>, ClassifyError> {
    let Some(config) = config else {
        info!("classifier: keyword lists only");
        return Ok(Arc::new(KeywordClassifier::new()));
    };
    let llm = LlmClassifier::new(config)?;
    info!(base_url = %config.base_url, model = %config.model, "classifier: model endpoint with keyword fallback");
    Ok(Arc::new(FallbackClassifier::new(Arc::new(llm))))
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
