//! Process configuration parsed from environment variables.
//!
//! Every variable is optional. Absent or unparsable values fall back to the
//! defaults below; `main` loads `.env` through dotenvy before this runs.

use std::time::Duration;

use crate::classify::ClassifierConfig;
use crate::classify::llm::{DEFAULT_CLASSIFIER_MODEL, DEFAULT_CLASSIFIER_TIMEOUT_SECS};
use crate::services::session::{DEFAULT_MAX_PARTICIPANTS, DEFAULT_SESSION_ID, StoreConfig};
use crate::services::tag::Category;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreConfig,
    pub sweep_interval: Duration,
    /// `None` leaves classification to the keyword lists.
    pub classifier: Option<ClassifierConfig>,
}

impl Config {
    /// Build config from the process environment.
    ///
    /// - `PORT` (3000)
    /// - `SESSION_ID` (`current`)
    /// - `SESSION_TTL_SECS` (86400)
    /// - `SESSION_SWEEP_INTERVAL_SECS` (3600)
    /// - `MAX_PARTICIPANTS` (20)
    /// - `CLASSIFIER_URL` (unset: no model classifier)
    /// - `CLASSIFIER_MODEL` (`llama3.2`)
    /// - `CLASSIFIER_API_KEY` (unset: no bearer token)
    /// - `CLASSIFIER_TIMEOUT_SECS` (10)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup. Tests pass a map instead of
    /// touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_parse = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let port = lookup("PORT")
            .and_then(|v| v.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let ttl_secs = env_parse("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS).max(1);
        let sweep_secs = env_parse("SESSION_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS).max(1);
        let max_participants = usize::try_from(env_parse("MAX_PARTICIPANTS", DEFAULT_MAX_PARTICIPANTS as u64))
            .unwrap_or(DEFAULT_MAX_PARTICIPANTS);

        let store = StoreConfig {
            session_id: non_empty("SESSION_ID").unwrap_or_else(|| DEFAULT_SESSION_ID.to_owned()),
            ttl: Duration::from_secs(ttl_secs),
            max_participants,
            categories: Category::ALL.to_vec(),
        };

        let classifier = non_empty("CLASSIFIER_URL").map(|base_url| ClassifierConfig {
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: non_empty("CLASSIFIER_MODEL").unwrap_or_else(|| DEFAULT_CLASSIFIER_MODEL.to_owned()),
            api_key: non_empty("CLASSIFIER_API_KEY"),
            timeout: Duration::from_secs(env_parse("CLASSIFIER_TIMEOUT_SECS", DEFAULT_CLASSIFIER_TIMEOUT_SECS).max(1)),
        });

        Self { port, store, sweep_interval: Duration::from_secs(sweep_secs), classifier }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
