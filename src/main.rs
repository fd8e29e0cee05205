mod classify;
mod config;
mod frame;
mod routes;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

use crate::services::lifecycle::spawn_sweep_task;
use crate::services::session::SessionStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::from_env();
    let port = config.port;

    // Classifier is non-fatal: fall back to keyword lists if the model
    // client cannot be built.
    let classifier = match classify::from_config(config.classifier.as_ref()) {
        Ok(classifier) => classifier,
        Err(e) => {
            tracing::warn!(error = %e, "classifier client not available; using keyword lists");
            std::sync::Arc::new(classify::KeywordClassifier::new())
        }
    };

    let store = SessionStore::new(config.store.clone());
    tracing::info!(
        session_id = %config.store.session_id,
        ttl_secs = config.store.ttl.as_secs(),
        max_participants = config.store.max_participants,
        "session store ready"
    );

    let _sweep = spawn_sweep_task(store.clone(), config.sweep_interval);

    let app = routes::app(state::AppState::new(store, classifier));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "huddle listening");
    axum::serve(listener, app).await.expect("server failed");
}
