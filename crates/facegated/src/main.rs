use anyhow::{Context, Result};
use axum::http::HeaderValue;
use facegate_core::EuclideanMatcher;
use std::future::Future;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod http;
mod store;

use config::Config;
use engine::MatchSettings;
use store::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facegated starting");

    let config = Config::load().context("loading configuration")?;
    tracing::info!(
        listen = %config.listen,
        db = %config.db_path.display(),
        threshold = config.match_threshold,
        dim = config.embedding_dim,
        "configuration loaded"
    );

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("opening enrollment store {}", config.db_path.display()))?;

    let engine = engine::spawn_engine(
        store,
        EuclideanMatcher,
        MatchSettings {
            threshold: config.match_threshold,
            embedding_dim: config.embedding_dim,
        },
        config.queue_depth,
    )?;

    let app = http::router(engine, cors_layer(&config.allowed_origins));
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;

    tracing::info!(addr = %config.listen, "facegated ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tokio::signal::ctrl_c()))
        .await?;

    tracing::info!("facegated shutting down");
    Ok(())
}

/// Resolves once the signal fires. If the handler could not be installed
/// the server keeps running and has to be stopped some other way.
async fn shutdown_signal(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_on_signal() {
        let fired = async { Ok::<(), std::io::Error>(()) };
        tokio::time::timeout(Duration::from_secs(1), shutdown_signal(fired))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_signal_error_keeps_serving() {
        let failed = async { Err::<(), _>(std::io::Error::other("no signal handler")) };
        assert!(
            tokio::time::timeout(Duration::from_millis(50), shutdown_signal(failed))
                .await
                .is_err()
        );
    }

    #[test]
    fn test_cors_skips_invalid_origins() {
        // Must not panic on a header value with control characters.
        let _ = cors_layer(&["http://localhost:3000".into(), "bad\norigin".into()]);
    }
}
