mod simulation;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use casbin_metrics::config::Configuration;
use casbin_metrics::telemetry::{content_type, encode_text, setup_logging};
use casbin_metrics::{Entry, ObserverError, Recorder};
use prometheus::Registry;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tower_http::trace::TraceLayer;

/// Create router.
fn app(registry: Registry) -> Router {
    Router::new()
        // `GET /metrics` goes to `metrics`.
        .route("/metrics", get(metrics))
        .with_state(registry)
        .layer(TraceLayer::new_for_http())
}

/// Expose every family of the registry.
async fn metrics(State(registry): State<Registry>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, content_type())],
        encode_text(&registry),
    )
}

/// Log each recorded event.
fn log_entry(entry: &Entry) -> Result<(), ObserverError> {
    if entry.kind().is_policy_operation() {
        tracing::info!(
            kind = %entry.kind(),
            rules = entry.rule_count,
            failed = entry.failure.is_some(),
            duration = ?entry.duration(),
            "policy operation"
        );
    } else {
        tracing::info!(
            subject = %entry.subject,
            action = %entry.action,
            object = %entry.object,
            domain = %entry.domain,
            allowed = entry.allowed,
            duration = ?entry.duration(),
            "enforce"
        );
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal, gracefully shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();

    // read configuration file.
    let config = Configuration::default().read();

    let registry = Registry::new();
    let mut recorder = Recorder::builder()
        .registry(&registry)
        .config(&config.metrics)
        .build()?;
    recorder.set_callback(log_entry);
    let recorder = Arc::new(recorder);

    let address = config.simulation.address()?;
    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!(%address, "metrics available on /metrics");

    let simulation = tokio::spawn(simulation::run(
        Arc::clone(&recorder),
        config.simulation.clone(),
        StdRng::from_entropy(),
    ));

    axum::serve(listener, app(registry))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    simulation.abort();
    recorder.unregister();
    tracing::info!("simulation stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use casbin_metrics::EventKind;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn get_metrics(registry: &Registry) -> (StatusCode, String, String) {
        let response = app(registry.clone())
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let registry = Registry::new();
        let mut recorder = Recorder::with_registry(&registry).unwrap();
        recorder.set_callback(log_entry);

        let mut entry = Entry::enforce("alice", "data1", "read", "domain1");
        recorder.on_before(&mut entry);
        entry.allowed = true;
        recorder.on_after(&mut entry).unwrap();

        let mut entry = Entry::new(EventKind::RemovePolicy).rules(2);
        recorder.on_before(&mut entry);
        recorder.on_after(&mut entry).unwrap();

        let (status, content_type, body) = get_metrics(&registry).await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains(
            r#"casbin_enforce_total{allowed="true",domain="domain1"} 1"#
        ));
        assert!(body.contains(
            r#"casbin_policy_rules_count{operation="removePolicy"} 2"#
        ));

        recorder.unregister();
        let (_, _, body) = get_metrics(&registry).await;
        assert!(!body.contains("casbin_"));
    }
}
