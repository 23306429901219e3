//! Logging and metrics exposition.

use crate::Error;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use prometheus_client::{encoding::text::encode, registry::Registry};
use std::{net::SocketAddr, sync::Arc};
use swarm_utils::signal::Signal;
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

/// Content type of the Prometheus text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init(level: &str, json: bool) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_line_number(true)
            .with_file(true)
    });
    let text_layer = (!json).then(tracing_subscriber::fmt::layer);
    let subscriber = tracing_subscriber::Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| Error::Telemetry(err.to_string()))
}

async fn metrics(Extension(registry): Extension<Arc<Registry>>) -> Response {
    let mut body = String::new();
    if let Err(err) = encode(&mut body, &registry) {
        error!(?err, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

/// Serve `registry` at `/metrics` until shutdown.
///
/// Returns the bound address (useful when binding to port 0).
pub async fn serve(
    address: SocketAddr,
    registry: Registry,
    shutdown: Signal,
) -> Result<(SocketAddr, JoinHandle<()>), Error> {
    let listener = TcpListener::bind(address).await?;
    let address = listener.local_addr()?;
    let app = Router::new()
        .route("/metrics", get(metrics))
        .layer(Extension(Arc::new(registry)));
    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!(?err, "metrics server failed");
        }
    });
    Ok((address, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::metrics::counter::Counter;
    use swarm_utils::signal::Signaler;

    #[tokio::test]
    async fn test_serve_metrics() {
        let mut registry = Registry::default();
        let counter: Counter = Counter::default();
        registry
            .sub_registry_with_prefix("simulator")
            .register("windows", "Number of windows", counter.clone());
        counter.inc_by(3);

        let (signaler, signal) = Signaler::new();
        let (address, handle) = serve(SocketAddr::from(([127, 0, 0, 1], 0)), registry, signal)
            .await
            .unwrap();

        let response = reqwest::get(format!("http://{address}/metrics"))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()[reqwest::header::CONTENT_TYPE],
            CONTENT_TYPE
        );
        let body = response.text().await.unwrap();
        assert!(body.contains("simulator_windows_total 3"));

        // Stops on shutdown
        let _completion = signaler.signal();
        handle.await.unwrap();
    }
}
