use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use relay_broker::{LocalBroker, SourceStatus};
use relay_core::{config::MAX_INGEST_BYTES, RelayConfig};
use relay_hub::Hub;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Central shared state, passed as `Arc<AppState>` to all axum handlers.
pub struct AppState {
    pub config: RelayConfig,
    pub hub: Hub,
    /// Producer side of the in-process broker, fed by `/publish`.
    pub broker: LocalBroker,
    /// Latest connection status reported by the consumer.
    pub broker_status: watch::Receiver<SourceStatus>,
}

impl AppState {
    pub fn new(
        config: RelayConfig,
        hub: Hub,
        broker: LocalBroker,
        broker_status: watch::Receiver<SourceStatus>,
    ) -> Self {
        Self {
            config,
            hub,
            broker,
            broker_status,
        }
    }
}

/// Assemble the full axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let stream_path = state.config.stream.path.clone();
    let cors = state.config.gateway.cors;

    let router = Router::new()
        .route(&stream_path, get(crate::http::sse::stream_handler))
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/publish/{routing_key}",
            post(crate::http::publish::publish_handler)
                .layer(DefaultBodyLimit::max(MAX_INGEST_BYTES)),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use relay_broker::{Binding, Consumer};
    use tower::ServiceExt;

    fn state(config: RelayConfig) -> Arc<AppState> {
        let hub = Hub::default();
        let (broker, source) = LocalBroker::new(4);
        let status = Consumer::new(source, hub.clone(), Binding::catalog_default()).status();
        Arc::new(AppState::new(config, hub, broker, status))
    }

    #[tokio::test]
    async fn stream_path_follows_config() {
        let mut config = RelayConfig::default();
        config.stream.path = "/events".to_string();
        let state = state(config);
        state.hub.shutdown();
        let app = build_router(state);

        let moved = app
            .clone()
            .oneshot(Request::get("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(moved.status(), 503);

        let old = app
            .oneshot(Request::get("/sse/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(old.status(), 404);
    }

    #[tokio::test]
    async fn cors_header_only_when_enabled() {
        let request = || {
            Request::get("/health")
                .header("origin", "http://dashboard.local")
                .body(Body::empty())
                .unwrap()
        };

        let open = build_router(state(RelayConfig::default()))
            .oneshot(request())
            .await
            .unwrap();
        assert!(open.headers().contains_key("access-control-allow-origin"));

        let mut config = RelayConfig::default();
        config.gateway.cors = false;
        let closed = build_router(state(config)).oneshot(request()).await.unwrap();
        assert!(!closed.headers().contains_key("access-control-allow-origin"));
    }
}
