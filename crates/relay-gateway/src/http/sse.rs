//! `GET /sse/events`: one long-lived event stream per viewer.
//!
//! Each hub delivery becomes one SSE event: `id` carries the sequence
//! number, `data` the `{"type","data"}` frame. The stream owns the hub
//! subscription, so a client disconnect (axum dropping the stream), a slow
//! disconnect and hub shutdown all end in the same unsubscribe.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use relay_hub::{HubError, Subscription};
use relay_protocol::StreamFrame;
use serde_json::{json, Value};
use tracing::{info, trace, warn};

use crate::app::AppState;

pub async fn stream_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let subscription = state.hub.subscribe().map_err(|e| {
        warn!(error = %e, "rejecting viewer");
        let status = match e {
            HubError::Closed => StatusCode::SERVICE_UNAVAILABLE,
            HubError::InvalidCapacity(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": e.to_string() })))
    })?;

    let mut viewer = Viewer(subscription);
    info!(
        subscriber = %viewer.0.id(),
        viewers = state.hub.subscriber_count(),
        "viewer connected"
    );

    let stream = async_stream::stream! {
        while let Some(delivery) = viewer.0.recv().await {
            let frame = StreamFrame::from_envelope(&delivery.envelope);
            trace!(
                subscriber = %viewer.0.id(),
                seq = delivery.seq,
                event = frame.event_type,
                "frame"
            );
            yield Ok::<_, Infallible>(Event::default()
                .id(delivery.seq.to_string())
                .data(frame.to_json()));
        }
    };

    // keep_alive wraps the stream type, so each arm becomes a Response
    let sse = Sse::new(stream);
    Ok(match state.config.stream.keepalive_secs {
        0 => sse.into_response(),
        secs => sse
            .keep_alive(KeepAlive::new().interval(Duration::from_secs(secs)))
            .into_response(),
    })
}

/// Logs the end of a viewer's stream; the wrapped subscription unsubscribes
/// itself when dropped.
struct Viewer(Subscription);

impl Drop for Viewer {
    fn drop(&mut self) {
        info!(
            subscriber = %self.0.id(),
            connected_since = %self.0.connected_since(),
            "viewer disconnected"
        );
    }
}
