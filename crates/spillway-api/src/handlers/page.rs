//! GET /: streams the application as an HTML document.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;

use spillway_core::wire::StreamEvent;
use spillway_core::ScriptEncoder;
use spillway_render::{RenderOptions, RenderSession};

use super::{ApiState, PageQuery};

pub async fn handle_page(
    State(state): State<ApiState>,
    Query(query): Query<PageQuery>,
) -> Response {
    let root = (state.app)(&query);
    let options = RenderOptions::from_config(&state.render);
    let (session, events) = RenderSession::channel(root, options);

    let counters = state.counters.clone();
    counters.started();
    tokio::spawn(async move {
        match session.run().await {
            Ok(stats) => {
                counters.finished();
                tracing::debug!(?stats, "page rendered");
            }
            Err(e) => {
                counters.failed();
                tracing::warn!(error = %e, "page render failed");
            }
        }
    });

    let encoder = ScriptEncoder::new(state.render.document_title.clone());
    let body = Body::from_stream(document_stream(encoder, events));
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body).into_response()
}

/// Prelude followed by one script per event. Ends when the session drops
/// its sink.
pub fn document_stream(
    encoder: ScriptEncoder,
    events: UnboundedReceiver<StreamEvent>,
) -> impl Stream<Item = Result<Bytes, serde_json::Error>> + Send + 'static {
    let prelude = stream::once(futures::future::ready(Ok(Bytes::from(encoder.prelude()))));
    let scripts = stream::unfold((encoder, events), |(encoder, mut events)| async move {
        let event = events.recv().await?;
        let chunk = encoder.encode(&event).map(Bytes::from);
        Some((chunk, (encoder, events)))
    });
    prelude.chain(scripts)
}
