use spillway_core::wire::ChunkId;
use spillway_core::{ComponentError, MarkupError};

/// Fatal render failures. A suspension is never one of these.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A chunk outlived its budget and no timeout marker encloses it.
    #[error("chunk {chunk} still pending after {elapsed_ms}ms with no timeout boundary above it")]
    MissingTimeout { chunk: ChunkId, elapsed_ms: u64 },

    #[error("component {component} failed: {source}")]
    Component {
        component: String,
        #[source]
        source: ComponentError,
    },

    #[error(transparent)]
    Markup(#[from] MarkupError),

    #[error("stream receiver dropped")]
    Disconnected,
}
