//! spillway-render — streaming, suspension-aware rendering of UI
//! descriptions.
//!
//! A [`RenderSession`] renders a description into fragments, parks subtrees
//! that wait on pending values, retries them as values resolve or budgets run
//! out, and commits each boundary once its content is complete.

pub mod boundary;
pub mod chunk;
pub mod error;
pub mod evaluator;
mod renderer;
pub mod session;
pub mod stream;

pub use boundary::{BoundaryKey, BoundaryManager, BoundaryStatus, Interception};
pub use chunk::{ChunkKey, ChunkKind, ChunkStatus};
pub use error::RenderError;
pub use evaluator::{ComponentEvaluator, DirectEvaluator, Evaluation};
pub use session::{RenderOptions, RenderSession, SessionStats};
pub use stream::EventSink;
