//! Render session: one streamed render, from the root fragment to `finish`.
//!
//! A session owns its chunk arena, boundaries, id counter and pending set.
//! All of that state is touched only from [`RenderSession::run`]: pending
//! values and budget timers are awaited in spawned tasks that report back
//! over a channel, and each report is handled between passes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use spillway_core::config::RenderConfig;
use spillway_core::wire::{
    BoundaryId, ChunkId, SlotId, StreamEvent, EMPTY_CHUNK, FIRST_DYNAMIC_ID, ROOT_BOUNDARY,
};
use spillway_core::{HtmlEncoder, MarkupEncoder, Node, PendingValue};

use crate::boundary::{BoundaryKey, BoundaryManager, Interception};
use crate::chunk::{Chunk, ChunkArena, ChunkKey, ChunkState, ChunkStatus};
use crate::error::RenderError;
use crate::evaluator::{ComponentEvaluator, DirectEvaluator};
use crate::stream::{commit_log, EventSink};

#[derive(Clone)]
pub struct RenderOptions {
    /// Budget for chunks with no timeout marker above them, and for markers
    /// without a duration of their own.
    pub default_timeout: Duration,
    pub evaluator: Arc<dyn ComponentEvaluator>,
    pub encoder: Arc<dyn MarkupEncoder>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

impl RenderOptions {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            default_timeout: config.default_timeout(),
            evaluator: Arc::new(DirectEvaluator),
            encoder: Arc::new(HtmlEncoder),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ComponentEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn MarkupEncoder>) -> Self {
        self.encoder = encoder;
        self
    }
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub chunks: usize,
    pub boundaries: usize,
    pub fragments: usize,
    pub commits: usize,
    pub retries: usize,
    pub fallbacks: usize,
}

/// One counter shared by chunks, slots and boundaries.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    fn new() -> Self {
        Self {
            next: FIRST_DYNAMIC_ID,
        }
    }

    fn next(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub(crate) fn chunk(&mut self) -> ChunkId {
        ChunkId(self.next())
    }

    pub(crate) fn slot(&mut self) -> SlotId {
        SlotId(self.next())
    }

    pub(crate) fn boundary(&mut self) -> BoundaryId {
        BoundaryId(self.next())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WakeCause {
    Resolved,
    Deadline,
}

/// Report from a waiter task: retry `chunk` if it is still in suspension
/// `epoch`.
#[derive(Debug, Clone, Copy)]
struct Wake {
    boundary: BoundaryKey,
    chunk: ChunkKey,
    epoch: u64,
    cause: WakeCause,
}

pub struct RenderSession {
    root: Option<Node>,
    root_boundary: Option<BoundaryKey>,
    pub(crate) chunks: ChunkArena,
    pub(crate) boundaries: BoundaryManager,
    pub(crate) ids: IdAllocator,
    pub(crate) evaluator: Arc<dyn ComponentEvaluator>,
    pub(crate) encoder: Arc<dyn MarkupEncoder>,
    pub(crate) sink: EventSink,
    /// Boundaries opened during the current pass, rendered after it.
    pub(crate) queue: VecDeque<BoundaryKey>,
    pub(crate) stats: SessionStats,
    wake_tx: mpsc::UnboundedSender<Wake>,
    wake_rx: mpsc::UnboundedReceiver<Wake>,
    waiters: JoinSet<()>,
    next_epoch: u64,
    finished: bool,
}

impl RenderSession {
    pub fn new(root: Node, sink: EventSink, options: RenderOptions) -> Self {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        Self {
            root: Some(root),
            root_boundary: None,
            chunks: ChunkArena::default(),
            boundaries: BoundaryManager::new(options.default_timeout),
            ids: IdAllocator::new(),
            evaluator: options.evaluator,
            encoder: options.encoder,
            sink,
            queue: VecDeque::new(),
            stats: SessionStats::default(),
            wake_tx,
            wake_rx,
            waiters: JoinSet::new(),
            next_epoch: 0,
            finished: false,
        }
    }

    /// A session together with the receiving end of its event stream.
    pub fn channel(
        root: Node,
        options: RenderOptions,
    ) -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (sink, events) = EventSink::channel();
        (Self::new(root, sink, options), events)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            chunks: self.chunks.len(),
            boundaries: self.boundaries.len(),
            ..self.stats
        }
    }

    /// Key of boundary `1`, once started.
    pub fn root_boundary(&self) -> Option<BoundaryKey> {
        self.root_boundary
    }

    pub fn chunks(&self) -> &ChunkArena {
        &self.chunks
    }

    pub fn boundaries(&self) -> &BoundaryManager {
        &self.boundaries
    }

    /// Render the root description inside the root boundary. Subsequent
    /// calls do nothing.
    pub fn start(&mut self) -> Result<(), RenderError> {
        let Some(node) = self.root.take() else {
            return Ok(());
        };
        let root = self.chunks.insert(Chunk::root(node));
        let boundary = self.boundaries.open(ROOT_BOUNDARY, root, Instant::now());
        self.root_boundary = Some(boundary);
        self.pass(boundary)
    }

    /// Drive the session until every boundary has committed.
    ///
    /// Stops early with [`RenderError::Disconnected`] if the event receiver
    /// is dropped. A pending value that never resolves keeps the session
    /// waiting.
    pub async fn run(mut self) -> Result<SessionStats, RenderError> {
        let started = Instant::now();
        self.start()?;
        let sink = self.sink.clone();
        while !self.finished {
            tokio::select! {
                _ = sink.closed() => {
                    tracing::info!("event receiver dropped, stopping render");
                    return Err(RenderError::Disconnected);
                }
                Some(wake) = self.wake_rx.recv() => {
                    self.wake(wake)?;
                }
            }
        }
        let stats = self.stats();
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            fragments = stats.fragments,
            commits = stats.commits,
            fallbacks = stats.fallbacks,
            "render finished"
        );
        Ok(stats)
    }

    /// Replay a suspended chunk. Does nothing if the boundary has settled or
    /// the chunk is no longer suspended.
    pub fn retry(&mut self, boundary: BoundaryKey, key: ChunkKey) -> Result<(), RenderError> {
        if !self.boundaries.is_pending(boundary) {
            tracing::trace!(boundary = %self.boundaries[boundary].id, "retry on settled boundary");
            return Ok(());
        }
        let chunk = &mut self.chunks[key];
        if !chunk.is_suspended() {
            return Ok(());
        }
        chunk.status = ChunkStatus::Pending;
        chunk.effects.clear();
        chunk.suspension = None;
        self.stats.retries += 1;
        self.pass(boundary)
    }

    fn wake(&mut self, wake: Wake) -> Result<(), RenderError> {
        while self.waiters.try_join_next().is_some() {}
        let chunk = &self.chunks[wake.chunk];
        if !chunk.is_suspended() || chunk.suspension != Some(wake.epoch) {
            tracing::trace!(epoch = wake.epoch, cause = ?wake.cause, "stale wake");
            return Ok(());
        }
        tracing::trace!(chunk = ?chunk.id, cause = ?wake.cause, "wake");
        self.retry(wake.boundary, wake.chunk)
    }

    /// Render `boundary` and every boundary opened while doing so, commit
    /// those that completed, and finish the stream once nothing is pending.
    pub(crate) fn pass(&mut self, boundary: BoundaryKey) -> Result<(), RenderError> {
        self.queue.push_back(boundary);
        while let Some(next) = self.queue.pop_front() {
            self.render_boundary(next)?;
        }
        if self.boundaries.is_settled() && !self.finished {
            self.finished = true;
            self.sink.finish()?;
        }
        Ok(())
    }

    fn render_boundary(&mut self, boundary: BoundaryKey) -> Result<(), RenderError> {
        if !self.boundaries.is_pending(boundary) {
            return Ok(());
        }
        let root = self.boundaries[boundary].root;
        self.render_chunk(boundary, root, None)?;
        if self.boundaries.is_pending(boundary) && self.chunks[root].is_complete() {
            self.commit(boundary)?;
        }
        Ok(())
    }

    fn commit(&mut self, boundary: BoundaryKey) -> Result<(), RenderError> {
        let id = self.boundaries[boundary].id;
        let log = commit_log(&self.chunks, self.boundaries[boundary].root);
        self.boundaries.commit(boundary);
        self.stats.commits += 1;
        self.sink.commit(id, log)
    }

    /// A chunk in `boundary` reported `value`: suspend it, show the
    /// fallback of its timeout marker, or fail.
    pub(crate) fn intercept(
        &mut self,
        boundary: BoundaryKey,
        key: ChunkKey,
        value: PendingValue,
    ) -> Result<(), RenderError> {
        let elapsed = Instant::now().saturating_duration_since(self.boundaries[boundary].started_at);
        let marker = self.chunks.nearest_timeout(key);
        let expired = marker.is_some_and(|m| self.chunks[m].is_expired());
        let budget = self.chunks[key].timeout;
        match self.boundaries.intercept(elapsed, budget, marker, expired) {
            Interception::Wait { deadline } => {
                self.suspend(boundary, key, value, deadline);
                Ok(())
            }
            Interception::Fallback(marker) => self.show_fallback(boundary, key, marker, value),
            Interception::Missing => Err(RenderError::MissingTimeout {
                chunk: self.chunks[key].id.unwrap_or(EMPTY_CHUNK),
                elapsed_ms: elapsed.as_millis() as u64,
            }),
        }
    }

    fn suspend(
        &mut self,
        boundary: BoundaryKey,
        key: ChunkKey,
        value: PendingValue,
        deadline: Option<Duration>,
    ) {
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        let chunk = &mut self.chunks[key];
        chunk.status = ChunkStatus::Suspended;
        chunk.effects = vec![value.clone()];
        chunk.suspension = Some(epoch);
        tracing::debug!(
            chunk = ?chunk.id,
            value = value.label(),
            deadline_ms = deadline.map(|d| d.as_millis() as u64),
            "suspended"
        );

        let tx = self.wake_tx.clone();
        self.waiters.spawn(async move {
            let cause = match deadline {
                Some(deadline) => tokio::select! {
                    _ = value.resolved() => WakeCause::Resolved,
                    _ = tokio::time::sleep(deadline) => WakeCause::Deadline,
                },
                None => {
                    value.resolved().await;
                    WakeCause::Resolved
                }
            };
            let _ = tx.send(Wake {
                boundary,
                chunk: key,
                epoch,
                cause,
            });
        });
    }

    /// Budget of `boundary` is spent. Its root restarts with the marker's
    /// fallback, while a new boundary in the same region waits on `value`
    /// to render the real content again.
    fn show_fallback(
        &mut self,
        boundary: BoundaryKey,
        key: ChunkKey,
        marker: ChunkKey,
        value: PendingValue,
    ) -> Result<(), RenderError> {
        let Node::Timeout(timeout) = self.chunks[marker].node.clone() else {
            return Err(RenderError::MissingTimeout {
                chunk: self.chunks[key].id.unwrap_or(EMPTY_CHUNK),
                elapsed_ms: 0,
            });
        };

        let parent = &self.chunks[marker];
        let content = Chunk::new(
            timeout.render(false),
            Some(marker),
            parent.timeout,
            parent.namespace,
            parent.context.clone(),
        );
        let content = self.chunks.insert(content);
        let resumed = self.boundaries.open_resumed(boundary, content);

        let parent = &mut self.chunks[marker];
        parent.children.get_or_insert_with(Vec::new).push(content);
        parent.state = ChunkState::Timeout {
            expired: true,
            resumed: Some(resumed),
        };
        parent.effects.push(value.clone());
        self.suspend(resumed, content, value.clone(), None);

        let interrupted = &mut self.chunks[key];
        interrupted.status = ChunkStatus::Suspended;
        interrupted.effects = vec![value];
        interrupted.suspension = None;

        let root = &mut self.chunks[self.boundaries[boundary].root];
        root.node = timeout.render(true);
        root.should_restart = true;

        self.stats.fallbacks += 1;
        tracing::info!(boundary = %self.boundaries[boundary].id, "budget spent, showing fallback");
        Ok(())
    }
}
