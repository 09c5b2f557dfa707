//! Stream protocol encoder. Builds fragments and commit logs and hands
//! stream events to the session's output channel.

use tokio::sync::mpsc;

use spillway_core::wire::{
    boundary_end_marker, boundary_start_marker, slot_marker, BoundaryId, ChunkId, CommitLog,
    Fragment, StreamEvent, EMPTY_CHUNK,
};

use crate::chunk::{ChunkArena, ChunkKey, Slot, SlotFill};
use crate::error::RenderError;

/// Separates adjacent text nodes so the client parses them as two nodes.
const TEXT_SEPARATOR: &str = "<!-- -->";

/// Markup being written for one entry chunk.
#[derive(Debug)]
pub struct FragmentBuf {
    owner: ChunkKey,
    html: String,
    slots: Vec<Slot>,
    boundaries: Vec<BoundaryId>,
    previous_was_text: bool,
}

impl FragmentBuf {
    pub fn new(owner: ChunkKey) -> Self {
        Self {
            owner,
            html: String::new(),
            slots: Vec::new(),
            boundaries: Vec::new(),
            previous_was_text: false,
        }
    }

    pub fn owner(&self) -> ChunkKey {
        self.owner
    }

    pub fn push_markup(&mut self, markup: &str) {
        self.html.push_str(markup);
        self.previous_was_text = false;
    }

    /// Append already escaped text.
    pub fn push_text(&mut self, escaped: &str) {
        if escaped.is_empty() {
            return;
        }
        if self.previous_was_text {
            self.html.push_str(TEXT_SEPARATOR);
        }
        self.html.push_str(escaped);
        self.previous_was_text = true;
    }

    pub fn push_slot(&mut self, slot: Slot) {
        self.push_markup(&slot_marker(slot.id));
        self.slots.push(slot);
    }

    /// Write a nested boundary's region: start marker, the slot its content
    /// will replace, end marker.
    pub fn push_boundary(&mut self, id: BoundaryId, slot: Slot) {
        self.push_markup(&boundary_start_marker(id));
        self.push_slot(slot);
        self.push_markup(&boundary_end_marker(id));
        self.boundaries.push(id);
    }

    /// Split into the wire fragment and the slots it introduced.
    pub fn finish(self, chunk: ChunkId) -> (Fragment, Vec<Slot>) {
        let fragment = Fragment {
            chunk,
            slots: self.slots.iter().map(|s| s.id).collect(),
            boundaries: self.boundaries,
            html: self.html,
        };
        (fragment, self.slots)
    }
}

/// Commit log for the subtree whose fragment was emitted by `root`.
pub fn commit_log(chunks: &ChunkArena, root: ChunkKey) -> CommitLog {
    let chunk = &chunks[root];
    let id = chunk.id.unwrap_or(EMPTY_CHUNK);
    if chunk.slots.is_empty() {
        return CommitLog::leaf(id);
    }
    let children = chunk
        .slots
        .iter()
        .map(|slot| match slot.fill {
            SlotFill::Chunk(child) => commit_log(chunks, child),
            SlotFill::Boundary(_) => CommitLog::empty(),
        })
        .collect();
    CommitLog {
        chunk: id,
        children: Some(children),
    }
}

/// Output side of a session.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<StreamEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn fragment(&self, fragment: Fragment) -> Result<(), RenderError> {
        tracing::debug!(
            chunk = %fragment.chunk,
            slots = fragment.slots.len(),
            boundaries = fragment.boundaries.len(),
            bytes = fragment.html.len(),
            "fragment"
        );
        self.send(StreamEvent::Fragment(fragment))
    }

    pub fn commit(&self, boundary: BoundaryId, log: CommitLog) -> Result<(), RenderError> {
        tracing::debug!(%boundary, chunk = %log.chunk, "commit");
        self.send(StreamEvent::Commit { boundary, log })
    }

    pub fn finish(&self) -> Result<(), RenderError> {
        tracing::debug!("finish");
        self.send(StreamEvent::Finish)
    }

    /// Completes when the receiving side is dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    fn send(&self, event: StreamEvent) -> Result<(), RenderError> {
        self.tx.send(event).map_err(|_| RenderError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryKey;
    use crate::chunk::Chunk;
    use spillway_core::wire::SlotId;
    use spillway_core::Node;

    #[test]
    fn adjacent_text_gets_a_separator() {
        let mut arena = ChunkArena::default();
        let owner = arena.insert(Chunk::root(Node::Empty));
        let mut buf = FragmentBuf::new(owner);
        buf.push_text("a");
        buf.push_text("b");
        buf.push_markup("<br/>");
        buf.push_text("c");
        let (fragment, _) = buf.finish(ChunkId(2));
        assert_eq!(fragment.html, "a<!-- -->b<br/>c");
    }

    #[test]
    fn commit_log_follows_slot_order() {
        let mut arena = ChunkArena::default();
        let root = arena.insert(Chunk::root(Node::Empty));
        let late = arena.insert(Chunk::new(
            Node::Empty,
            Some(root),
            None,
            Default::default(),
            Default::default(),
        ));
        arena[root].id = Some(ChunkId(2));
        arena[late].id = Some(ChunkId(6));
        arena[root].slots = vec![
            Slot {
                id: SlotId(3),
                fill: SlotFill::Chunk(late),
            },
            Slot {
                id: SlotId(5),
                fill: SlotFill::Boundary(nested_boundary()),
            },
        ];
        let log = commit_log(&arena, root);
        assert_eq!(
            log,
            CommitLog {
                chunk: ChunkId(2),
                children: Some(vec![CommitLog::leaf(ChunkId(6)), CommitLog::empty()]),
            }
        );
    }

    fn nested_boundary() -> BoundaryKey {
        let mut arena = ChunkArena::default();
        let root = arena.insert(Chunk::root(Node::Empty));
        let mut manager = crate::boundary::BoundaryManager::new(Default::default());
        manager.open(BoundaryId(4), root, tokio::time::Instant::now())
    }

    #[tokio::test]
    async fn send_after_receiver_drop_disconnects() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.closed().await;
        assert!(matches!(sink.finish(), Err(RenderError::Disconnected)));
    }
}
