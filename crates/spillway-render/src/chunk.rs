//! Chunks, the unit of scheduled render work, and the arena holding them.

use std::ops::{Index, IndexMut};
use std::time::Duration;

use serde_json::Value;

use spillway_core::wire::{ChunkId, SlotId};
use spillway_core::{ContextMap, Namespace, Node, PendingValue};

use crate::boundary::BoundaryKey;

/// Index of a chunk in its session's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Root,
    Host,
    Text,
    Function,
    Class,
    Fragment,
    Provider,
    Timeout,
    Empty,
}

impl ChunkKind {
    pub fn of(node: &Node) -> Self {
        match node {
            Node::Empty => ChunkKind::Empty,
            Node::Text(_) | Node::Number(_) => ChunkKind::Text,
            Node::Element(_) => ChunkKind::Host,
            Node::Component(c) if c.component.is_class() => ChunkKind::Class,
            Node::Component(_) => ChunkKind::Function,
            Node::Fragment(_) => ChunkKind::Fragment,
            Node::Provider(_) => ChunkKind::Provider,
            Node::Timeout(_) => ChunkKind::Timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    /// Not rendered yet, or reset for a retry.
    Pending,
    /// Rendered; some child in the same boundary is not complete.
    PendingChildren,
    /// Waiting on `effects`.
    Suspended,
    Complete,
}

#[derive(Debug, Clone, Default)]
pub enum ChunkState {
    #[default]
    None,
    /// Class component instance state.
    Instance(Value),
    /// Timeout marker: whether the fallback is shown, and the boundary that
    /// re-renders the real content once it is.
    Timeout {
        expired: bool,
        resumed: Option<BoundaryKey>,
    },
}

/// What fills a slot in a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotFill {
    /// A chunk that could not render inline; it emits its own fragment.
    Chunk(ChunkKey),
    /// The region of a nested boundary. Left in place when committing.
    Boundary(BoundaryKey),
}

#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub id: SlotId,
    pub fill: SlotFill,
}

#[derive(Debug)]
pub struct Chunk {
    pub id: Option<ChunkId>,
    pub kind: ChunkKind,
    pub node: Node,
    pub state: ChunkState,
    pub parent: Option<ChunkKey>,
    pub children: Option<Vec<ChunkKey>>,
    pub status: ChunkStatus,
    /// Boundary owned by a timeout marker.
    pub state_node: Option<BoundaryKey>,
    pub effects: Vec<PendingValue>,
    pub should_restart: bool,
    /// Budget inherited from the nearest timeout marker.
    pub timeout: Option<Duration>,
    pub namespace: Namespace,
    pub context: ContextMap,
    /// Epoch of the active suspension. Wakes for any other epoch are stale.
    pub suspension: Option<u64>,
    /// Slots introduced by this chunk's fragment, in document order.
    pub slots: Vec<Slot>,
}

impl Chunk {
    pub fn new(
        node: Node,
        parent: Option<ChunkKey>,
        timeout: Option<Duration>,
        namespace: Namespace,
        context: ContextMap,
    ) -> Self {
        Self {
            id: None,
            kind: ChunkKind::of(&node),
            node,
            state: ChunkState::None,
            parent,
            children: None,
            status: ChunkStatus::Pending,
            state_node: None,
            effects: Vec::new(),
            should_restart: false,
            timeout,
            namespace,
            context,
            suspension: None,
            slots: Vec::new(),
        }
    }

    pub fn root(node: Node) -> Self {
        Self {
            kind: ChunkKind::Root,
            ..Self::new(node, None, None, Namespace::Html, ContextMap::default())
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == ChunkStatus::Complete
    }

    pub fn is_suspended(&self) -> bool {
        self.status == ChunkStatus::Suspended
    }

    /// Whether the fallback of this timeout marker is showing.
    pub fn is_expired(&self) -> bool {
        matches!(self.state, ChunkState::Timeout { expired: true, .. })
    }
}

/// Per-session chunk storage. Chunks are never removed; detached subtrees
/// stay in place until the session is dropped.
#[derive(Debug, Default)]
pub struct ChunkArena {
    chunks: Vec<Chunk>,
}

impl ChunkArena {
    pub fn insert(&mut self, chunk: Chunk) -> ChunkKey {
        self.chunks.push(chunk);
        ChunkKey(self.chunks.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChunkKey, &Chunk)> {
        self.chunks.iter().enumerate().map(|(i, c)| (ChunkKey(i), c))
    }

    /// Walk up from `key` (exclusive) to the nearest timeout marker.
    pub fn nearest_timeout(&self, key: ChunkKey) -> Option<ChunkKey> {
        let mut cursor = self[key].parent;
        while let Some(current) = cursor {
            if self[current].kind == ChunkKind::Timeout {
                return Some(current);
            }
            cursor = self[current].parent;
        }
        None
    }
}

impl Index<ChunkKey> for ChunkArena {
    type Output = Chunk;

    fn index(&self, key: ChunkKey) -> &Chunk {
        &self.chunks[key.0]
    }
}

impl IndexMut<ChunkKey> for ChunkArena {
    fn index_mut(&mut self, key: ChunkKey) -> &mut Chunk {
        &mut self.chunks[key.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spillway_core::{suspense, Component};

    #[test]
    fn kinds_follow_descriptions() {
        let class = Component::class("C", json!({}), |_, _| Ok(Node::Empty));
        let function = Component::function("F", |_| Ok(Node::Empty));
        assert_eq!(ChunkKind::of(&class.element(json!({}))), ChunkKind::Class);
        assert_eq!(ChunkKind::of(&function.element(json!({}))), ChunkKind::Function);
        assert_eq!(ChunkKind::of(&Node::Number(1.0)), ChunkKind::Text);
        assert_eq!(
            ChunkKind::of(&suspense(None, Node::Empty, Node::Empty)),
            ChunkKind::Timeout
        );
    }

    #[test]
    fn nearest_timeout_skips_the_chunk_itself() {
        let mut arena = ChunkArena::default();
        let root = arena.insert(Chunk::root(Node::Empty));
        let marker = arena.insert(Chunk::new(
            suspense(Some(10), Node::Empty, Node::Empty),
            Some(root),
            None,
            Namespace::Html,
            ContextMap::default(),
        ));
        let content = arena.insert(Chunk::new(
            Node::text("x"),
            Some(marker),
            None,
            Namespace::Html,
            ContextMap::default(),
        ));
        assert_eq!(arena.nearest_timeout(content), Some(marker));
        assert_eq!(arena.nearest_timeout(marker), None);
        assert_eq!(arena.nearest_timeout(root), None);
    }
}
