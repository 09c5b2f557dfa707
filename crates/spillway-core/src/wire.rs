//! Spillway wire protocol: what the server streams and the client runtime
//! consumes.
//!
//! The body of a streamed document is a prelude (see [`ScriptEncoder::prelude`])
//! followed by one inline `<script>` per [`StreamEvent`]:
//!
//!   __spillway.processFragment(chunkId, slotIds, boundaryIds, innerHTML)
//!   __spillway.commit(boundaryId, commitLog)
//!   __spillway.finish()
//!
//! Chunk ids travel as strings, slot and boundary ids as numbers. A commit
//! log is `[chunkId, children | null]`, where `children` follows the slots
//! of the chunk's fragment in document order.

use std::fmt;

use serde::ser::{SerializeTuple, Serializer};
use serde::Serialize;

use crate::markup::escape_html;
use crate::runtime::RUNTIME_JS;

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Chunk identifier. `0` is reserved for "empty".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub u64);

/// Boundary identifier. `1` is reserved for the document root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BoundaryId(pub u64);

/// Slot identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SlotId(pub u64);

pub const EMPTY_CHUNK: ChunkId = ChunkId(0);
pub const ROOT_BOUNDARY: BoundaryId = BoundaryId(1);

/// First id handed out by a session; everything below is reserved.
pub const FIRST_DYNAMIC_ID: u64 = 2;

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for BoundaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for ChunkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

// ── Markers ───────────────────────────────────────────────────────────────────

/// Name of the client runtime global.
pub const RUNTIME_GLOBAL: &str = "__spillway";

/// Id of the `<template>` fragments are parsed into.
pub const STAGING_ID: &str = "sw-staging";

pub fn boundary_start_marker(id: BoundaryId) -> String {
    format!("<template id=\"sw-b{id}-start\"></template>")
}

pub fn boundary_end_marker(id: BoundaryId) -> String {
    format!("<template id=\"sw-b{id}-end\"></template>")
}

pub fn slot_marker(id: SlotId) -> String {
    format!("<template id=\"sw-s{id}\"></template>")
}

// ── Events ────────────────────────────────────────────────────────────────────

/// Markup rendered for one chunk, with the anchors it introduced.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub chunk: ChunkId,
    pub slots: Vec<SlotId>,
    pub boundaries: Vec<BoundaryId>,
    pub html: String,
}

/// How to assemble a boundary's fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitLog {
    pub chunk: ChunkId,
    pub children: Option<Vec<CommitLog>>,
}

impl CommitLog {
    pub fn leaf(chunk: ChunkId) -> Self {
        Self {
            chunk,
            children: None,
        }
    }

    /// Entry for a slot that is left in place.
    pub fn empty() -> Self {
        Self::leaf(EMPTY_CHUNK)
    }

    pub fn is_empty(&self) -> bool {
        self.chunk == EMPTY_CHUNK
    }
}

impl Serialize for CommitLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.chunk)?;
        tuple.serialize_element(&self.children)?;
        tuple.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Fragment(Fragment),
    Commit { boundary: BoundaryId, log: CommitLog },
    Finish,
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// JSON for embedding inside an inline script. `<` is escaped so content
/// can never close the script element; U+2028/U+2029 are escaped for
/// pre-ES2019 parsers.
pub fn script_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029"))
}

/// Turns stream events into document text.
#[derive(Debug, Clone)]
pub struct ScriptEncoder {
    title: String,
}

impl ScriptEncoder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Everything before the first event: document head, the inline client
    /// runtime, the staging template and the root boundary markers.
    pub fn prelude(&self) -> String {
        format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title>\
             <script>{runtime}</script></head><body>\
             <template id=\"{STAGING_ID}\"></template>{start}{end}",
            title = escape_html(&self.title),
            runtime = RUNTIME_JS,
            start = boundary_start_marker(ROOT_BOUNDARY),
            end = boundary_end_marker(ROOT_BOUNDARY),
        )
    }

    pub fn encode(&self, event: &StreamEvent) -> Result<String, serde_json::Error> {
        match event {
            StreamEvent::Fragment(fragment) => Ok(format!(
                "<script>{RUNTIME_GLOBAL}.processFragment({},{},{},{})</script>",
                script_json(&fragment.chunk)?,
                script_json(&fragment.slots)?,
                script_json(&fragment.boundaries)?,
                script_json(&fragment.html)?,
            )),
            StreamEvent::Commit { boundary, log } => Ok(format!(
                "<script>{RUNTIME_GLOBAL}.commit({},{})</script>",
                script_json(boundary)?,
                script_json(log)?,
            )),
            StreamEvent::Finish => Ok(format!(
                "<script>{RUNTIME_GLOBAL}.finish()</script></body></html>"
            )),
        }
    }
}
