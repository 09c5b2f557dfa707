//! Chunk renderer.
//!
//! A chunk reached with no fragment open is an *entry*: it opens a fragment,
//! renders itself and every synchronous descendant into it, and emits it.
//! Descendants render inline into their entry's fragment; one that suspends
//! leaves a slot behind and later renders as an entry of its own.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use spillway_core::markup::{eats_leading_newline, format_number, MarkupError};
use spillway_core::wire::{ChunkId, EMPTY_CHUNK};
use spillway_core::{
    ComponentElement, ComponentKind, ContextMap, Element, Namespace, Node, Scope, Timeout,
};

use crate::boundary::BoundaryKey;
use crate::chunk::{Chunk, ChunkKey, ChunkKind, ChunkState, ChunkStatus, Slot, SlotFill};
use crate::error::RenderError;
use crate::evaluator::Evaluation;
use crate::session::RenderSession;
use crate::stream::FragmentBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Rendered,
    Suspended,
}

impl RenderSession {
    /// Render `key` within `boundary`. With `out` set the chunk writes into
    /// the open fragment; otherwise it is an entry.
    pub(crate) fn render_chunk(
        &mut self,
        boundary: BoundaryKey,
        key: ChunkKey,
        out: Option<&mut FragmentBuf>,
    ) -> Result<(), RenderError> {
        if self.chunks[key].status == ChunkStatus::Pending {
            self.assign_id(key);
            match out {
                Some(buf) => {
                    if self.render_self(boundary, key, buf)? == Outcome::Suspended {
                        let id = self.ids.slot();
                        buf.push_slot(Slot {
                            id,
                            fill: SlotFill::Chunk(key),
                        });
                        return Ok(());
                    }
                }
                None => {
                    let mut buf = FragmentBuf::new(key);
                    let outcome = self.render_self(boundary, key, &mut buf)?;
                    if self.chunks[key].should_restart {
                        return self.restart(boundary, key);
                    }
                    if outcome == Outcome::Suspended || self.restarting(boundary) {
                        return Ok(());
                    }
                    self.emit(buf)?;
                }
            }
        }

        self.render_children(boundary, key)?;
        if self.chunks[key].should_restart {
            return self.restart(boundary, key);
        }
        self.finalize(key);
        Ok(())
    }

    fn assign_id(&mut self, key: ChunkKey) -> ChunkId {
        if let Some(id) = self.chunks[key].id {
            return id;
        }
        let id = self.ids.chunk();
        self.chunks[key].id = Some(id);
        id
    }

    fn emit(&mut self, buf: FragmentBuf) -> Result<(), RenderError> {
        let owner = buf.owner();
        let (fragment, slots) = buf.finish(self.chunks[owner].id.unwrap_or(EMPTY_CHUNK));
        self.chunks[owner].slots = slots;
        self.stats.fragments += 1;
        self.sink.fragment(fragment)
    }

    /// The root of `boundary` is about to re-render; work below it is moot.
    fn restarting(&self, boundary: BoundaryKey) -> bool {
        self.chunks[self.boundaries[boundary].root].should_restart
    }

    /// Continue into children left unfinished by an earlier pass. Content of
    /// a timeout marker belongs to the marker's own boundary.
    fn render_children(&mut self, boundary: BoundaryKey, key: ChunkKey) -> Result<(), RenderError> {
        if self.chunks[key].kind == ChunkKind::Timeout {
            return Ok(());
        }
        let Some(children) = self.chunks[key].children.clone() else {
            return Ok(());
        };
        for child in children {
            if self.restarting(boundary) {
                break;
            }
            if matches!(
                self.chunks[child].status,
                ChunkStatus::Pending | ChunkStatus::PendingChildren
            ) {
                self.render_chunk(boundary, child, None)?;
            }
        }
        Ok(())
    }

    fn finalize(&mut self, key: ChunkKey) {
        let chunk = &self.chunks[key];
        let complete = chunk.kind == ChunkKind::Timeout
            || chunk
                .children
                .as_deref()
                .unwrap_or_default()
                .iter()
                .all(|&child| self.chunks[child].is_complete());
        self.chunks[key].status = if complete {
            ChunkStatus::Complete
        } else {
            ChunkStatus::PendingChildren
        };
    }

    /// Discard everything rendered for `key` and render its current node
    /// from scratch as an entry.
    fn restart(&mut self, boundary: BoundaryKey, key: ChunkKey) -> Result<(), RenderError> {
        self.detach(key);
        let chunk = &mut self.chunks[key];
        tracing::debug!(chunk = ?chunk.id, "restarting");
        chunk.should_restart = false;
        chunk.kind = ChunkKind::of(&chunk.node);
        chunk.state = ChunkState::None;
        chunk.status = ChunkStatus::Pending;
        chunk.id = None;
        chunk.slots.clear();
        self.render_chunk(boundary, key, None)
    }

    /// Cut `key`'s subtree loose: pending wakes become stale and boundaries
    /// opened inside it are abandoned.
    fn detach(&mut self, key: ChunkKey) {
        let chunk = &mut self.chunks[key];
        chunk.suspension = None;
        chunk.effects.clear();
        let children = chunk.children.take().unwrap_or_default();
        let mut owned: Vec<BoundaryKey> = chunk.state_node.take().into_iter().collect();
        if let ChunkState::Timeout {
            resumed: Some(resumed),
            ..
        } = chunk.state
        {
            owned.push(resumed);
        }
        for boundary in owned {
            self.boundaries.abandon(boundary);
        }
        for child in children {
            self.detach(child);
        }
    }

    fn render_self(
        &mut self,
        boundary: BoundaryKey,
        key: ChunkKey,
        buf: &mut FragmentBuf,
    ) -> Result<Outcome, RenderError> {
        let chunk = &self.chunks[key];
        let node = chunk.node.clone();
        let namespace = chunk.namespace;
        let context = chunk.context.clone();

        if chunk.kind == ChunkKind::Root {
            self.render_inline(boundary, key, vec![node], namespace, context, buf)?;
            return Ok(Outcome::Rendered);
        }

        match node {
            Node::Empty => {}
            Node::Text(text) => buf.push_text(&self.encoder.escape_text(&text)),
            Node::Number(n) => buf.push_text(&self.encoder.escape_text(&format_number(n))),
            Node::Element(element) => self.render_host(boundary, key, &element, buf)?,
            Node::Component(element) => return self.render_component(boundary, key, &element, buf),
            Node::Fragment(children) => {
                self.render_inline(boundary, key, children.to_vec(), namespace, context, buf)?
            }
            Node::Provider(provider) => {
                let context = context.with(&provider.key, provider.value.clone());
                self.render_inline(
                    boundary,
                    key,
                    provider.children.clone(),
                    namespace,
                    context,
                    buf,
                )?
            }
            Node::Timeout(timeout) => self.render_timeout(key, &timeout, buf),
        }
        Ok(Outcome::Rendered)
    }

    /// Create a child chunk per node and render each into `buf`.
    fn render_inline(
        &mut self,
        boundary: BoundaryKey,
        parent: ChunkKey,
        nodes: Vec<Node>,
        namespace: Namespace,
        context: ContextMap,
        buf: &mut FragmentBuf,
    ) -> Result<(), RenderError> {
        let timeout = self.chunks[parent].timeout;
        let children: Vec<ChunkKey> = nodes
            .into_iter()
            .map(|node| {
                let chunk = Chunk::new(node, Some(parent), timeout, namespace, context.clone());
                self.chunks.insert(chunk)
            })
            .collect();
        self.chunks[parent].children = Some(children.clone());
        for child in children {
            if self.restarting(boundary) {
                break;
            }
            self.render_chunk(boundary, child, Some(&mut *buf))?;
        }
        Ok(())
    }

    fn render_host(
        &mut self,
        boundary: BoundaryKey,
        key: ChunkKey,
        element: &Element,
        buf: &mut FragmentBuf,
    ) -> Result<(), RenderError> {
        let namespace = self.chunks[key].namespace;
        let open = self.encoder.open_tag(&element.tag, &element.props, namespace)?;
        let inner_html = self.encoder.inner_html(&element.props);
        let is_void = self.encoder.close_tag(&element.tag, namespace).is_none();
        if is_void && (inner_html.is_some() || !element.children.is_empty()) {
            return Err(MarkupError::VoidContent(element.tag.clone()).into());
        }
        if inner_html.is_some() && !element.children.is_empty() {
            return Err(MarkupError::ConflictingContent(element.tag.clone()).into());
        }
        buf.push_markup(&open);

        if let Some(html) = inner_html {
            if html.starts_with('\n') && eats_leading_newline(&element.tag) {
                buf.push_markup("\n");
            }
            buf.push_markup(html);
        } else {
            let leading_newline = matches!(
                element.children.first(),
                Some(Node::Text(text)) if text.starts_with('\n')
            );
            if leading_newline && eats_leading_newline(&element.tag) {
                buf.push_markup("\n");
            }
            let context = self.chunks[key].context.clone();
            self.render_inline(
                boundary,
                key,
                element.children.clone(),
                namespace.for_children(&element.tag),
                context,
                buf,
            )?;
        }

        if let Some(close) = self.encoder.close_tag(&element.tag, namespace) {
            buf.push_markup(&close);
        }
        Ok(())
    }

    fn render_component(
        &mut self,
        boundary: BoundaryKey,
        key: ChunkKey,
        element: &ComponentElement,
        buf: &mut FragmentBuf,
    ) -> Result<Outcome, RenderError> {
        let chunk = &mut self.chunks[key];
        let namespace = chunk.namespace;
        let context = chunk.context.clone();
        let mut state = match std::mem::take(&mut chunk.state) {
            ChunkState::Instance(state) => state,
            _ => match element.component.kind() {
                ComponentKind::Class { initial_state, .. } => initial_state.clone(),
                ComponentKind::Function(_) => Value::Null,
            },
        };

        let scope = Scope::new(&element.props, &element.children, &context);
        let evaluation = self
            .evaluator
            .evaluate(&element.component, &scope, &mut state);
        if element.component.is_class() {
            self.chunks[key].state = ChunkState::Instance(state);
        }

        match evaluation {
            Ok(Evaluation::Ready(node)) => {
                self.render_inline(boundary, key, vec![node], namespace, context, buf)?;
                Ok(Outcome::Rendered)
            }
            Ok(Evaluation::Suspended(value)) => {
                self.intercept(boundary, key, value)?;
                Ok(Outcome::Suspended)
            }
            Err(source) => {
                tracing::error!(component = element.component.name(), error = %source, "component failed");
                Err(RenderError::Component {
                    component: element.component.name().to_owned(),
                    source,
                })
            }
        }
    }

    /// Open the marker's boundary and write its region. The content renders
    /// when the boundary is taken off the queue, after the current fragment.
    fn render_timeout(&mut self, key: ChunkKey, timeout: &Timeout, buf: &mut FragmentBuf) {
        let marker = &mut self.chunks[key];
        let budget = timeout.ms.map(Duration::from_millis).or(marker.timeout);
        marker.timeout = budget;
        let content = Chunk::new(
            timeout.render(false),
            Some(key),
            budget,
            marker.namespace,
            marker.context.clone(),
        );
        let content = self.chunks.insert(content);

        let id = self.ids.boundary();
        let owned = self.boundaries.open(id, content, Instant::now());
        let marker = &mut self.chunks[key];
        marker.children = Some(vec![content]);
        marker.state = ChunkState::Timeout {
            expired: false,
            resumed: None,
        };
        marker.state_node = Some(owned);

        let slot = self.ids.slot();
        buf.push_boundary(
            id,
            Slot {
                id: slot,
                fill: SlotFill::Boundary(owned),
            },
        );
        self.queue.push_back(owned);
        tracing::debug!(
            boundary = %id,
            budget_ms = budget.map(|b| b.as_millis() as u64),
            "boundary opened"
        );
    }
}
