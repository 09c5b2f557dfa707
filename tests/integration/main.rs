//! Spillway integration test harness.
//!
//! Each scenario drives a full render session on a paused tokio clock and
//! inspects the stream events it produced:
//!
//!   cargo test --test integration
//!
//! Pending values are plain timers, so a scenario's timing is exact.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::json;

use spillway_core::wire::{BoundaryId, ChunkId, CommitLog, StreamEvent, EMPTY_CHUNK};
use spillway_core::{Component, Node, PendingValue};
use spillway_render::{RenderOptions, RenderSession, SessionStats};

mod completion;
mod fallback;
mod streaming;

// ── Harness ───────────────────────────────────────────────────────────────────

/// A value that resolves `ms` after it is created.
pub fn delayed(label: &str, ms: u64) -> PendingValue {
    PendingValue::new(label.to_owned(), tokio::time::sleep(Duration::from_millis(ms)))
}

/// Component that suspends on `value` until it resolves, then renders
/// `text`.
pub fn waits_for(name: &str, value: PendingValue, text: &'static str) -> Node {
    Component::function(name.to_owned(), move |_| {
        if value.is_resolved() {
            Ok(Node::text(text))
        } else {
            Err(value.clone().into())
        }
    })
    .element(json!({}))
}

/// Run `app` to completion and collect every event it streamed.
pub async fn render_all(app: Node, options: RenderOptions) -> Result<(SessionStats, Vec<StreamEvent>)> {
    let (session, mut events) = RenderSession::channel(app, options);
    let stats = session.run().await.context("render session failed")?;
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    Ok((stats, out))
}

/// HTML of every fragment, in stream order.
pub fn fragment_html(events: &[StreamEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::Fragment(fragment) => Some(fragment.html.as_str()),
            _ => None,
        })
        .collect()
}

/// Every commit, in stream order.
pub fn commits(events: &[StreamEvent]) -> Vec<(BoundaryId, &CommitLog)> {
    events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::Commit { boundary, log } => Some((*boundary, log)),
            _ => None,
        })
        .collect()
}

/// Check the ordering rules every stream must obey:
///   - a commit only names chunks whose fragments were already sent
///   - a commit only targets a boundary announced by an earlier fragment
///     (or the root boundary)
///   - `finish` is sent exactly once, as the last event
pub fn check_stream(events: &[StreamEvent]) -> Result<()> {
    let mut sent: HashSet<ChunkId> = HashSet::new();
    let mut announced: HashSet<BoundaryId> = HashSet::from([BoundaryId(1)]);
    for (index, event) in events.iter().enumerate() {
        match event {
            StreamEvent::Fragment(fragment) => {
                sent.insert(fragment.chunk);
                announced.extend(fragment.boundaries.iter().copied());
            }
            StreamEvent::Commit { boundary, log } => {
                if !announced.contains(boundary) {
                    bail!("commit to unannounced boundary {boundary}");
                }
                check_log(log, &sent)?;
            }
            StreamEvent::Finish => {
                if index + 1 != events.len() {
                    bail!("finish at {index} is not the last of {} events", events.len());
                }
            }
        }
    }
    if events.last() != Some(&StreamEvent::Finish) {
        bail!("stream did not finish");
    }
    Ok(())
}

fn check_log(log: &CommitLog, sent: &HashSet<ChunkId>) -> Result<()> {
    if log.chunk != EMPTY_CHUNK && !sent.contains(&log.chunk) {
        bail!("commit names chunk {} before its fragment", log.chunk);
    }
    for child in log.children.iter().flatten() {
        check_log(child, sent)?;
    }
    Ok(())
}
