use crate::*;
use spillway_core::suspense;
use spillway_core::wire::ScriptEncoder;

/// The stream finishes only after every boundary has committed.
#[tokio::test(start_paused = true)]
async fn test_finish_waits_for_every_boundary() -> Result<()> {
    let first = delayed("first", 50);
    let second = delayed("second", 80);
    let app = Node::fragment([
        suspense(Some(1000), Node::text("…"), waits_for("First", first, "one")),
        suspense(Some(1000), Node::text("…"), waits_for("Second", second, "two")),
    ]);

    let (stats, events) = render_all(app, RenderOptions::default()).await?;
    check_stream(&events)?;

    let committed: HashSet<BoundaryId> = commits(&events).iter().map(|(b, _)| *b).collect();
    let announced: HashSet<BoundaryId> = events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::Fragment(fragment) => Some(fragment.boundaries.clone()),
            _ => None,
        })
        .flatten()
        .chain([BoundaryId(1)])
        .collect();
    assert_eq!(committed, announced);
    assert_eq!(committed.len(), 3);
    assert_eq!(stats.boundaries, 3);
    assert_eq!(
        events.iter().filter(|e| **e == StreamEvent::Finish).count(),
        1
    );
    Ok(())
}

/// A tree with nothing to wait on streams one fragment, one commit and
/// finishes.
#[tokio::test(start_paused = true)]
async fn test_synchronous_tree_streams_three_events() -> Result<()> {
    let app = Node::element("p", json!({}), [Node::text("hello")]);
    let (_, events) = render_all(app, RenderOptions::default()).await?;
    check_stream(&events)?;
    assert_eq!(fragment_html(&events), vec!["<p>hello</p>"]);
    assert_eq!(events.len(), 3);
    Ok(())
}

/// Encoded end to end, the stream is a single well-formed document.
#[tokio::test(start_paused = true)]
async fn test_encoded_document_closes_once() -> Result<()> {
    let value = delayed("value", 30);
    let app = suspense(
        Some(1000),
        Node::text("Loading"),
        waits_for("Late", value, "</script><b>late</b>"),
    );
    let (_, events) = render_all(app, RenderOptions::default()).await?;
    check_stream(&events)?;

    let encoder = ScriptEncoder::new("Integration");
    let mut document = encoder.prelude();
    for event in &events {
        document.push_str(&encoder.encode(event)?);
    }

    assert!(document.starts_with("<!DOCTYPE html>"));
    assert!(document.ends_with("__spillway.finish()</script></body></html>"));
    assert_eq!(document.matches("</body>").count(), 1);
    assert!(document.contains("&lt;/script&gt;&lt;b&gt;late&lt;/b&gt;"));
    assert!(!document.contains("</script><b>"));
    assert!(document.contains(r#"__spillway.commit(1,["2",[["0",null]]])"#));
    Ok(())
}
