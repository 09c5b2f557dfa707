use crate::*;
use spillway_core::suspense;

/// Content slower than its budget: the fallback commits first, then the
/// real content replaces it in the same boundary.
#[tokio::test(start_paused = true)]
async fn test_fallback_then_content() -> Result<()> {
    let slow = delayed("slow", 500);
    let app = suspense(
        Some(100),
        Node::element("div", json!({ "className": "Spinner" }), [Node::text("🌀")]),
        waits_for("Slow", slow, "Done"),
    );

    let started = tokio::time::Instant::now();
    let (stats, events) = render_all(app, RenderOptions::default()).await?;
    check_stream(&events)?;
    assert!(started.elapsed() >= Duration::from_millis(500));

    // root 2, marker 3, boundary 4, slot 5, content 6. The fallback
    // restarts the content as chunk 7 (its text is 8) and the real content
    // renders as chunk 9.
    let html = fragment_html(&events);
    assert_eq!(html.len(), 3);
    assert_eq!(html[1], r#"<div class="Spinner">🌀</div>"#);
    assert_eq!(html[2], "Done");

    let commits = commits(&events);
    assert_eq!(
        commits,
        vec![
            (
                BoundaryId(1),
                &CommitLog {
                    chunk: ChunkId(2),
                    children: Some(vec![CommitLog::empty()]),
                }
            ),
            (BoundaryId(4), &CommitLog::leaf(ChunkId(7))),
            (BoundaryId(4), &CommitLog::leaf(ChunkId(9))),
        ]
    );
    assert_eq!(stats.fallbacks, 1);
    Ok(())
}

/// Once the fallback shows, the content has no deadline left and simply
/// waits for its value.
#[tokio::test(start_paused = true)]
async fn test_expired_boundary_waits_without_deadline() -> Result<()> {
    let very_slow = delayed("very slow", 60_000);
    let app = suspense(Some(100), Node::text("Loading"), waits_for("Slow", very_slow, "Done"));

    let options = RenderOptions::default().with_default_timeout(Duration::from_millis(200));
    let (stats, events) = render_all(app, options).await?;
    check_stream(&events)?;

    assert_eq!(fragment_html(&events).last(), Some(&"Done"));
    assert_eq!(stats.fallbacks, 1);
    Ok(())
}

/// Fallback of one boundary leaves a sibling boundary alone.
#[tokio::test(start_paused = true)]
async fn test_fallback_is_local_to_its_boundary() -> Result<()> {
    let slow = delayed("slow", 400);
    let fast = delayed("fast", 10);
    let app = Node::fragment([
        suspense(Some(100), Node::text("slow loading"), waits_for("Slow", slow, "slow")),
        suspense(Some(100), Node::text("fast loading"), waits_for("Fast", fast, "fast")),
    ]);

    let (stats, events) = render_all(app, RenderOptions::default()).await?;
    check_stream(&events)?;

    let html = fragment_html(&events);
    assert!(html.contains(&"slow loading"));
    assert!(!html.contains(&"fast loading"));
    assert_eq!(stats.fallbacks, 1);
    Ok(())
}

/// Suspending past the default budget with no fallback above fails the
/// session.
#[tokio::test(start_paused = true)]
async fn test_missing_fallback_is_fatal() {
    let never = delayed("never", 60_000);
    let app = Node::element("div", json!({}), [waits_for("Stuck", never, "x")]);
    let options = RenderOptions::default().with_default_timeout(Duration::from_millis(50));

    let err = render_all(app, options).await.unwrap_err();
    assert!(
        format!("{err:#}").contains("timeout"),
        "unexpected error: {err:#}"
    );
}
