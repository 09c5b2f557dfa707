use crate::*;
use spillway_core::suspense;

/// Content that resolves inside its budget streams without ever showing
/// the fallback.
#[tokio::test(start_paused = true)]
async fn test_content_within_budget_skips_fallback() -> Result<()> {
    let details = delayed("details", 50);
    let app = Node::element(
        "main",
        json!({}),
        [suspense(
            Some(1000),
            Node::text("Loading"),
            waits_for("Details", details, "Moonrise Kingdom"),
        )],
    );

    let (stats, events) = render_all(app, RenderOptions::default()).await?;
    check_stream(&events)?;

    let html = fragment_html(&events);
    assert_eq!(html.len(), 2, "root fragment and content fragment");
    assert!(html[0].starts_with("<main><template id=\"sw-b5-start\">"));
    assert_eq!(html[1], "Moonrise Kingdom");
    assert!(html.iter().all(|h| !h.contains("Loading")));

    let commits = commits(&events);
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].0, BoundaryId(1));
    assert_eq!(commits[1].0, BoundaryId(5));
    assert_eq!(stats.fallbacks, 0);
    assert_eq!(stats.retries, 1);
    Ok(())
}

/// Slots are committed in document order, whatever order their content
/// arrived in.
#[tokio::test(start_paused = true)]
async fn test_commit_log_follows_document_order() -> Result<()> {
    let slow = delayed("slow", 300);
    let fast = delayed("fast", 100);
    let app = Node::element(
        "div",
        json!({}),
        [waits_for("Slow", slow, "a"), waits_for("Fast", fast, "b")],
    );

    let (_, events) = render_all(app, RenderOptions::default()).await?;
    check_stream(&events)?;

    // root 2, div 3, Slow 4 (slot 5), Fast 6 (slot 7)
    let html = fragment_html(&events);
    assert_eq!(
        html,
        vec![
            "<div><template id=\"sw-s5\"></template><template id=\"sw-s7\"></template></div>",
            "b",
            "a",
        ]
    );

    let commits = commits(&events);
    assert_eq!(commits.len(), 1, "one commit once both slots are filled");
    assert_eq!(
        commits[0],
        (
            BoundaryId(1),
            &CommitLog {
                chunk: ChunkId(2),
                children: Some(vec![CommitLog::leaf(ChunkId(4)), CommitLog::leaf(ChunkId(6))]),
            }
        )
    );
    Ok(())
}

/// A nested boundary commits on its own once the outer one has.
#[tokio::test(start_paused = true)]
async fn test_nested_boundary_commits_after_parent() -> Result<()> {
    let outer = delayed("outer", 20);
    let inner = delayed("inner", 200);
    let app = suspense(
        Some(1000),
        Node::text("outer loading"),
        Node::fragment([
            waits_for("Outer", outer, "outer"),
            suspense(None, Node::text("inner loading"), waits_for("Inner", inner, "inner")),
        ]),
    );

    let (_, events) = render_all(app, RenderOptions::default()).await?;
    check_stream(&events)?;

    let commits = commits(&events);
    let order: Vec<u64> = commits.iter().map(|(b, _)| b.0).collect();
    assert_eq!(order.len(), 3);
    assert_eq!(order[0], 1);
    assert!(order[1] < order[2], "outer boundary before the inner one: {order:?}");
    Ok(())
}
