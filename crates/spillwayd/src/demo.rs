//! Movie page demo.
//!
//! The details pane waits on a slow load inside a suspense boundary with a
//! spinner fallback; the reviews pane sits in a nested boundary of its own
//! and loads even slower. Reviews are preloaded by the page so both loads
//! run concurrently.

use std::time::Duration;

use serde_json::{json, Value};

use spillway_api::PageQuery;
use spillway_core::config::DemoConfig;
use spillway_core::{suspense, Component, ComponentError, Node, Resource};

#[derive(Debug, Clone)]
pub struct MovieDemo {
    config: DemoConfig,
}

impl MovieDemo {
    pub fn new(config: DemoConfig) -> Self {
        Self { config }
    }

    /// Build the page for one request. Resources are fresh per request.
    pub fn app(&self, query: &PageQuery) -> Node {
        let scale = query
            .scale_network_speed
            .unwrap_or(self.config.network_scale)
            .max(0.0);
        let details_delay = scaled(self.config.details_delay_ms, scale);
        let reviews_delay = scaled(self.config.reviews_delay_ms, scale);
        let details = delayed_resource("details", details_delay, movie_details);
        let reviews = delayed_resource("reviews", reviews_delay, movie_reviews);
        movie_page(details, reviews, self.config.max_duration_ms).element(json!({ "id": 1 }))
    }
}

fn scaled(ms: u64, scale: f64) -> Duration {
    Duration::from_millis((ms as f64 * scale) as u64)
}

fn delayed_resource(
    name: &'static str,
    delay: Duration,
    fetch: fn(&str) -> Result<Value, ComponentError>,
) -> Resource<Value> {
    Resource::new(name, move |id: String| async move {
        tokio::time::sleep(delay).await;
        fetch(&id)
    })
}

fn id_prop(props: &serde_json::Map<String, Value>) -> String {
    match props.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

// ── Data ──────────────────────────────────────────────────────────────────────

fn movie_details(id: &str) -> Result<Value, ComponentError> {
    match id {
        "1" => Ok(json!({
            "id": 1,
            "title": "Moonrise Kingdom",
            "poster": "/img/moonrise-kingdom.jpg",
            "fresh": true,
            "rating": "93%",
            "audience": "86%",
            "consensus": "Warm, whimsical, and poignant, the immaculately framed and beautifully acted Moonrise Kingdom presents writer/director Wes Anderson at his idiosyncratic best.",
        })),
        other => Err(ComponentError::new(format!("no movie with id {other}"))),
    }
}

fn movie_reviews(id: &str) -> Result<Value, ComponentError> {
    match id {
        "1" => Ok(json!([
            {
                "id": 1,
                "fresh": true,
                "text": "Moonrise Kingdom is a gentle, wistful comedy that suggests Anderson may have finally found a world he belongs in.",
                "author": { "name": "Christy Lemire", "publication": "Associated Press" },
            },
            {
                "id": 2,
                "fresh": false,
                "text": "The result is something like a big-screen pop-up book, and just about as deep.",
                "author": { "name": "Rex Reed", "publication": "New York Observer" },
            },
        ])),
        other => Err(ComponentError::new(format!("no reviews for movie {other}"))),
    }
}

// ── Components ────────────────────────────────────────────────────────────────

fn movie_page(
    details: Resource<Value>,
    reviews: Resource<Value>,
    max_duration_ms: u64,
) -> Component {
    let movie_details = movie_details_view(details, reviews.clone());
    Component::function("MoviePage", move |scope| {
        let id = id_prop(scope.props());
        reviews.preload(&id);
        Ok(suspense(
            Some(max_duration_ms),
            spinner().element(json!({ "size": "large" })),
            movie_details.element(json!({ "id": id })),
        ))
    })
}

fn movie_details_view(details: Resource<Value>, reviews: Resource<Value>) -> Component {
    let poster = movie_poster();
    let metrics = movie_metrics();
    let reviews_view = movie_reviews_view(reviews);
    Component::function("MovieDetails", move |scope| {
        let id = id_prop(scope.props());
        let movie = details.read(&id)?;
        let title = movie["title"].as_str().unwrap_or_default().to_owned();
        Ok(Node::fragment([
            Node::element(
                "div",
                json!({ "className": "MovieDetails" }),
                [
                    poster.element(json!({ "src": movie["poster"] })),
                    Node::element("h1", json!({}), [Node::text(title)]),
                    metrics.element(movie.clone()),
                ],
            ),
            suspense(
                None,
                spinner().element(json!({ "size": "large" })),
                reviews_view.element(json!({ "id": id })),
            ),
        ]))
    })
}

fn movie_poster() -> Component {
    Component::function("MoviePoster", |scope| {
        Ok(Node::element(
            "img",
            json!({
                "className": "MoviePoster",
                "alt": "poster",
                "src": scope.prop("src").cloned().unwrap_or(Value::Null),
                "width": "200",
                "height": "300",
            }),
            [],
        ))
    })
}

fn verdict(fresh: bool) -> &'static str {
    if fresh {
        "🍅"
    } else {
        "🤢"
    }
}

fn text_prop(scope: &spillway_core::Scope<'_>, key: &str) -> Node {
    Node::text(scope.prop(key).and_then(Value::as_str).unwrap_or_default().to_owned())
}

fn metric(class: &str, heading: &str, body: Vec<Node>) -> Node {
    Node::element(
        "div",
        json!({ "className": class }),
        [
            Node::element("h4", json!({}), [Node::text(heading.to_owned())]),
            Node::element("p", json!({}), body),
        ],
    )
}

fn movie_metrics() -> Component {
    Component::function("MovieMetrics", |scope| {
        let fresh = scope.prop("fresh").and_then(Value::as_bool).unwrap_or(false);
        Ok(Node::fragment([
            metric(
                "MovieMetrics-tomato",
                "Tomatometer",
                vec![verdict(fresh).into(), " ".into(), text_prop(scope, "rating")],
            ),
            metric(
                "MovieMetrics-audience",
                "Audience",
                vec!["🍿".into(), " ".into(), text_prop(scope, "audience")],
            ),
            metric(
                "MovieMetrics-consensus",
                "Critics Consensus",
                vec![text_prop(scope, "consensus")],
            ),
        ]))
    })
}

fn movie_reviews_view(reviews: Resource<Value>) -> Component {
    let review = movie_review();
    Component::function("MovieReviews", move |scope| {
        let id = id_prop(scope.props());
        let list = reviews.read(&id)?;
        let items: Vec<Node> = list
            .as_array()
            .map(|items| items.iter().map(|r| review.element(r.clone())).collect())
            .unwrap_or_default();
        Ok(Node::element("div", json!({ "className": "MovieReviews" }), items))
    })
}

fn movie_review() -> Component {
    Component::function("MovieReview", |scope| {
        let fresh = scope.prop("fresh").and_then(Value::as_bool).unwrap_or(false);
        let author = scope.prop("author").cloned().unwrap_or(Value::Null);
        let field = |key: &str| Node::text(author[key].as_str().unwrap_or_default().to_owned());
        Ok(Node::element(
            "blockquote",
            json!({ "className": "MovieReview" }),
            [
                Node::element("figure", json!({}), [Node::text(verdict(fresh))]),
                Node::element("p", json!({}), [text_prop(scope, "text")]),
                Node::element(
                    "footer",
                    json!({}),
                    [field("name"), Node::text(", "), field("publication")],
                ),
            ],
        ))
    })
}

fn spinner() -> Component {
    Component::function("Spinner", |scope| {
        let size = scope.prop("size").and_then(Value::as_str).unwrap_or_default();
        let class = if matches!(size, "large" | "medium") {
            "Spinner Spinner--big"
        } else {
            "Spinner"
        };
        let spinner = Node::element("div", json!({ "className": class }), [Node::text("🌀")]);
        if size == "medium" {
            return Ok(Node::element(
                "div",
                json!({ "style": { "position": "relative", "height": 200 } }),
                [spinner],
            ));
        }
        Ok(spinner)
    })
}
