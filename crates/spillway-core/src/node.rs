//! UI descriptions: the immutable tree handed to the renderer.
//!
//! A [`Node`] is cheap to clone: every non-trivial variant is reference
//! counted, so the renderer can keep a copy per chunk without deep copies.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::pending::PendingValue;

/// Element and component properties.
pub type Props = serde_json::Map<String, Value>;

/// One node of a UI description.
#[derive(Clone, Default)]
pub enum Node {
    #[default]
    Empty,
    Text(Arc<str>),
    Number(f64),
    Element(Arc<Element>),
    Component(Arc<ComponentElement>),
    Fragment(Arc<[Node]>),
    Provider(Arc<Provider>),
    Timeout(Timeout),
}

/// A host element, rendered as a tag.
#[derive(Debug)]
pub struct Element {
    pub tag: String,
    pub props: Props,
    pub children: Vec<Node>,
}

/// A component invocation.
#[derive(Debug)]
pub struct ComponentElement {
    pub component: Component,
    pub props: Props,
    pub children: Vec<Node>,
}

/// Extends the legacy context seen by every descendant.
#[derive(Debug)]
pub struct Provider {
    pub key: String,
    pub value: Value,
    pub children: Vec<Node>,
}

type TimeoutRender = dyn Fn(bool) -> Node + Send + Sync;

/// Timeout marker: bounds how long its content may stay pending before the
/// fallback is shown instead.
///
/// `render(false)` produces the real content, `render(true)` the fallback.
#[derive(Clone)]
pub struct Timeout {
    pub ms: Option<u64>,
    render: Arc<TimeoutRender>,
}

impl Timeout {
    pub fn new<F>(ms: Option<u64>, render: F) -> Self
    where
        F: Fn(bool) -> Node + Send + Sync + 'static,
    {
        Self {
            ms,
            render: Arc::new(render),
        }
    }

    pub fn render(&self, expired: bool) -> Node {
        (self.render)(expired)
    }
}

impl fmt::Debug for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeout").field("ms", &self.ms).finish()
    }
}

/// Wrap `children` so that `fallback` is shown once they have been pending
/// for longer than `max_duration` milliseconds.
pub fn suspense(max_duration: Option<u64>, fallback: Node, children: Node) -> Node {
    Node::Timeout(Timeout::new(max_duration, move |expired| {
        if expired {
            fallback.clone()
        } else {
            children.clone()
        }
    }))
}

impl Node {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Node::Text(text.into())
    }

    /// Host element. `props` must be a JSON object; anything else is
    /// treated as no properties.
    pub fn element(
        tag: impl Into<String>,
        props: Value,
        children: impl IntoIterator<Item = Node>,
    ) -> Self {
        Node::Element(Arc::new(Element {
            tag: tag.into(),
            props: into_props(props),
            children: children.into_iter().collect(),
        }))
    }

    pub fn fragment(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Fragment(children.into_iter().collect())
    }

    pub fn provider(
        key: impl Into<String>,
        value: Value,
        children: impl IntoIterator<Item = Node>,
    ) -> Self {
        Node::Provider(Arc::new(Provider {
            key: key.into(),
            value,
            children: children.into_iter().collect(),
        }))
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.into())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text.into())
    }
}

impl From<f64> for Node {
    fn from(n: f64) -> Self {
        Node::Number(n)
    }
}

impl From<Vec<Node>> for Node {
    fn from(children: Vec<Node>) -> Self {
        Node::fragment(children)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Empty => f.write_str("Empty"),
            Node::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Node::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Node::Element(el) => f
                .debug_struct("Element")
                .field("tag", &el.tag)
                .field("children", &el.children.len())
                .finish(),
            Node::Component(c) => f
                .debug_tuple("Component")
                .field(&c.component.name())
                .finish(),
            Node::Fragment(children) => f.debug_tuple("Fragment").field(&children.len()).finish(),
            Node::Provider(p) => f.debug_tuple("Provider").field(&p.key).finish(),
            Node::Timeout(t) => t.fmt(f),
        }
    }
}

pub(crate) fn into_props(value: Value) -> Props {
    match value {
        Value::Object(map) => map,
        _ => Props::new(),
    }
}

// ── Components ────────────────────────────────────────────────────────────────

/// Why a component could not produce a description.
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// Waiting on an asynchronous value. Recoverable.
    Pending(PendingValue),
    /// Anything else. Fatal for the render.
    Failed(ComponentError),
}

impl From<PendingValue> for Interrupt {
    fn from(value: PendingValue) -> Self {
        Interrupt::Pending(value)
    }
}

impl From<ComponentError> for Interrupt {
    fn from(error: ComponentError) -> Self {
        Interrupt::Failed(error)
    }
}

/// A non-pending component failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ComponentError {
    message: String,
}

impl ComponentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

type FunctionRender = dyn Fn(&Scope<'_>) -> Result<Node, Interrupt> + Send + Sync;
type ClassRender = dyn Fn(&Scope<'_>, &mut Value) -> Result<Node, Interrupt> + Send + Sync;

#[derive(Clone)]
pub enum ComponentKind {
    Function(Arc<FunctionRender>),
    /// Stateful component. `initial_state` seeds the instance the first
    /// time it is rendered; the state survives retried renders.
    Class {
        initial_state: Value,
        render: Arc<ClassRender>,
    },
}

#[derive(Clone)]
pub struct Component {
    name: Arc<str>,
    kind: ComponentKind,
}

impl Component {
    pub fn function<F>(name: impl Into<Arc<str>>, render: F) -> Self
    where
        F: Fn(&Scope<'_>) -> Result<Node, Interrupt> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: ComponentKind::Function(Arc::new(render)),
        }
    }

    pub fn class<F>(name: impl Into<Arc<str>>, initial_state: Value, render: F) -> Self
    where
        F: Fn(&Scope<'_>, &mut Value) -> Result<Node, Interrupt> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: ComponentKind::Class {
                initial_state,
                render: Arc::new(render),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, ComponentKind::Class { .. })
    }

    /// Invoke the component with `props`.
    pub fn element(&self, props: Value) -> Node {
        self.element_with_children(props, Vec::new())
    }

    pub fn element_with_children(
        &self,
        props: Value,
        children: impl IntoIterator<Item = Node>,
    ) -> Node {
        Node::Component(Arc::new(ComponentElement {
            component: self.clone(),
            props: into_props(props),
            children: children.into_iter().collect(),
        }))
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("class", &self.is_class())
            .finish()
    }
}

// ── Scope ─────────────────────────────────────────────────────────────────────

/// Legacy context: key/value pairs visible to every descendant of a provider.
#[derive(Debug, Clone, Default)]
pub struct ContextMap(Arc<HashMap<String, Value>>);

impl ContextMap {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// A copy of this context with `key` set to `value`.
    pub fn with(&self, key: &str, value: Value) -> Self {
        let mut map = (*self.0).clone();
        map.insert(key.to_owned(), value);
        Self(Arc::new(map))
    }
}

/// What a component sees while rendering.
pub struct Scope<'a> {
    props: &'a Props,
    children: &'a [Node],
    context: &'a ContextMap,
}

impl<'a> Scope<'a> {
    pub fn new(props: &'a Props, children: &'a [Node], context: &'a ContextMap) -> Self {
        Self {
            props,
            children,
            context,
        }
    }

    pub fn props(&self) -> &Props {
        self.props
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    pub fn children(&self) -> &[Node] {
        self.children
    }

    pub fn context(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }
}
