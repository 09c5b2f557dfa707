//! spillway-core — UI descriptions, pending values, markup encoding and the
//! streaming wire protocol. Every other spillway crate depends on this one.

pub mod config;
pub mod markup;
pub mod node;
pub mod pending;
pub mod resource;
pub mod runtime;
pub mod wire;

pub use markup::{HtmlEncoder, MarkupEncoder, MarkupError, Namespace};
pub use node::{
    suspense, Component, ComponentElement, ComponentError, ComponentKind, ContextMap, Element,
    Interrupt, Node, Props, Provider, Scope, Timeout,
};
pub use pending::PendingValue;
pub use resource::Resource;
pub use wire::{BoundaryId, ChunkId, CommitLog, Fragment, ScriptEncoder, SlotId, StreamEvent};
