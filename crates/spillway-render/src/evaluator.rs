//! Component evaluation seam.

use serde_json::Value;

use spillway_core::{Component, ComponentError, ComponentKind, Interrupt, Node, PendingValue, Scope};

/// Result of evaluating a component once.
#[derive(Debug)]
pub enum Evaluation {
    Ready(Node),
    /// The component needs `PendingValue` before it can render.
    Suspended(PendingValue),
}

/// Turns a component and its scope into the next description.
///
/// `state` is the instance state of a class component. It is seeded from the
/// component's initial state on first render and kept across retries.
pub trait ComponentEvaluator: Send + Sync {
    fn evaluate(
        &self,
        component: &Component,
        scope: &Scope<'_>,
        state: &mut Value,
    ) -> Result<Evaluation, ComponentError>;
}

/// Calls the component's render function directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectEvaluator;

impl ComponentEvaluator for DirectEvaluator {
    fn evaluate(
        &self,
        component: &Component,
        scope: &Scope<'_>,
        state: &mut Value,
    ) -> Result<Evaluation, ComponentError> {
        let result = match component.kind() {
            ComponentKind::Function(render) => render(scope),
            ComponentKind::Class { render, .. } => render(scope, state),
        };
        match result {
            Ok(node) => Ok(Evaluation::Ready(node)),
            Err(Interrupt::Pending(value)) => Ok(Evaluation::Suspended(value)),
            Err(Interrupt::Failed(error)) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spillway_core::{ContextMap, Props};

    #[test]
    fn class_components_mutate_their_state() {
        let counter = Component::class("Counter", json!(0), |_, state| {
            let next = state.as_u64().unwrap_or(0) + 1;
            *state = json!(next);
            Ok(Node::Number(next as f64))
        });
        let props = Props::new();
        let context = ContextMap::default();
        let scope = Scope::new(&props, &[], &context);
        let mut state = json!(0);
        for _ in 0..2 {
            DirectEvaluator.evaluate(&counter, &scope, &mut state).unwrap();
        }
        assert_eq!(state, json!(2));
    }

    #[test]
    fn pending_interrupts_become_suspensions() {
        let waits = Component::function("Waits", |_| Err(PendingValue::ready("data").into()));
        let props = Props::new();
        let context = ContextMap::default();
        let scope = Scope::new(&props, &[], &context);
        let evaluation = DirectEvaluator
            .evaluate(&waits, &scope, &mut Value::Null)
            .unwrap();
        assert!(matches!(evaluation, Evaluation::Suspended(v) if v.label() == "data"));
    }

    #[test]
    fn failures_are_errors() {
        let fails = Component::function("Fails", |_| Err(ComponentError::new("boom").into()));
        let props = Props::new();
        let context = ContextMap::default();
        let scope = Scope::new(&props, &[], &context);
        let error = DirectEvaluator
            .evaluate(&fails, &scope, &mut Value::Null)
            .unwrap_err();
        assert_eq!(error.message(), "boom");
    }
}
