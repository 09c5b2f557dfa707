//! Pending values: the asynchronous dependency a component reports when it
//! cannot produce its description yet.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};

/// A handle to an in-flight asynchronous value.
///
/// Cloning is cheap and every clone observes the same completion: the
/// underlying future is shared, so any number of waiters subscribe to a
/// single load.
#[derive(Clone)]
pub struct PendingValue {
    label: Arc<str>,
    future: Shared<BoxFuture<'static, ()>>,
}

impl PendingValue {
    pub fn new<F>(label: impl Into<Arc<str>>, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            label: label.into(),
            future: future.boxed().shared(),
        }
    }

    /// A value that is already resolved. Waiting on it completes immediately.
    pub fn ready(label: impl Into<Arc<str>>) -> Self {
        Self::new(label, async {})
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// True once some waiter has driven the value to completion.
    pub fn is_resolved(&self) -> bool {
        self.future.peek().is_some()
    }

    /// Future completing when the value resolves.
    pub fn resolved(&self) -> Shared<BoxFuture<'static, ()>> {
        self.future.clone()
    }
}

impl fmt::Debug for PendingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingValue")
            .field("label", &self.label)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn ready_value_resolves_immediately() {
        let value = PendingValue::ready("noop");
        assert!(!value.is_resolved());
        value.resolved().await;
        assert!(value.is_resolved());
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_one_completion() {
        let value = PendingValue::new("sleep", tokio::time::sleep(Duration::from_millis(50)));
        let other = value.clone();
        let waiter = tokio::spawn(other.resolved());
        value.resolved().await;
        waiter.await.unwrap();
        assert!(value.is_resolved());
        assert_eq!(value.label(), "sleep");
    }
}
