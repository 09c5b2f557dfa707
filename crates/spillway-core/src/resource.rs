//! Keyed asynchronous resources.
//!
//! A [`Resource`] caches one load per key. Reading a key that is still
//! loading interrupts the calling component with the load's
//! [`PendingValue`]; once the load lands, later reads return the value.
//! Resources are meant to live for one request.

use std::future::Future;
use std::sync::Arc;

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::node::{ComponentError, Interrupt};
use crate::pending::PendingValue;

type Loader<V> = dyn Fn(String) -> BoxFuture<'static, Result<V, ComponentError>> + Send + Sync;

enum Entry<V> {
    Loading(PendingValue),
    Ready(V),
    Failed(ComponentError),
}

pub struct Resource<V> {
    name: Arc<str>,
    loader: Arc<Loader<V>>,
    entries: Arc<DashMap<String, Entry<V>>>,
}

impl<V> Clone for Resource<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            loader: self.loader.clone(),
            entries: self.entries.clone(),
        }
    }
}

impl<V> Resource<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, loader: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, ComponentError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            loader: Arc::new(move |key| loader(key).boxed()),
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start loading `key` without waiting for it. No-op if the key is
    /// already loading or loaded.
    pub fn preload(&self, key: &str) {
        self.load(key);
    }

    /// The value for `key`, or an interrupt: pending while it loads, failed
    /// if the load failed.
    pub fn read(&self, key: &str) -> Result<V, Interrupt> {
        if let Some(entry) = self.entries.get(key) {
            return match entry.value() {
                Entry::Ready(value) => Ok(value.clone()),
                Entry::Failed(error) => Err(Interrupt::Failed(error.clone())),
                Entry::Loading(pending) => Err(Interrupt::Pending(pending.clone())),
            };
        }
        match self.load(key) {
            Some(pending) => Err(Interrupt::Pending(pending)),
            None => self.read(key),
        }
    }

    /// Registers a load for `key` if there is none yet and returns its
    /// pending value while it is in flight.
    fn load(&self, key: &str) -> Option<PendingValue> {
        let (pending, fresh) = match self.entries.entry(key.to_owned()) {
            MapEntry::Occupied(entry) => match entry.get() {
                Entry::Loading(pending) => (pending.clone(), false),
                Entry::Ready(_) | Entry::Failed(_) => return None,
            },
            MapEntry::Vacant(entry) => {
                let pending = self.loading(key);
                entry.insert(Entry::Loading(pending.clone()));
                (pending, true)
            }
        };
        if fresh {
            // Start the load now rather than when the first waiter polls it.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(pending.resolved());
            }
            tracing::trace!(resource = %self.name, key, "load started");
        }
        Some(pending)
    }

    fn loading(&self, key: &str) -> PendingValue {
        let load = (self.loader)(key.to_owned());
        let entries = self.entries.clone();
        let owned = key.to_owned();
        let label = format!("{}:{}", self.name, key);
        PendingValue::new(label, async move {
            let entry = match load.await {
                Ok(value) => Entry::Ready(value),
                Err(error) => Entry::Failed(error),
            };
            entries.insert(owned, entry);
        })
    }
}
