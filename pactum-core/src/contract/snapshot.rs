//! Values captured before a call so postconditions can compare against them

use futures::FutureExt;
use futures::future::BoxFuture;
use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

trait Captured: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug + Send + Sync> Captured for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) struct OldValue {
    value: Box<dyn Captured>,
    type_name: &'static str,
}

impl OldValue {
    fn new<V: Any + fmt::Debug + Send + Sync>(value: V) -> Self {
        Self { value: Box::new(value), type_name: type_name::<V>() }
    }
}

/// Snapshot values of one call, looked up by snapshot name
#[derive(Default)]
pub struct Old {
    values: Vec<(String, OldValue)>,
}

impl Old {
    pub(crate) fn insert(&mut self, name: &str, value: OldValue) {
        self.values.push((name.to_string(), value));
    }

    /// Get the value captured by the snapshot called `name`
    pub fn get<V: Any>(&self, name: &str) -> anyhow::Result<&V> {
        let old = self
            .values
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, old)| old)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "The snapshot {:?} is not available in OLD. \
                     Has the contract been given a snapshot with this name?",
                    name
                )
            })?;

        (*old.value).as_any().downcast_ref::<V>().ok_or_else(|| {
            anyhow::anyhow!(
                "The snapshot {:?} holds a value of type {}, not {}",
                name,
                old.type_name,
                type_name::<V>()
            )
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Old {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter().map(|(name, old)| (name, &old.value))).finish()
    }
}

pub(crate) enum Capture<'a> {
    Ready(anyhow::Result<OldValue>),
    Pending(BoxFuture<'a, anyhow::Result<OldValue>>),
}

type CaptureFn<A> = dyn for<'a> Fn(&'a A) -> Capture<'a> + Send + Sync;

/// A named capture of argument-derived state taken before the call
pub struct Snapshot<A> {
    name: String,
    capture: Arc<CaptureFn<A>>,
    may_suspend: bool,
}

impl<A> Snapshot<A> {
    fn with_capture<F>(name: impl Into<String>, may_suspend: bool, capture: F) -> Self
    where
        F: for<'a> Fn(&'a A) -> Capture<'a> + Send + Sync + 'static,
    {
        Self { name: name.into(), capture: Arc::new(capture), may_suspend }
    }

    pub fn new<V, F>(name: impl Into<String>, capture: F) -> Self
    where
        V: Any + fmt::Debug + Send + Sync,
        F: Fn(&A) -> V + Send + Sync + 'static,
    {
        Self::with_capture(name, false, move |args| Capture::Ready(Ok(OldValue::new(capture(args)))))
    }

    pub fn fallible<V, F>(name: impl Into<String>, capture: F) -> Self
    where
        V: Any + fmt::Debug + Send + Sync,
        F: Fn(&A) -> anyhow::Result<V> + Send + Sync + 'static,
    {
        Self::with_capture(name, false, move |args| Capture::Ready(capture(args).map(OldValue::new)))
    }

    pub fn future<V, F>(name: impl Into<String>, capture: F) -> Self
    where
        V: Any + fmt::Debug + Send + Sync,
        F: for<'a> Fn(&'a A) -> BoxFuture<'a, V> + Send + Sync + 'static,
    {
        Self::with_capture(name, true, move |args| {
            Capture::Pending(capture(args).map(|value| Ok(OldValue::new(value))).boxed())
        })
    }

    pub fn try_future<V, F>(name: impl Into<String>, capture: F) -> Self
    where
        V: Any + fmt::Debug + Send + Sync,
        F: for<'a> Fn(&'a A) -> BoxFuture<'a, anyhow::Result<V>> + Send + Sync + 'static,
    {
        Self::with_capture(name, true, move |args| {
            Capture::Pending(capture(args).map(|value| value.map(OldValue::new)).boxed())
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn may_suspend(&self) -> bool {
        self.may_suspend
    }

    pub(crate) async fn capture(&self, args: &A) -> anyhow::Result<OldValue> {
        trace!(snapshot = %self.name, "capturing snapshot");
        match (self.capture)(args) {
            Capture::Ready(value) => value,
            Capture::Pending(future) => future.await,
        }
    }

    /// Capture without suspending; `None` when the capture is asynchronous
    pub(crate) fn capture_now(&self, args: &A) -> Option<anyhow::Result<OldValue>> {
        trace!(snapshot = %self.name, "capturing snapshot");
        match (self.capture)(args) {
            Capture::Ready(value) => Some(value),
            Capture::Pending(_) => None,
        }
    }
}

impl<A> Clone for Snapshot<A> {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), capture: Arc::clone(&self.capture), may_suspend: self.may_suspend }
    }
}

impl<A> fmt::Debug for Snapshot<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot").field("name", &self.name).field("may_suspend", &self.may_suspend).finish()
    }
}
