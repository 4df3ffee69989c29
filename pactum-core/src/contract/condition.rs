//! Conditions and the evaluation of their verdicts

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use tracing::trace;

use super::combinator::all_now;

/// Outcome of evaluating a condition: either a boolean right away or a
/// future that resolves to one.
pub enum Verdict<'a> {
    Ready(anyhow::Result<bool>),
    Pending(BoxFuture<'a, anyhow::Result<bool>>),
}

impl<'a> Verdict<'a> {
    /// Wrap an infallible future
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = bool> + Send + 'a,
    {
        Verdict::Pending(future.map(Ok::<bool, anyhow::Error>).boxed())
    }

    /// Wrap a future that may fail while deciding
    pub fn try_pending<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<bool>> + Send + 'a,
    {
        Verdict::Pending(future.boxed())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Verdict::Pending(_))
    }

    /// The boolean if it is available without suspending
    pub fn now(self) -> Option<anyhow::Result<bool>> {
        match self {
            Verdict::Ready(outcome) => Some(outcome),
            Verdict::Pending(_) => None,
        }
    }

    /// Resolve the verdict, suspending only when it is pending
    pub async fn resolve(self) -> anyhow::Result<bool> {
        match self {
            Verdict::Ready(outcome) => outcome,
            Verdict::Pending(future) => future.await,
        }
    }
}

impl fmt::Debug for Verdict<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Ready(outcome) => f.debug_tuple("Ready").field(outcome).finish(),
            Verdict::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

impl From<bool> for Verdict<'_> {
    fn from(value: bool) -> Self {
        Verdict::Ready(Ok(value))
    }
}

impl From<anyhow::Result<bool>> for Verdict<'_> {
    fn from(outcome: anyhow::Result<bool>) -> Self {
        Verdict::Ready(outcome)
    }
}

impl<'a> From<BoxFuture<'a, bool>> for Verdict<'a> {
    fn from(future: BoxFuture<'a, bool>) -> Self {
        Verdict::pending(future)
    }
}

impl<'a> From<BoxFuture<'a, anyhow::Result<bool>>> for Verdict<'a> {
    fn from(future: BoxFuture<'a, anyhow::Result<bool>>) -> Self {
        Verdict::Pending(future)
    }
}

/// Identity of a condition: its description and where it was declared
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConditionId {
    pub description: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl ConditionId {
    /// Identify a condition declared at the caller's location
    #[track_caller]
    pub fn here(description: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            description: description.into(),
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        }
    }

    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.file, self.line, self.column)
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.location())
    }
}

/// A condition written as a type instead of a closure
#[async_trait]
pub trait Predicate<C: Sync>: Send + Sync {
    /// Human readable statement of what must hold
    fn description(&self) -> String;

    /// Decide whether the condition holds for `context`
    async fn holds(&self, context: &C) -> anyhow::Result<bool>;
}

type CheckFn<C> = dyn for<'a> Fn(&'a C) -> Verdict<'a> + Send + Sync;

/// A predicate over an invocation context of type `C`.
///
/// Cloning is cheap; clones share the same check.
pub struct Condition<C> {
    id: ConditionId,
    check: Arc<CheckFn<C>>,
    may_suspend: bool,
}

impl<C> Condition<C> {
    fn with_check<F>(id: ConditionId, may_suspend: bool, check: F) -> Self
    where
        F: for<'a> Fn(&'a C) -> Verdict<'a> + Send + Sync + 'static,
    {
        Self { id, check: Arc::new(check), may_suspend }
    }

    /// A plain boolean condition that never suspends
    #[track_caller]
    pub fn new<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        Self::with_check(ConditionId::here(description), false, move |context| {
            Verdict::Ready(Ok(check(context)))
        })
    }

    /// A plain condition whose evaluation can fail
    #[track_caller]
    pub fn fallible<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&C) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self::with_check(ConditionId::here(description), false, move |context| {
            Verdict::Ready(check(context))
        })
    }

    /// An asynchronous condition
    #[track_caller]
    pub fn future<F>(description: impl Into<String>, check: F) -> Self
    where
        F: for<'a> Fn(&'a C) -> BoxFuture<'a, bool> + Send + Sync + 'static,
    {
        Self::with_check(ConditionId::here(description), true, move |context| {
            Verdict::pending(check(context))
        })
    }

    /// An asynchronous condition whose evaluation can fail
    #[track_caller]
    pub fn try_future<F>(description: impl Into<String>, check: F) -> Self
    where
        F: for<'a> Fn(&'a C) -> BoxFuture<'a, anyhow::Result<bool>> + Send + Sync + 'static,
    {
        Self::with_check(ConditionId::here(description), true, move |context| {
            Verdict::Pending(check(context))
        })
    }

    /// A condition that decides per call whether it needs to suspend
    #[track_caller]
    pub fn verdict<F>(description: impl Into<String>, check: F) -> Self
    where
        F: for<'a> Fn(&'a C) -> Verdict<'a> + Send + Sync + 'static,
    {
        Self::with_check(ConditionId::here(description), true, check)
    }

    #[track_caller]
    pub fn from_predicate<P>(predicate: P) -> Self
    where
        P: Predicate<C> + 'static,
        C: Sync,
    {
        let predicate = Arc::new(predicate);
        let id = ConditionId::here(predicate.description());

        Self::with_check(id, true, move |context| {
            let predicate = Arc::clone(&predicate);
            Verdict::try_pending(async move { predicate.holds(context).await })
        })
    }

    /// A composite condition holding when every part holds.
    ///
    /// Parts are evaluated in order and evaluation stops at the first part
    /// that does not hold, the same way [`awaited_all`](super::awaited_all)
    /// consumes its checks.
    #[track_caller]
    pub fn all<I>(description: impl Into<String>, conditions: I) -> Self
    where
        I: IntoIterator<Item = Condition<C>>,
        C: Sync + 'static,
    {
        let conditions: Arc<[Condition<C>]> = conditions.into_iter().collect();
        let may_suspend = conditions.iter().any(Condition::may_suspend);
        let id = ConditionId::here(description);

        Self::with_check(id, may_suspend, move |context| {
            if may_suspend {
                let conditions = Arc::clone(&conditions);
                return Verdict::try_pending(async move {
                    for condition in conditions.iter() {
                        if !condition.check(context).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                });
            }

            match all_now(conditions.iter().map(|condition| condition.evaluate(context))) {
                Some(outcome) => Verdict::Ready(outcome),
                None => Verdict::Ready(Err(anyhow::anyhow!(
                    "a part of a non-suspending composite condition suspended"
                ))),
            }
        })
    }

    pub fn id(&self) -> &ConditionId {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.id.description
    }

    /// Whether evaluating this condition may return a pending verdict
    pub fn may_suspend(&self) -> bool {
        self.may_suspend
    }

    /// Run the check against `context` and return its verdict
    pub fn evaluate<'a>(&self, context: &'a C) -> Verdict<'a> {
        trace!(condition = %self.id.description, "evaluating condition");
        (self.check)(context)
    }

    /// Evaluate and resolve the verdict
    pub async fn check(&self, context: &C) -> anyhow::Result<bool> {
        self.evaluate(context).resolve().await
    }

    /// Evaluate without suspending; `None` when the verdict is pending
    pub fn check_now(&self, context: &C) -> Option<anyhow::Result<bool>> {
        self.evaluate(context).now()
    }
}

impl<C> Clone for Condition<C> {
    fn clone(&self) -> Self {
        Self { id: self.id.clone(), check: Arc::clone(&self.check), may_suspend: self.may_suspend }
    }
}

impl<C> fmt::Debug for Condition<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("id", &self.id)
            .field("may_suspend", &self.may_suspend)
            .finish()
    }
}

/// Build a [`Condition`] from a closure, using the closure's source as the
/// description.
#[macro_export]
macro_rules! condition {
    ($check:expr $(,)?) => {
        $crate::contract::Condition::new(stringify!($check), $check)
    };
}
