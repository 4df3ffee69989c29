//! Callables wrapped with their contract checks

use futures::future::BoxFuture;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, warn};

use super::condition::ConditionId;
use super::record::{Breach, ContractRecord};
use super::snapshot::{Old, Snapshot};
use super::violation::{Violation, ViolationReporter};
use super::{ContractError, Post, Result};
use crate::config::ContractsConfig;

/// Everything a wrapper checks around the callable, in evaluation order
pub(crate) struct Checks<A, R> {
    function: String,
    pre: Vec<ContractRecord<A>>,
    post: Vec<ContractRecord<Post<A, R>>>,
    snapshots: Vec<Snapshot<A>>,
    reporter: ViolationReporter,
}

impl<A, R> Checks<A, R> {
    pub(crate) fn new(
        function: String,
        pre: Vec<ContractRecord<A>>,
        post: Vec<ContractRecord<Post<A, R>>>,
        snapshots: Vec<Snapshot<A>>,
        reporter: ViolationReporter,
    ) -> Self {
        Self { function, pre, post, snapshots, reporter }
    }

    fn fail<C, E>(&self, breach: Breach<'_, C>, report: impl FnOnce(&ConditionId) -> Violation) -> ContractError<E> {
        match breach {
            Breach::Violated(condition) => {
                let violation = report(condition.id());
                if self.reporter.config().log_violations {
                    warn!(
                        function = %self.function,
                        kind = %violation.kind,
                        condition = %condition.id(),
                        "contract violated"
                    );
                }
                ContractError::Violation(Box::new(violation))
            }
            Breach::Unevaluable(condition, source) => {
                debug!(function = %self.function, condition = %condition.id(), "condition could not be evaluated");
                ContractError::Evaluation { condition: condition.id().clone(), source }
            }
            Breach::Suspended(condition) => ContractError::Evaluation {
                condition: condition.id().clone(),
                source: anyhow::anyhow!("the condition suspended during a synchronous call"),
            },
        }
    }

    fn snapshot_error<E>(snapshot: &Snapshot<A>, source: anyhow::Error) -> ContractError<E> {
        ContractError::Snapshot { name: snapshot.name().to_string(), source }
    }
}

impl<A: fmt::Debug, R: fmt::Debug> Checks<A, R> {
    fn check_pre_now<E>(&self, args: &A) -> Result<(), E> {
        for record in &self.pre {
            if let Err(breach) = record.check_now(args) {
                return Err(self.fail(breach, |id| self.reporter.precondition(&self.function, id, args)));
            }
        }
        Ok(())
    }

    fn check_post_now<E>(&self, post: &Post<A, R>) -> Result<(), E> {
        for record in &self.post {
            if let Err(breach) = record.check_now(post) {
                return Err(self.fail(breach, |id| {
                    self.reporter.postcondition(&self.function, id, &post.args, &post.result, &post.old)
                }));
            }
        }
        Ok(())
    }

    fn capture_now<E>(&self, args: &A) -> Result<Old, E> {
        let mut old = Old::default();
        if self.post.is_empty() {
            return Ok(old);
        }

        for snapshot in &self.snapshots {
            let value = snapshot
                .capture_now(args)
                .unwrap_or_else(|| Err(anyhow::anyhow!("the snapshot suspended during a synchronous call")))
                .map_err(|source| Self::snapshot_error::<E>(snapshot, source))?;
            old.insert(snapshot.name(), value);
        }
        Ok(old)
    }

    async fn check_pre<E>(&self, args: &A) -> Result<(), E> {
        for record in &self.pre {
            if let Err(breach) = record.check(args).await {
                return Err(self.fail(breach, |id| self.reporter.precondition(&self.function, id, args)));
            }
        }
        Ok(())
    }

    async fn check_post<E>(&self, post: &Post<A, R>) -> Result<(), E> {
        for record in &self.post {
            if let Err(breach) = record.check(post).await {
                return Err(self.fail(breach, |id| {
                    self.reporter.postcondition(&self.function, id, &post.args, &post.result, &post.old)
                }));
            }
        }
        Ok(())
    }

    async fn capture<E>(&self, args: &A) -> Result<Old, E> {
        let mut old = Old::default();
        if self.post.is_empty() {
            return Ok(old);
        }

        for snapshot in &self.snapshots {
            let value = snapshot.capture(args).await.map_err(|source| Self::snapshot_error::<E>(snapshot, source))?;
            old.insert(snapshot.name(), value);
        }
        Ok(old)
    }
}

impl<A, R> fmt::Debug for Checks<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checks")
            .field("function", &self.function)
            .field("pre", &self.pre)
            .field("post", &self.post)
            .field("snapshots", &self.snapshots)
            .finish()
    }
}

/// A synchronous callable together with its contract.
///
/// [`Contracted::call`] never suspends.
pub struct Contracted<A, R, E, F> {
    checks: Checks<A, R>,
    callable: F,
    _marker: PhantomData<fn() -> E>,
}

impl<A, R, E, F> Contracted<A, R, E, F> {
    pub(crate) fn new(checks: Checks<A, R>, callable: F) -> Self {
        Self { checks, callable, _marker: PhantomData }
    }

    pub fn function(&self) -> &str {
        &self.checks.function
    }

    pub fn config(&self) -> &ContractsConfig {
        self.checks.reporter.config()
    }
}

impl<A, R, E, F> Contracted<A, R, E, F>
where
    A: fmt::Debug,
    R: fmt::Debug,
    F: Fn(&mut A) -> std::result::Result<R, E>,
{
    /// Check the preconditions, call, check the postconditions
    pub fn call(&self, mut args: A) -> Result<R, E> {
        debug!(function = %self.checks.function, "checking preconditions");
        self.checks.check_pre_now(&args)?;

        let old = self.checks.capture_now(&args)?;
        let result = (self.callable)(&mut args).map_err(ContractError::Callee)?;
        if self.checks.post.is_empty() {
            return Ok(result);
        }

        debug!(function = %self.checks.function, "checking postconditions");
        let post = Post { args, result, old };
        self.checks.check_post_now(&post)?;
        Ok(post.result)
    }
}

impl<A, R, E, F> fmt::Debug for Contracted<A, R, E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contracted").field("checks", &self.checks).finish_non_exhaustive()
    }
}

/// An asynchronous callable together with its contract.
///
/// [`AsyncContracted::call`] is awaited exactly like the wrapped callable.
pub struct AsyncContracted<A, R, E, F> {
    checks: Checks<A, R>,
    callable: F,
    _marker: PhantomData<fn() -> E>,
}

impl<A, R, E, F> AsyncContracted<A, R, E, F> {
    pub(crate) fn new(checks: Checks<A, R>, callable: F) -> Self {
        Self { checks, callable, _marker: PhantomData }
    }

    pub fn function(&self) -> &str {
        &self.checks.function
    }

    pub fn config(&self) -> &ContractsConfig {
        self.checks.reporter.config()
    }
}

impl<A, R, E, F> AsyncContracted<A, R, E, F>
where
    A: fmt::Debug + Send + Sync,
    R: fmt::Debug + Send + Sync,
    E: Send,
    F: for<'a> Fn(&'a mut A) -> BoxFuture<'a, std::result::Result<R, E>> + Send + Sync,
{
    /// Check the preconditions, call and await, check the postconditions
    pub async fn call(&self, mut args: A) -> Result<R, E> {
        debug!(function = %self.checks.function, "checking preconditions");
        self.checks.check_pre(&args).await?;

        let old = self.checks.capture(&args).await?;
        let result = (self.callable)(&mut args).await.map_err(ContractError::Callee)?;
        if self.checks.post.is_empty() {
            return Ok(result);
        }

        debug!(function = %self.checks.function, "checking postconditions");
        let post = Post { args, result, old };
        self.checks.check_post(&post).await?;
        Ok(post.result)
    }
}

impl<A, R, E, F> fmt::Debug for AsyncContracted<A, R, E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncContracted").field("checks", &self.checks).finish_non_exhaustive()
    }
}
