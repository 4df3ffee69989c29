//! Preconditions and postconditions around sync and async callables
//!
//! A [`Contract`] collects conditions at declaration time and is then wrapped
//! around a callable. Every call of the resulting [`Contracted`] or
//! [`AsyncContracted`] checks the preconditions against the arguments, runs the
//! callable, and checks the postconditions against the arguments and the
//! result. The first condition that does not hold is reported as a
//! [`Violation`].
//!
//! Declarations read like decorators from the call site inward: every
//! `require`/`ensure` adds a layer inside the layers declared before it.
//! Preconditions therefore run in declaration order and postconditions in
//! reverse declaration order.

pub mod combinator;
pub mod condition;
pub mod record;
pub mod snapshot;
pub mod violation;
pub mod wrapper;

#[cfg(test)]
mod tests;

pub use combinator::{all_now, awaited_all};
pub use condition::{Condition, ConditionId, Predicate, Verdict};
pub use record::{ContractKind, ContractRecord};
pub use snapshot::{Old, Snapshot};
pub use violation::{ContextRepr, Violation, ViolationReporter};
pub use wrapper::{AsyncContracted, Contracted};

use futures::future::BoxFuture;
use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::config::ContractsConfig;
use wrapper::Checks;

#[derive(Debug, Error)]
pub enum ContractError<E = Infallible> {
    #[error(transparent)]
    Violation(Box<Violation>),

    #[error("condition {condition} could not be evaluated")]
    Evaluation {
        condition: ConditionId,
        #[source]
        source: anyhow::Error,
    },

    #[error("snapshot {name:?} could not be captured")]
    Snapshot {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Callee(E),
}

impl<E> ContractError<E> {
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            ContractError::Violation(violation) => Some(violation.as_ref()),
            _ => None,
        }
    }

    pub fn is_violation(&self) -> bool {
        matches!(self, ContractError::Violation(_))
    }

    /// Kind of the broken contract, if this is a violation
    pub fn kind(&self) -> Option<ContractKind> {
        self.violation().map(|violation| violation.kind)
    }

    /// The callable's own error, if that is what failed
    pub fn into_callee(self) -> Option<E> {
        match self {
            ContractError::Callee(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T, E = Infallible> = std::result::Result<T, ContractError<E>>;

/// Invalid contract declarations, reported when wrapping a callable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecorationError {
    #[error("There are conflicting snapshots with the name: {0:?}")]
    ConflictingSnapshot(String),

    #[error("Snapshot {0:?} was declared, but the contract has no postcondition")]
    SnapshotWithoutPostcondition(String),

    #[error("Unexpected asynchronous condition {condition} for the synchronous callable {function}")]
    AsyncCondition { condition: ConditionId, function: String },

    #[error("Unexpected asynchronous snapshot {snapshot:?} for the synchronous callable {function}")]
    AsyncSnapshot { snapshot: String, function: String },
}

/// Context of a postcondition: the arguments after the call, the result and
/// the snapshot values captured before the call.
#[derive(Debug)]
pub struct Post<A, R> {
    pub args: A,
    pub result: R,
    pub old: Old,
}

enum Layer<A, R> {
    Require(ContractRecord<A>),
    Ensure(ContractRecord<Post<A, R>>),
}

/// Declaration of the contract of one callable
pub struct Contract<A, R> {
    function: String,
    layers: Vec<Layer<A, R>>,
    snapshots: Vec<Snapshot<A>>,
    config: ContractsConfig,
}

impl<A, R> Contract<A, R> {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            layers: Vec::new(),
            snapshots: Vec::new(),
            config: ContractsConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ContractsConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a precondition layer
    pub fn require(self, condition: Condition<A>) -> Self {
        self.require_all([condition])
    }

    /// Add a precondition layer made of several conditions, checked in order
    pub fn require_all<I>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = Condition<A>>,
    {
        self.layers.push(Layer::Require(ContractRecord::new(ContractKind::Precondition, conditions)));
        self
    }

    /// Add a postcondition layer
    pub fn ensure(self, condition: Condition<Post<A, R>>) -> Self {
        self.ensure_all([condition])
    }

    /// Add a postcondition layer made of several conditions, checked in order
    pub fn ensure_all<I>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = Condition<Post<A, R>>>,
    {
        self.layers.push(Layer::Ensure(ContractRecord::new(ContractKind::Postcondition, conditions)));
        self
    }

    /// Capture a value before every call, available to postconditions as `old`
    pub fn snapshot(mut self, snapshot: Snapshot<A>) -> Self {
        self.snapshots.push(snapshot);
        self
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    /// Precondition records in evaluation order
    pub fn preconditions(&self) -> impl Iterator<Item = &ContractRecord<A>> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::Require(record) => Some(record),
            Layer::Ensure(_) => None,
        })
    }

    /// Postcondition records in evaluation order
    pub fn postconditions(&self) -> impl Iterator<Item = &ContractRecord<Post<A, R>>> {
        self.layers.iter().rev().filter_map(|layer| match layer {
            Layer::Ensure(record) => Some(record),
            Layer::Require(_) => None,
        })
    }

    /// Wrap a synchronous callable.
    ///
    /// Fails when a condition or snapshot of the contract is asynchronous.
    pub fn wrap<F, E>(self, callable: F) -> std::result::Result<Contracted<A, R, E, F>, DecorationError>
    where
        F: Fn(&mut A) -> std::result::Result<R, E>,
    {
        self.validate()?;

        let asynchronous = self
            .preconditions()
            .filter(|record| record.may_suspend())
            .flat_map(|record| record.conditions())
            .find(|condition| condition.may_suspend())
            .map(|condition| condition.id().clone())
            .or_else(|| {
                self.postconditions()
                    .filter(|record| record.may_suspend())
                    .flat_map(|record| record.conditions())
                    .find(|condition| condition.may_suspend())
                    .map(|condition| condition.id().clone())
            });

        if let Some(condition) = asynchronous {
            return Err(DecorationError::AsyncCondition { condition, function: self.function });
        }

        if let Some(snapshot) = self.snapshots.iter().find(|snapshot| snapshot.may_suspend()) {
            return Err(DecorationError::AsyncSnapshot {
                snapshot: snapshot.name().to_string(),
                function: self.function.clone(),
            });
        }

        Ok(Contracted::new(self.into_checks(), callable))
    }

    /// Wrap an asynchronous callable
    pub fn wrap_async<F, E>(
        self,
        callable: F,
    ) -> std::result::Result<AsyncContracted<A, R, E, F>, DecorationError>
    where
        F: for<'a> Fn(&'a mut A) -> BoxFuture<'a, std::result::Result<R, E>> + Send + Sync,
    {
        self.validate()?;
        Ok(AsyncContracted::new(self.into_checks(), callable))
    }

    fn validate(&self) -> std::result::Result<(), DecorationError> {
        let mut names = HashSet::new();
        for snapshot in &self.snapshots {
            if !names.insert(snapshot.name()) {
                return Err(DecorationError::ConflictingSnapshot(snapshot.name().to_string()));
            }
        }

        if let Some(snapshot) = self.snapshots.first() {
            if self.postconditions().next().is_none() {
                return Err(DecorationError::SnapshotWithoutPostcondition(snapshot.name().to_string()));
            }
        }

        Ok(())
    }

    fn into_checks(self) -> Checks<A, R> {
        let mut pre = Vec::new();
        let mut post = Vec::new();
        for layer in self.layers {
            match layer {
                Layer::Require(record) => pre.push(record),
                Layer::Ensure(record) => post.push(record),
            }
        }
        post.reverse();

        debug!(
            function = %self.function,
            preconditions = pre.len(),
            postconditions = post.len(),
            snapshots = self.snapshots.len(),
            "contract attached"
        );

        Checks::new(self.function, pre, post, self.snapshots, ViolationReporter::new(self.config))
    }
}

impl<A, R> fmt::Debug for Contract<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("function", &self.function)
            .field("preconditions", &self.preconditions().collect::<Vec<_>>())
            .field("postconditions", &self.postconditions().collect::<Vec<_>>())
            .field("snapshots", &self.snapshots)
            .finish()
    }
}
