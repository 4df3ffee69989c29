//! Ordered, immutable groups of conditions of one kind

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use super::condition::Condition;

/// Whether a condition guards the entry or the exit of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    Precondition,
    Postcondition,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractKind::Precondition => f.write_str("precondition"),
            ContractKind::Postcondition => f.write_str("postcondition"),
        }
    }
}

/// Why a record did not pass
pub(crate) enum Breach<'r, C> {
    /// The condition resolved to `false`
    Violated(&'r Condition<C>),
    /// The condition failed while being evaluated
    Unevaluable(&'r Condition<C>, anyhow::Error),
    /// The condition suspended during a call that must not suspend
    Suspended(&'r Condition<C>),
}

/// Conditions added by a single `require` or `ensure` declaration
pub struct ContractRecord<C> {
    kind: ContractKind,
    conditions: Arc<[Condition<C>]>,
}

impl<C> ContractRecord<C> {
    pub fn new<I>(kind: ContractKind, conditions: I) -> Self
    where
        I: IntoIterator<Item = Condition<C>>,
    {
        Self { kind, conditions: conditions.into_iter().collect() }
    }

    pub fn kind(&self) -> ContractKind {
        self.kind
    }

    pub fn conditions(&self) -> &[Condition<C>] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether any condition of the record may suspend
    pub fn may_suspend(&self) -> bool {
        self.conditions.iter().any(Condition::may_suspend)
    }

    /// Evaluate the conditions in order, stopping at the first one that does
    /// not hold.
    pub(crate) async fn check<'r>(&'r self, context: &C) -> Result<(), Breach<'r, C>> {
        trace!(kind = %self.kind(), conditions = self.len(), "checking contract record");
        for condition in self.conditions.iter() {
            match condition.check(context).await {
                Ok(true) => {}
                Ok(false) => return Err(Breach::Violated(condition)),
                Err(err) => return Err(Breach::Unevaluable(condition, err)),
            }
        }
        Ok(())
    }

    /// Same as [`ContractRecord::check`] for calls that must not suspend
    pub(crate) fn check_now<'r>(&'r self, context: &C) -> Result<(), Breach<'r, C>> {
        trace!(kind = %self.kind(), conditions = self.len(), "checking contract record");
        for condition in self.conditions.iter() {
            match condition.check_now(context) {
                Some(Ok(true)) => {}
                Some(Ok(false)) => return Err(Breach::Violated(condition)),
                Some(Err(err)) => return Err(Breach::Unevaluable(condition, err)),
                None => return Err(Breach::Suspended(condition)),
            }
        }
        Ok(())
    }
}

impl<C> Clone for ContractRecord<C> {
    fn clone(&self) -> Self {
        Self { kind: self.kind, conditions: Arc::clone(&self.conditions) }
    }
}

impl<C> fmt::Debug for ContractRecord<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractRecord")
            .field("kind", &self.kind)
            .field("conditions", &self.conditions)
            .finish()
    }
}
