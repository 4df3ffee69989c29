//! Structured reports of broken contracts

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use thiserror::Error;

use super::condition::ConditionId;
use super::record::ContractKind;
use super::snapshot::Old;
use crate::config::ContractsConfig;

/// Representations of the values a failing condition was evaluated against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRepr {
    pub args: String,
    pub result: Option<String>,
    pub old: Option<String>,
}

/// A condition that did not hold.
///
/// Carries enough to reproduce the failure: what kind of contract broke,
/// which condition (description and source location), on which callable and
/// with which values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct Violation {
    pub kind: ContractKind,
    pub function: String,
    pub condition: ConditionId,
    pub context: ContextRepr,
    pub message: String,
}

impl Violation {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds [`Violation`]s from failing conditions
#[derive(Debug, Clone, Default)]
pub struct ViolationReporter {
    config: ContractsConfig,
}

impl ViolationReporter {
    pub fn new(config: ContractsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContractsConfig {
        &self.config
    }

    pub fn precondition<A: fmt::Debug>(&self, function: &str, condition: &ConditionId, args: &A) -> Violation {
        let context = ContextRepr { args: self.repr(args), result: None, old: None };
        self.build(ContractKind::Precondition, function, condition, context)
    }

    pub fn postcondition<A, R>(
        &self,
        function: &str,
        condition: &ConditionId,
        args: &A,
        result: &R,
        old: &Old,
    ) -> Violation
    where
        A: fmt::Debug,
        R: fmt::Debug,
    {
        let context = ContextRepr {
            args: self.repr(args),
            result: Some(self.repr(result)),
            old: (!old.is_empty()).then(|| self.repr(old)),
        };
        self.build(ContractKind::Postcondition, function, condition, context)
    }

    fn build(
        &self,
        kind: ContractKind,
        function: &str,
        condition: &ConditionId,
        context: ContextRepr,
    ) -> Violation {
        let message = render(kind, function, condition, &context);
        Violation { kind, function: function.to_string(), condition: condition.clone(), context, message }
    }

    fn repr(&self, value: &dyn fmt::Debug) -> String {
        let full = if self.config.pretty_repr { format!("{:#?}", value) } else { format!("{:?}", value) };
        truncate(full, self.config.max_repr_len)
    }
}

fn render(kind: ContractKind, function: &str, condition: &ConditionId, context: &ContextRepr) -> String {
    let mut message = format!("{} violated in {}: {}", kind, function, condition);
    let _ = write!(message, "\nargs: {}", context.args);
    if let Some(result) = &context.result {
        let _ = write!(message, "\nresult: {}", result);
    }
    if let Some(old) = &context.old {
        let _ = write!(message, "\nold: {}", old);
    }
    message
}

fn truncate(mut repr: String, max_len: usize) -> String {
    if max_len == 0 {
        return repr;
    }
    let cut = repr.char_indices().nth(max_len).map(|(index, _)| index);
    if let Some(cut) = cut {
        repr.truncate(cut);
        repr.push_str("...");
    }
    repr
}
