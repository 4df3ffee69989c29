//! Core functionality for pactum
//!
//! This crate attaches preconditions and postconditions to sync and async
//! callables, evaluates them around every call and reports broken contracts
//! as structured [`Violation`]s.

pub mod config;
pub mod contract;

pub use config::ContractsConfig;
pub use contract::{
    AsyncContracted, Condition, ConditionId, ContextRepr, Contract, ContractError,
    ContractKind, ContractRecord, Contracted, DecorationError, Old, Post, Predicate,
    Snapshot, Verdict, Violation, ViolationReporter, awaited_all,
};
