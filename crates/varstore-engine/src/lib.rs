//! Reconciliation engine for runs that evaluate expressions against a VariableStore.
//!
//! A pass validates the run, loads the referenced store, evaluates every
//! parameter in declaration order against an environment that grows with each
//! result, writes the results back to the store in a single update, and records
//! a terminal condition on the run.

pub mod client;
pub mod config;
pub mod environment;
pub mod evaluator;
pub mod events;
pub mod file_store;
pub mod outcome;
pub mod reconciler;
pub mod requeue;
pub mod sync;
pub mod validation;

pub use client::{MemoryStore, VariableStoreClient};
pub use config::ReconcilerConfig;
pub use environment::{build_environment, Seed};
pub use evaluator::evaluate_params;
pub use events::{EventEmitter, RunEvent};
pub use file_store::FileStore;
pub use outcome::Outcome;
pub use reconciler::Reconciler;
pub use requeue::{reconcile_with_requeue, RequeuePolicy};
pub use sync::{commit, upsert};
pub use validation::{validate, validate_or_raise};
