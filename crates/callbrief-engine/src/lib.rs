//! Orchestration engine for callbrief.
//!
//! A run moves one account through these stages:
//!
//! - [`discovery`]: windowed search for the account's calls and resolution
//!   of its document location
//! - [`processor`]: per-call fetch, summarize and idempotent append
//! - [`reduction`]: deterministic ordering of every record in the document
//! - [`brief`]: rendering of the synthesized header section
//! - [`orchestrator`]: the state machine tying the stages together, with
//!   bounded concurrency, retries and cancellation
//!
//! All collaborators are reached through the traits in
//! `callbrief-gateway-api`, so the engine itself performs no I/O.

pub mod brief;
pub mod discovery;
pub mod error;
pub mod orchestrator;
pub mod processor;
pub mod reduction;
pub mod retry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use discovery::{Discovered, Discovery, DiscoveryLimits};
pub use error::{DiscoveryError, RunError};
pub use orchestrator::{
    ItemOutcome, ItemReport, Orchestrator, RunReport, RunSettings, Stage, StageTracker,
};
pub use retry::RetryPolicy;

// Re-exported so binaries can cancel runs without a direct dependency.
pub use tokio_util::sync::CancellationToken;
