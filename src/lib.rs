//! callbrief - account briefs synthesized from recorded customer calls
//!
//! For one account, callbrief finds its recent calls, summarizes each call
//! into the account document exactly once, and rewrites the brief at the top
//! of that document from the whole call history. Re-running is safe: calls
//! already summarized are skipped and the brief is replaced in place.
//!
//! callbrief can be used in two ways:
//! - **CLI**: `callbrief run --account "Foo Inc"`
//! - **Library**: build an [`Orchestrator`] from your own gateways, or from
//!   configuration with [`orchestrator_from_config`]
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use callbrief::{CancellationToken, Config, orchestrator_from_config};
//!
//! # async fn example() -> Result<(), callbrief::CallbriefError> {
//! let config = Config::builder()
//!     .max_items(10)
//!     .store_root("/srv/accounts")
//!     .build()?;
//! let orchestrator = orchestrator_from_config(&config)?;
//! let report = orchestrator.run("Foo Inc", CancellationToken::new()).await?;
//! println!("{} new summaries", report.summarized());
//! # Ok(())
//! # }
//! ```
//!
//! # Stable Public API
//!
//! - [`Config`] and [`ConfigBuilder`] - configuration management
//! - [`Orchestrator`], [`RunSettings`], [`RunReport`] - running the pipeline
//! - [`CallbriefError`] - library error type
//! - [`ExitCode`] - CLI exit codes

use std::sync::Arc;

pub use callbrief_config::{CliArgs, Config, ConfigBuilder};
pub use callbrief_engine::{
    CancellationToken, ItemOutcome, ItemReport, Orchestrator, RunError, RunReport, RunSettings,
    Stage,
};
pub use callbrief_utils::{CallbriefError, ExitCode};

#[cfg(any(test, feature = "test-utils"))]
pub use callbrief_engine::test_support;

#[doc(hidden)]
pub mod cli;

use callbrief_search::GongSearchGateway;
use callbrief_store::FsDocumentStore;
use callbrief_utils::ConfigError;

/// Build an orchestrator wired to Gong, the configured language model and
/// the filesystem store. Credentials are read from the environment.
///
/// # Errors
///
/// Returns a configuration error when credentials are missing or the store
/// root is unusable.
pub fn orchestrator_from_config(config: &Config) -> Result<Orchestrator, CallbriefError> {
    let search = GongSearchGateway::from_config(config, |name| std::env::var(name).ok())?;
    let synthesis = callbrief_llm::synthesis_gateway(config)?;
    let store = FsDocumentStore::from_path(config.store_root()).map_err(|e| {
        ConfigError::InvalidValue {
            key: "store_root".to_string(),
            value: e.to_string(),
        }
    })?;

    Ok(Orchestrator::new(
        Arc::new(search),
        Arc::new(synthesis),
        Arc::new(store),
        RunSettings::from_config(config),
    ))
}
