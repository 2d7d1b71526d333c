//! Configuration management for callbrief
//!
//! Hierarchical configuration with discovery and precedence
//! CLI > environment > file > defaults. The TOML file lives at
//! `.callbrief/config.toml` and has `[defaults]`, `[retry]`, `[discovery]`,
//! `[search]`, `[llm]` and `[store]` sections.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use callbrief_utils::types::ConfigSource;
pub use cli_args::CliArgs;
pub use discovery::{ENV_LLM_PROVIDER, ENV_STORE_ROOT, ENV_TEAM_USER_IDS};
pub use model::*;
