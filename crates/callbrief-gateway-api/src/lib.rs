//! Gateway contract for callbrief orchestration
//!
//! This crate holds the types shared between the orchestrator and the
//! collaborators it drives (search, synthesis, document store) without
//! introducing dependency cycles:
//!
//! - [`model`]: work items, summaries, synthesis results, storage locations
//! - [`gateway`]: the three async gateway traits
//! - [`document`]: the delimited record and section format of account documents
//! - [`error`]: the gateway error type with its transient/permanent split

pub mod document;
pub mod error;
pub mod gateway;
pub mod model;

pub use error::GatewayError;
pub use gateway::{SearchGateway, StoreGateway, SynthesisGateway};
pub use model::{
    CallHistoryEntry, Classification, ItemSummary, StorageLocation, SynthesisResult, TimeWindow,
    WorkItem, normalize_name,
};
