//! Account document stores.
//!
//! Both stores implement `StoreGateway` with identical semantics:
//! idempotent folder resolution keyed by normalized account name,
//! check-then-append records and in-place header replacement.

mod fs;
pub mod layout;
mod memory;

pub use fs::FsDocumentStore;
pub use memory::MemoryDocumentStore;
