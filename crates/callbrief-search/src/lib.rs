//! Call discovery and transcript retrieval against Gong.
//!
//! [`GongSearchGateway`] implements the engine's `SearchGateway` seam:
//! windowed `list_items` with cursor pagination and `get_content` returning
//! a speaker-labelled transcript.

mod gong;
mod wire;

pub use gong::GongSearchGateway;
