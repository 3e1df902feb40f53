//! File Transfer Plane
//!
//! Moves file contents between nodes over a dedicated TCP listener, separate
//! from the JSON control plane.
//!
//! ## Core Mechanisms
//! - **Framing**: length-prefixed bincode messages (`codec`).
//! - **Chunking**: fixed 64 KiB chunks numbered from 0; the last one is flagged
//!   and carries the declared total size, so receivers can verify completeness.
//! - **Atomic landing**: data is written to a `.part` sibling and renamed into
//!   place only after a complete, ordered stream.
//! - **Discovery**: `TransferEndpoints` maps a peer's control address to its
//!   transfer endpoint (explicit registration or port offset).
//! - **Orchestration**: `TransferOrchestrator` locates a file through the
//!   overlay, downloads it from the owner and refreshes the local index.

pub mod codec;
pub mod discovery;
pub mod engine;
pub mod handlers;
pub mod orchestrator;
pub mod server;
pub mod types;

#[cfg(test)]
mod tests;
