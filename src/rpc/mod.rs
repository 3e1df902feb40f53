//! Control-Plane RPC
//!
//! The directory and search layers never talk HTTP directly: they call a
//! [`PeerRpc`] implementation. Production nodes use [`http::HttpPeerRpc`]
//! (JSON over reqwest); unit tests plug in an in-process router.
//!
//! ## Submodules
//! - **`protocol`**: endpoint paths shared by the client and the axum router.
//! - **`http`**: reqwest-backed client with per-call timeouts.

pub mod http;
pub mod protocol;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;

use crate::directory::types::PeerAddress;
use crate::error::OverlayResult;
use crate::search::types::{FileHit, QueryRequest};

#[async_trait]
pub trait PeerRpc: Send + Sync {
    /// Registers `me` in `target`'s directory and returns `target`'s directory.
    async fn login(&self, target: &PeerAddress, me: &PeerAddress)
    -> OverlayResult<Vec<PeerAddress>>;

    /// Forwards one hop of a flood search.
    async fn query(&self, target: &PeerAddress, request: &QueryRequest)
    -> OverlayResult<Vec<FileHit>>;

    /// Asks `target` to start a fresh search of its own.
    async fn start_search(
        &self,
        target: &PeerAddress,
        filename: &str,
        ttl: u32,
    ) -> OverlayResult<Vec<FileHit>>;
}
