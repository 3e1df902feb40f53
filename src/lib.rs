//! Unstructured Peer-to-Peer Overlay Library
//!
//! This library crate defines the core modules of an overlay node. It serves as
//! the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`directory`**: the bounded peer directory (at most three entries, self
//!   always kept) with login, join, bootstrap and random sampling.
//! - **`search`**: TTL-bounded flooding search with duplicate suppression and
//!   full result aggregation.
//! - **`index`**: the set of local files a node shares, matched by exact name.
//! - **`transfer`**: chunked file movement over a dedicated TCP plane, plus the
//!   search-then-download orchestration.
//! - **`rpc`**: the control-plane transport seam (`PeerRpc`) and its HTTP client.
//! - **`node`** / **`server`**: composition root and runtime startup.
//! - **`config`** / **`error`**: command-line configuration and the error taxonomy.

pub mod config;
pub mod directory;
pub mod error;
pub mod index;
pub mod node;
pub mod rpc;
pub mod search;
pub mod server;
pub mod transfer;
