//! Control-Plane Protocol
//!
//! Endpoint paths of the control-plane HTTP API. Request and response bodies
//! live next to the subsystem that owns them (`directory::types`,
//! `search::types`, `transfer::types`).

/// Register a peer in the local directory.
pub const ENDPOINT_LOGIN: &str = "/directory/login";
/// Make this node join the overlay through a target peer.
pub const ENDPOINT_JOIN: &str = "/directory/join";
/// Start a flood search originating at this node.
pub const ENDPOINT_SEARCH: &str = "/directory/search";
/// One hop of a flood search relayed by a neighbor.
pub const ENDPOINT_QUERY: &str = "/directory/query";
/// Full directory snapshot.
pub const ENDPOINT_PEERS: &str = "/directory/peers";
/// Random subset of the directory.
pub const ENDPOINT_SAMPLE: &str = "/directory/sample";
/// Re-scan the shared directory.
pub const ENDPOINT_REINDEX: &str = "/index";
/// List indexed files.
pub const ENDPOINT_FILES: &str = "/files";
/// Locate a file through the overlay and download it.
pub const ENDPOINT_TRANSFER_DOWNLOAD: &str = "/transfer/download";
/// Push a local file to a peer.
pub const ENDPOINT_TRANSFER_UPLOAD: &str = "/transfer/upload";
/// Ask a peer whether it holds a file.
pub const ENDPOINT_TRANSFER_CHECK: &str = "/transfer/check";
/// Liveness and basic node statistics.
pub const ENDPOINT_HEALTH: &str = "/health";
