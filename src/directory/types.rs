use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Maximum number of addresses a node keeps in its directory (self included).
pub const DIRECTORY_CAPACITY: usize = 3;

/// Stable identity of a node, independent of the address it listens on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `host:port` of a node's control-plane endpoint.
///
/// Kept as an opaque string so hostnames work as well as IP literals; it is
/// only ever compared, hashed and printed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PeerAddress(String);

impl PeerAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Splits into host and port. `None` when the port is missing or not numeric.
    pub fn host_port(&self) -> Option<(&str, u16)> {
        let (host, port) = self.0.rsplit_once(':')?;
        if host.is_empty() {
            return None;
        }
        port.parse().ok().map(|port| (host, port))
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

impl From<&str> for PeerAddress {
    fn from(addr: &str) -> Self {
        Self::new(addr)
    }
}

/// Body of `POST /directory/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub address: String,
}

/// Reply to a login: the responder's full directory after the insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default)]
    pub dl: Vec<PeerAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `POST /directory/join`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub target: String,
}

/// Outcome of a join attempt. An unreachable target is reported here
/// (`success == false`) rather than as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinOutcome {
    pub success: bool,
    pub target: PeerAddress,
    /// Directory returned by the target (empty on failure).
    pub dl: Vec<PeerAddress>,
    /// This node's directory after adopting the returned entries.
    pub local_dl: Vec<PeerAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeersResponse {
    pub success: bool,
    pub peers: Vec<PeerAddress>,
}

#[derive(Debug, Deserialize)]
pub struct SampleParams {
    pub n: Option<usize>,
}
