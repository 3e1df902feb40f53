use serde::{Deserialize, Serialize};

use crate::directory::types::{NodeId, PeerAddress};

/// Hop budget used when the caller does not specify one.
pub const DEFAULT_TTL: u32 = 3;

/// Globally unique token naming one flood-search instance.
///
/// Generated by the node that starts the search and carried unchanged by every
/// hop, so duplicates arriving over different paths can be recognized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct QueryId(pub String);

impl QueryId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A query travelling between neighbors (`POST /directory/query`).
///
/// `origin` is the node that forwarded this copy of the query; the receiver
/// never sends it straight back there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query_id: QueryId,
    pub filename: String,
    pub ttl: u32,
    #[serde(default)]
    pub origin: Option<PeerAddress>,
}

/// Body of `POST /directory/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSearchRequest {
    pub filename: String,
    #[serde(default)]
    pub ttl: Option<u32>,
}

/// One located copy of a file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FileHit {
    pub filename: String,
    pub path: String,
    pub size: u64,
    /// Control-plane address of the node holding the file.
    pub owner: PeerAddress,
    pub owner_id: NodeId,
}

/// Aggregated outcome of one search. An empty `results` is the normal
/// "not found" answer, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub query_id: Option<QueryId>,
    pub results: Vec<FileHit>,
    /// Set when a `HandleQuery` was dropped as a duplicate.
    #[serde(default)]
    pub duplicate: bool,
}

impl SearchOutcome {
    pub fn found(&self) -> bool {
        !self.results.is_empty()
    }
}

/// Wire shape returned by both search endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(default)]
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<QueryId>,
    #[serde(default)]
    pub results: Vec<FileHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            success: true,
            found: outcome.found(),
            query_id: outcome.query_id,
            results: outcome.results,
            error: None,
        }
    }
}

impl SearchResponse {
    pub fn failure(error: impl ToString) -> Self {
        Self {
            success: false,
            found: false,
            query_id: None,
            results: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}
