use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::types::{DIRECTORY_CAPACITY, JoinOutcome, PeerAddress};
use crate::error::{OverlayError, OverlayResult, require_non_empty};
use crate::rpc::PeerRpc;

/// Ordered, bounded view of the overlay. Insertion order drives eviction.
#[derive(Debug, Default)]
struct DirectoryState {
    self_addr: Option<PeerAddress>,
    entries: Vec<PeerAddress>,
}

impl DirectoryState {
    fn insert(&mut self, address: PeerAddress) {
        if !self.entries.contains(&address) {
            self.entries.push(address);
        }
        self.enforce_capacity();
    }

    /// Self stays pinned; among the others only the most recently inserted survive.
    fn enforce_capacity(&mut self) {
        if self.entries.len() <= DIRECTORY_CAPACITY {
            return;
        }

        match &self.self_addr {
            Some(me) if self.entries.contains(me) => {
                let others: Vec<PeerAddress> = self
                    .entries
                    .iter()
                    .filter(|addr| *addr != me)
                    .cloned()
                    .collect();
                let skip = others.len().saturating_sub(DIRECTORY_CAPACITY - 1);

                let mut retained = Vec::with_capacity(DIRECTORY_CAPACITY);
                retained.push(me.clone());
                retained.extend(others.into_iter().skip(skip));
                self.entries = retained;
            }
            _ => {
                let excess = self.entries.len() - DIRECTORY_CAPACITY;
                self.entries.drain(..excess);
            }
        }
    }
}

/// The node's partial view of other nodes, plus the login/join protocol that
/// builds it.
///
/// Shared between the control plane and the transfer plane; every mutation
/// goes through the internal lock.
pub struct PeerDirectory {
    state: RwLock<DirectoryState>,
    rpc: Arc<dyn PeerRpc>,
}

impl PeerDirectory {
    pub fn new(rpc: Arc<dyn PeerRpc>) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(DirectoryState::default()),
            rpc,
        })
    }

    /// Configures this node's own address and pins it in the directory.
    ///
    /// Calling again with the same address is a no-op; a different address is
    /// rejected.
    pub async fn set_self(&self, address: PeerAddress) -> OverlayResult<()> {
        require_non_empty("address", address.as_str())?;

        let mut state = self.state.write().await;
        match &state.self_addr {
            Some(existing) if *existing == address => return Ok(()),
            Some(existing) => {
                return Err(OverlayError::validation(format!(
                    "self address already configured as {}",
                    existing
                )));
            }
            None => {}
        }

        info!("Directory self address set to {}", address);
        state.self_addr = Some(address.clone());
        state.insert(address);
        Ok(())
    }

    pub async fn self_address(&self) -> Option<PeerAddress> {
        self.state.read().await.self_addr.clone()
    }

    /// Inserts `remote` (applying eviction) and returns the resulting directory.
    pub async fn login(&self, remote: PeerAddress) -> OverlayResult<Vec<PeerAddress>> {
        require_non_empty("address", remote.as_str())?;

        let mut state = self.state.write().await;
        state.insert(remote.clone());
        if let Some(me) = state.self_addr.clone() {
            state.insert(me);
        }

        info!(
            "Login from {} (directory now {} entries)",
            remote,
            state.entries.len()
        );
        Ok(state.entries.clone())
    }

    /// Logs in at `target` and adopts the directory it returns.
    ///
    /// An unreachable target is reported through `JoinOutcome::success` and
    /// leaves the local directory untouched.
    pub async fn join(&self, target: PeerAddress) -> OverlayResult<JoinOutcome> {
        require_non_empty("target", target.as_str())?;
        let me = self
            .self_address()
            .await
            .ok_or_else(|| OverlayError::validation("self address not configured"))?;

        match self.rpc.login(&target, &me).await {
            Ok(remote_dl) => {
                let local_dl = {
                    let mut state = self.state.write().await;
                    for addr in remote_dl.iter().filter(|addr| !addr.is_empty()) {
                        state.insert(addr.clone());
                    }
                    state.entries.clone()
                };

                info!(
                    "Joined overlay via {} (adopted {} entries, directory now {:?})",
                    target,
                    remote_dl.len(),
                    local_dl
                );

                Ok(JoinOutcome {
                    success: true,
                    target,
                    dl: remote_dl,
                    local_dl,
                    error: None,
                })
            }
            Err(e) => {
                warn!("Join via {} failed: {}", target, e);
                Ok(JoinOutcome {
                    success: false,
                    target,
                    dl: Vec::new(),
                    local_dl: self.all().await,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// Joins through the first reachable seed; later seeds act as substitutes.
    pub async fn bootstrap(&self, seeds: &[PeerAddress]) -> Option<JoinOutcome> {
        for seed in seeds {
            match self.join(seed.clone()).await {
                Ok(outcome) if outcome.success => return Some(outcome),
                Ok(_) => {
                    info!("Seed {} unavailable, trying substitute", seed);
                }
                Err(e) => {
                    warn!("Skipping seed {}: {}", seed, e);
                }
            }
        }
        None
    }

    /// Up to `n` addresses chosen uniformly at random without replacement.
    pub async fn sample(&self, n: usize) -> Vec<PeerAddress> {
        let state = self.state.read().await;
        state
            .entries
            .choose_multiple(&mut rand::thread_rng(), n)
            .cloned()
            .collect()
    }

    pub async fn all(&self) -> Vec<PeerAddress> {
        self.state.read().await.entries.clone()
    }

    /// Directory entries other than self and `exclude`, in directory order.
    pub async fn neighbors(&self, exclude: Option<&PeerAddress>) -> Vec<PeerAddress> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .filter(|addr| Some(*addr) != state.self_addr.as_ref())
            .filter(|addr| Some(*addr) != exclude)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }
}
