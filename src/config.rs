//! Node Configuration
//!
//! Command-line configuration for a single overlay node. The control plane
//! listens on `--bind`; the transfer plane defaults to the same host with the
//! port shifted by [`TRANSFER_PORT_OFFSET`].

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::directory::types::PeerAddress;
use crate::error::{OverlayError, OverlayResult};
use crate::search::types::DEFAULT_TTL;
use crate::transfer::discovery::TRANSFER_PORT_OFFSET;

#[derive(Debug, Clone, Parser)]
#[command(name = "overlay-node")]
#[command(author, version, about = "Unstructured P2P overlay node", long_about = None)]
pub struct NodeConfig {
    /// Control-plane (HTTP) listen address
    #[arg(long)]
    pub bind: SocketAddr,

    /// Address other peers should use to reach this node (defaults to --bind)
    #[arg(long)]
    pub advertise: Option<String>,

    /// Stable peer identifier (a random UUID when omitted)
    #[arg(long)]
    pub peer_id: Option<String>,

    /// Directory whose files are shared and indexed
    #[arg(long)]
    pub files_dir: PathBuf,

    /// Where downloaded and uploaded files land (defaults to <files-dir>/downloads)
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Peers to join at startup; tried in order until one answers
    #[arg(long = "seed")]
    pub seeds: Vec<String>,

    /// Default hop budget for searches started by this node
    #[arg(long, default_value_t = DEFAULT_TTL)]
    pub ttl: u32,

    /// Per-call timeout for control-plane requests, in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Transfer-plane (TCP) listen address (defaults to control port + 1000)
    #[arg(long)]
    pub transfer_bind: Option<SocketAddr>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl NodeConfig {
    /// Identity advertised to peers. `bound` is the address the control
    /// listener actually got, which differs from `--bind` for port 0.
    pub fn self_address(&self, bound: SocketAddr) -> PeerAddress {
        match &self.advertise {
            Some(addr) => PeerAddress::new(addr.clone()),
            None => PeerAddress::from(bound),
        }
    }

    /// `--transfer-bind`, or the control port shifted by
    /// [`TRANSFER_PORT_OFFSET`]. A shifted port past 65535 is rejected, the
    /// same way peers' endpoints are resolved.
    pub fn transfer_bind(&self, bound: SocketAddr) -> OverlayResult<SocketAddr> {
        if let Some(addr) = self.transfer_bind {
            return Ok(addr);
        }
        let port = bound.port().checked_add(TRANSFER_PORT_OFFSET).ok_or_else(|| {
            OverlayError::validation(format!(
                "control port {} leaves no room for a transfer port; pass --transfer-bind",
                bound.port()
            ))
        })?;
        Ok(SocketAddr::new(bound.ip(), port))
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| self.files_dir.join("downloads"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn peer_id(&self) -> Option<String> {
        self.peer_id.clone().filter(|id| !id.trim().is_empty())
    }
}
