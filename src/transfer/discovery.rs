use dashmap::DashMap;

use crate::directory::types::PeerAddress;
use crate::error::{OverlayError, OverlayResult};

/// Default distance between a node's control port and its transfer port.
pub const TRANSFER_PORT_OFFSET: u16 = 1000;

/// Maps control-plane addresses to transfer-plane endpoints.
///
/// Explicit registrations win; anything else falls back to the same host with
/// the port shifted by [`TRANSFER_PORT_OFFSET`].
#[derive(Default)]
pub struct TransferEndpoints {
    overrides: DashMap<PeerAddress, String>,
}

impl TransferEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, control: PeerAddress, transfer: impl Into<String>) {
        let transfer = transfer.into();
        tracing::debug!("Transfer endpoint for {} is {}", control, transfer);
        self.overrides.insert(control, transfer);
    }

    pub fn resolve(&self, control: &PeerAddress) -> OverlayResult<String> {
        if let Some(endpoint) = self.overrides.get(control) {
            return Ok(endpoint.value().clone());
        }
        derive_endpoint(control)
    }
}

fn derive_endpoint(control: &PeerAddress) -> OverlayResult<String> {
    let (host, port) = control.host_port().ok_or_else(|| {
        OverlayError::validation(format!("cannot derive transfer endpoint from '{}'", control))
    })?;
    let port = port.checked_add(TRANSFER_PORT_OFFSET).ok_or_else(|| {
        OverlayError::validation(format!("transfer port for '{}' is out of range", control))
    })?;
    Ok(format!("{}:{}", host, port))
}
