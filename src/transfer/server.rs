use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

use super::codec::{read_message, write_message};
use super::engine::TransferEngine;
use super::types::TransferMessage;
use crate::error::{OverlayError, OverlayResult};

/// TCP front of the transfer plane. Every accepted connection is handled on
/// its own task and carries exactly one call.
pub struct TransferServer {
    listener: TcpListener,
    engine: Arc<TransferEngine>,
}

impl TransferServer {
    pub async fn bind(addr: SocketAddr, engine: Arc<TransferEngine>) -> OverlayResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, engine })
    }

    pub fn local_addr(&self) -> OverlayResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until the task is aborted.
    pub async fn run(self) {
        match self.listener.local_addr() {
            Ok(addr) => tracing::info!("Transfer server listening on {}", addr),
            Err(e) => tracing::warn!("Transfer server address unknown: {}", e),
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("Transfer accept failed: {}", e);
                    continue;
                }
            };

            let engine = self.engine.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(engine, stream).await {
                    tracing::warn!("Transfer call from {} failed: {}", peer, e);
                }
            });
        }
    }
}

async fn handle_connection(engine: Arc<TransferEngine>, mut stream: TcpStream) -> OverlayResult<()> {
    let Some(request) = read_message(&mut stream).await? else {
        return Ok(());
    };

    match request {
        TransferMessage::DownloadRequest {
            filename,
            requesting_node,
        } => {
            tracing::debug!(
                "Download of {} requested by {}",
                filename,
                requesting_node.as_deref().unwrap_or("unknown")
            );
            engine.serve_download(&mut stream, &filename).await?;
        }
        TransferMessage::UploadRequest {
            filename,
            total_size,
            requesting_node,
        } => {
            tracing::debug!(
                "Upload of {} ({} bytes) from {}",
                filename,
                total_size,
                requesting_node.as_deref().unwrap_or("unknown")
            );
            engine.receive_upload(&mut stream, &filename, total_size).await?;
        }
        TransferMessage::CheckRequest { filename } => {
            let info = engine.local_file_info(&filename).await;
            write_message(&mut stream, &TransferMessage::FileInfo(info)).await?;
        }
        _ => {
            return Err(OverlayError::Protocol(
                "connection did not open with a request".into(),
            ));
        }
    }
    Ok(())
}
