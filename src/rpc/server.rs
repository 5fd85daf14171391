//! TCP server for the rendering service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::protocol::{read_message, write_message, ErrorCode, Message, ProtocolError, RpcError};
use crate::eink::{DisplayService, ServiceError};

/// Accepts connections and forwards `DisplayRendering` calls to a [`DisplayService`].
pub struct RpcServer {
    service: Arc<DisplayService>,
    connections: TaskTracker,
}

impl RpcServer {
    pub fn new(service: Arc<DisplayService>) -> Self {
        Self {
            service,
            connections: TaskTracker::new(),
        }
    }

    /// Accepts connections until `token` is cancelled.
    ///
    /// Each connection runs in its own task. Open connections finish the call they are
    /// serving and then close; use [`drain`](Self::drain) to wait for them.
    pub async fn serve(&self, listener: TcpListener, token: CancellationToken) -> Result<(), ProtocolError> {
        info!("rendering server listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.spawn_connection(stream, peer, token.clone()),
                        // per-connection failures (e.g. reset before accept) don't stop the server
                        Err(e) => warn!("failed to accept connection: {}", e),
                    }
                }
                _ = token.cancelled() => {
                    info!("rendering server received shutdown signal");
                    break;
                }
            }
        }

        self.connections.close();
        Ok(())
    }

    /// Waits up to `grace` for open connections. Returns false if some were still open.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.connections.close();
        match tokio::time::timeout(grace, self.connections.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!("{} connection(s) still open after {:?}", self.connections.len(), grace);
                false
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, token: CancellationToken) {
        debug!("client {} connected", peer);
        let service = self.service.clone();
        self.connections.spawn(async move {
            match handle_connection(stream, &service, token).await {
                Ok(()) => debug!("client {} disconnected", peer),
                Err(e) => warn!("client {} dropped: {}", peer, e),
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    service: &DisplayService,
    token: CancellationToken,
) -> Result<(), ProtocolError> {
    stream.set_nodelay(true)?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let message = tokio::select! {
            message = read_message(&mut reader) => message,
            _ = token.cancelled() => return Ok(()),
        };

        let reply = match message {
            Ok(Some(Message::RenderingRequest(request))) => {
                match service.display_rendering(request).await {
                    Ok(response) => Message::RenderingResponse(response),
                    Err(e) => Message::Error(service_error(&e)),
                }
            }
            Ok(Some(other)) => {
                let err = RpcError::new(ErrorCode::InvalidArgument, "expected a rendering request");
                debug!("unexpected message from client: {:?}", other);
                write_message(&mut writer, &Message::Error(err)).await?;
                return Ok(());
            }
            Ok(None) => return Ok(()),
            // the frame was read in full, so the stream is still in sync
            Err(e @ (ProtocolError::UnknownKind(_)
            | ProtocolError::UnknownStatus(_)
            | ProtocolError::UnknownErrorCode(_)
            | ProtocolError::Frame(_)
            | ProtocolError::Truncated
            | ProtocolError::TrailingBytes(_)
            | ProtocolError::InvalidUtf8)) => {
                Message::Error(RpcError::new(ErrorCode::InvalidArgument, e.to_string()))
            }
            Err(e) => return Err(e),
        };

        write_message(&mut writer, &reply).await?;
    }
}

fn service_error(err: &ServiceError) -> RpcError {
    match err {
        ServiceError::InvalidFrame(e) => RpcError::new(ErrorCode::InvalidArgument, e.to_string()),
        ServiceError::PoweredDown => RpcError::new(ErrorCode::Unavailable, err.to_string()),
        ServiceError::Driver(_) | ServiceError::Worker(_) => {
            RpcError::new(ErrorCode::Internal, err.to_string())
        }
    }
}
