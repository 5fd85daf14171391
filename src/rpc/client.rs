//! Client side of the rendering protocol.

use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use super::protocol::{read_message, write_message, Message, ProtocolError, RpcError};
use crate::eink::{RenderingRequest, RenderingResponse};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("server error: {0}")]
    Rpc(#[from] RpcError),
    #[error("server closed the connection")]
    Closed,
    #[error("unexpected reply from server")]
    UnexpectedReply,
}

/// A connection to a rendering server. Calls on one connection are sequential.
pub struct RenderingClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl RenderingClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await.map_err(ProtocolError::from)?;
        stream.set_nodelay(true).map_err(ProtocolError::from)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    /// Sends a frame and waits for the server's answer.
    pub async fn display_rendering(
        &mut self,
        request: RenderingRequest,
    ) -> Result<RenderingResponse, ClientError> {
        write_message(&mut self.writer, &Message::RenderingRequest(request)).await?;

        match read_message(&mut self.reader).await? {
            Some(Message::RenderingResponse(response)) => Ok(response),
            Some(Message::Error(err)) => Err(ClientError::Rpc(err)),
            Some(Message::RenderingRequest(_)) => Err(ClientError::UnexpectedReply),
            None => Err(ClientError::Closed),
        }
    }
}
