//! Wire protocol for the `DisplayRendering` call.
//!
//! Every message travels in a frame:
//!
//! ```text
//! length: u32 | kind: u8 | payload
//! ```
//!
//! `length` counts the kind byte and the payload. All integers are big-endian.
//!
//! | kind   | message             | payload                                              |
//! |--------|---------------------|------------------------------------------------------|
//! | `0x01` | `RenderingRequest`  | format u8, width u32, height u32, data_len u32, data |
//! | `0x81` | `RenderingResponse` | status u8, details_len u32, details                  |
//! | `0xFF` | `RpcError`          | code u8, message_len u32, message                    |

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};
use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::eink::error::FrameError;
use crate::eink::{PixelFormat, RenderingRequest, RenderingResponse, RenderingStatus};

/// Largest frame accepted on the wire. An RGBA panel frame is 122 000 bytes.
pub const MAX_FRAME_LEN: u32 = 1024 * 1024;

pub const KIND_RENDERING_REQUEST: u8 = 0x01;
pub const KIND_RENDERING_RESPONSE: u8 = 0x81;
pub const KIND_ERROR: u8 = 0xFF;

/// Error category carried by an [`RpcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidArgument = 1,
    Internal = 2,
    Unavailable = 3,
}

impl ErrorCode {
    fn from_u8(code: u8) -> Result<Self, ProtocolError> {
        match code {
            1 => Ok(ErrorCode::InvalidArgument),
            2 => Ok(ErrorCode::Internal),
            3 => Ok(ErrorCode::Unavailable),
            other => Err(ProtocolError::UnknownErrorCode(other)),
        }
    }
}

/// A call that failed without producing a [`RenderingResponse`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code:?}: {message}")]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(u32),
    #[error("empty frame")]
    EmptyFrame,
    #[error("unknown message kind 0x{0:02x}")]
    UnknownKind(u8),
    #[error("unknown error code {0}")]
    UnknownErrorCode(u8),
    #[error("unknown status code {0}")]
    UnknownStatus(u8),
    #[error("{0}")]
    Frame(#[from] FrameError),
    #[error("message payload truncated")]
    Truncated,
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
    #[error("text field is not valid UTF-8")]
    InvalidUtf8,
}

/// Any message of the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    RenderingRequest(RenderingRequest),
    RenderingResponse(RenderingResponse),
    Error(RpcError),
}

fn status_to_u8(status: RenderingStatus) -> u8 {
    match status {
        RenderingStatus::Ok => 0,
        RenderingStatus::DimensionNotAllowed => 1,
    }
}

fn status_from_u8(status: u8) -> Result<RenderingStatus, ProtocolError> {
    match status {
        0 => Ok(RenderingStatus::Ok),
        1 => Ok(RenderingStatus::DimensionNotAllowed),
        other => Err(ProtocolError::UnknownStatus(other)),
    }
}

impl Message {
    /// Encodes the message, frame header included.
    pub fn encode(&self) -> BytesMut {
        let mut payload = BytesMut::new();
        let kind = match self {
            Message::RenderingRequest(req) => {
                payload.reserve(13 + req.data.len());
                payload.put_u8(req.pixel_format.tag());
                payload.put_u32(req.width);
                payload.put_u32(req.height);
                payload.put_u32(req.data.len() as u32);
                payload.put_slice(&req.data);
                KIND_RENDERING_REQUEST
            }
            Message::RenderingResponse(resp) => {
                payload.put_u8(status_to_u8(resp.status));
                put_text(&mut payload, &resp.details);
                KIND_RENDERING_RESPONSE
            }
            Message::Error(err) => {
                payload.put_u8(err.code as u8);
                put_text(&mut payload, &err.message);
                KIND_ERROR
            }
        };

        let mut buf = BytesMut::with_capacity(5 + payload.len());
        buf.put_u32(payload.len() as u32 + 1);
        buf.put_u8(kind);
        buf.put_slice(&payload);
        buf
    }

    /// Decodes a frame body: the kind byte followed by the payload.
    pub fn decode(body: &[u8]) -> Result<Self, ProtocolError> {
        let (&kind, payload) = body.split_first().ok_or(ProtocolError::EmptyFrame)?;
        let mut cursor = Cursor::new(payload);

        let message = match kind {
            KIND_RENDERING_REQUEST => {
                let pixel_format = PixelFormat::from_tag(read_u8(&mut cursor)?)?;
                let width = read_u32(&mut cursor)?;
                let height = read_u32(&mut cursor)?;
                let data = read_bytes(&mut cursor)?;
                Message::RenderingRequest(RenderingRequest {
                    pixel_format,
                    width,
                    height,
                    data,
                })
            }
            KIND_RENDERING_RESPONSE => {
                let status = status_from_u8(read_u8(&mut cursor)?)?;
                let details = read_text(&mut cursor)?;
                Message::RenderingResponse(RenderingResponse { status, details })
            }
            KIND_ERROR => {
                let code = ErrorCode::from_u8(read_u8(&mut cursor)?)?;
                let message = read_text(&mut cursor)?;
                Message::Error(RpcError { code, message })
            }
            other => return Err(ProtocolError::UnknownKind(other)),
        };

        let trailing = payload.len() - cursor.position() as usize;
        if trailing != 0 {
            return Err(ProtocolError::TrailingBytes(trailing));
        }
        Ok(message)
    }
}

fn put_text(buf: &mut BytesMut, text: &str) {
    buf.put_u32(text.len() as u32);
    buf.put_slice(text.as_bytes());
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, ProtocolError> {
    ReadBytesExt::read_u8(cursor).map_err(|_| ProtocolError::Truncated)
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, ProtocolError> {
    ReadBytesExt::read_u32::<BigEndian>(cursor).map_err(|_| ProtocolError::Truncated)
}

fn read_bytes(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u8>, ProtocolError> {
    let len = read_u32(cursor)? as usize;
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    if len > remaining {
        return Err(ProtocolError::Truncated);
    }
    let mut data = vec![0; len];
    Read::read_exact(cursor, &mut data).map_err(|_| ProtocolError::Truncated)?;
    Ok(data)
}

fn read_text(cursor: &mut Cursor<&[u8]>) -> Result<String, ProtocolError> {
    String::from_utf8(read_bytes(cursor)?).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Reads one message. Returns `Ok(None)` when the peer closed the connection between frames.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len == 0 {
        return Err(ProtocolError::EmptyFrame);
    }
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut body = vec![0; len as usize];
    reader.read_exact(&mut body).await?;
    Message::decode(&body).map(Some)
}

/// Writes one message and flushes it.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&message.encode()).await?;
    writer.flush().await?;
    Ok(())
}
