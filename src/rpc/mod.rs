//! Remote access to the rendering service.
//!
//! - **`protocol`**: Message framing and codec
//! - **`server`**: TCP server forwarding calls to a `DisplayService`
//! - **`client`**: Connection used to push frames to a server

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{ClientError, RenderingClient};
pub use protocol::{ErrorCode, Message, ProtocolError, RpcError};
pub use server::RpcServer;
