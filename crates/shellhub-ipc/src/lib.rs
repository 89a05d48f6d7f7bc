//! Shellhub IPC Protocol and Client/Server
//!
//! Protocol definitions, length-prefixed MessagePack framing and the Unix
//! socket client/server used to talk to the Shellhub daemon.

mod client;
pub mod codec;
mod error;
mod protocol;
mod server;

pub use client::{ConnectedClient, IpcClient, NotificationStream};
pub use error::IpcError;
pub use protocol::*;
pub use server::{IpcServer, RequestHandler};
