//! Inter-process channel between the host and a page render worker.
//!
//! This crate owns the wire contract:
//! - `IncomingMessage` / `OutgoingMessage` - Tagged JSON messages
//! - `read_frame` / `write_frame` - Length-prefixed framing
//! - `IpcChannel` - Worker-side receive/send/send_error API
//! - `StreamChannel` - `IpcChannel` over any async byte stream
//! - `HostChannel` - The host's end of the same stream

mod channel;
mod error;
mod frame;
mod host;
mod message;

pub use channel::*;
pub use error::*;
pub use frame::*;
pub use host::*;
pub use message::*;
