// Copyright 2024 - 2026 Wsport See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-connection WebSocket transport adapter.
//!
//! Binds a generic bidirectional messaging abstraction to the WebSocket
//! protocol: negotiates the upgrade handshake, buffers outbound writes until
//! the connection is actually open, translates inbound frames into decoded
//! application packets, and manages an orderly close. The wire protocol
//! itself lives behind the [`EngineSession`] seam, the message format behind
//! [`PacketCodec`], the owning session layer behind [`TransportHandler`].

mod buffer;
mod config;
mod engine;
mod error;
mod handler;
mod handshake;
mod state;
mod translator;
mod transport;

pub use buffer::WriteBuffer;
pub use config::TransportConfig;
pub use engine::{channel_pair, ChannelSession, EngineDriver, EngineSession};
pub use error::{ProtError, ProtResult};
pub use handler::{PacketCodec, TransportHandler};
pub use handshake::{write_rejection, HandshakeNegotiator, HandshakeReject, Negotiated};
pub use state::TransportState;
pub use translator::{translate, Inbound};
pub use transport::{Command, TransportSender, WsTransport};

use webparse::Request;

/// The inbound HTTP upgrade request as handed over by the accept layer.
pub type UpgradeRequest = Request<()>;
