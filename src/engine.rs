// Copyright 2024 - 2026 Wsport See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio_stream::Stream;
use webparse::ws::{CloseData, OwnedMessage};

use crate::{ProtError, ProtResult};

/// The seam to the external WebSocket protocol engine.
///
/// One live session per accepted socket, exclusively owned by the transport
/// once the handshake succeeds. The engine owns framing, masking,
/// fragmentation and ping/pong; the transport only exchanges whole messages
/// with it.
///
/// `next_event` must be cancel safe: it is polled inside `select!` and a
/// cancelled call must not lose a message. Channel-backed sessions get this
/// for free.
#[async_trait]
pub trait EngineSession: Send {
    /// Hands one outbound message to the engine.
    async fn send_message(&mut self, msg: OwnedMessage) -> ProtResult<()>;

    /// Next inbound event, `None` once the socket is gone.
    async fn next_event(&mut self) -> Option<ProtResult<OwnedMessage>>;

    /// Asks the engine to send a close frame. The acknowledgement arrives
    /// later as a `Close` event, if it arrives at all.
    async fn start_close(&mut self, data: Option<CloseData>) -> ProtResult<()>;

    /// Releases the underlying socket. Idempotent.
    async fn shutdown(&mut self) -> ProtResult<()>;
}

/// Channel-backed [`EngineSession`] for engines that run in their own task.
///
/// Outbound messages travel over one mpsc channel, inbound events over
/// another; dropping the outbound sender is the shutdown signal the engine
/// task reacts to by releasing the socket.
pub struct ChannelSession {
    outbound: Option<Sender<OwnedMessage>>,
    inbound: Receiver<ProtResult<OwnedMessage>>,
}

/// The engine task's half of a [`ChannelSession`] pair.
pub struct EngineDriver {
    /// 引擎待发送的消息
    pub commands: Receiver<OwnedMessage>,
    /// 引擎上报的消息与错误
    pub events: Sender<ProtResult<OwnedMessage>>,
}

/// Builds a connected session/driver pair with the given channel capacity.
pub fn channel_pair(buffer: usize) -> (ChannelSession, EngineDriver) {
    let (outbound, commands) = channel(buffer);
    let (events, inbound) = channel(buffer);
    (
        ChannelSession {
            outbound: Some(outbound),
            inbound,
        },
        EngineDriver { commands, events },
    )
}

#[async_trait]
impl EngineSession for ChannelSession {
    async fn send_message(&mut self, msg: OwnedMessage) -> ProtResult<()> {
        match &self.outbound {
            Some(sender) => sender.send(msg).await.map_err(ProtError::from),
            None => Err(ProtError::SendError),
        }
    }

    async fn next_event(&mut self) -> Option<ProtResult<OwnedMessage>> {
        self.inbound.recv().await
    }

    async fn start_close(&mut self, data: Option<CloseData>) -> ProtResult<()> {
        self.send_message(OwnedMessage::Close(data)).await
    }

    async fn shutdown(&mut self) -> ProtResult<()> {
        self.outbound.take();
        self.inbound.close();
        Ok(())
    }
}

impl Stream for ChannelSession {
    type Item = ProtResult<OwnedMessage>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inbound.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_round_trip_through_the_pair() {
        let (mut session, mut driver) = channel_pair(4);
        session
            .send_message(OwnedMessage::Text("hello".to_string()))
            .await
            .unwrap();
        match driver.commands.recv().await {
            Some(OwnedMessage::Text(text)) => assert_eq!(text, "hello"),
            _ => panic!("expected the text command"),
        }

        driver
            .events
            .send(Ok(OwnedMessage::Text("world".to_string())))
            .await
            .unwrap();
        match session.next_event().await {
            Some(Ok(OwnedMessage::Text(text))) => assert_eq!(text, "world"),
            _ => panic!("expected the text event"),
        }
    }

    #[tokio::test]
    async fn shutdown_closes_the_command_channel() {
        let (mut session, mut driver) = channel_pair(4);
        session.shutdown().await.unwrap();
        assert!(driver.commands.recv().await.is_none());
        assert!(session
            .send_message(OwnedMessage::Text("late".to_string()))
            .await
            .is_err());
    }
}
