// Copyright 2024 - 2026 Wsport See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::Arc;

use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    sync::mpsc::{channel, Receiver, Sender},
    time::Instant,
};
use webparse::{
    ws::{CloseCode, CloseData, OwnedMessage},
    Binary, BinaryMut, Request, Serialize,
};

use crate::{
    handshake::{write_rejection, HandshakeNegotiator},
    translator::{translate, Inbound},
    EngineSession, PacketCodec, ProtError, ProtResult, TransportConfig, TransportHandler,
    TransportState, WriteBuffer,
};

/// Requests routed into the dispatch loop from other tasks.
#[derive(Debug)]
pub enum Command {
    Write(String),
    Close,
}

/// Cloneable write handle for the session layer, usable while the dispatch
/// loop owns the transport.
#[derive(Debug, Clone)]
pub struct TransportSender {
    inner: Sender<Command>,
}

impl TransportSender {
    pub async fn write<M: Into<String>>(&self, payload: M) -> ProtResult<()> {
        self.inner
            .send(Command::Write(payload.into()))
            .await
            .map_err(ProtError::from)
    }

    pub async fn close(&self) -> ProtResult<()> {
        self.inner.send(Command::Close).await.map_err(ProtError::from)
    }
}

/// One WebSocket transport per accepted socket.
///
/// Owns the Connecting → Open → Closing → Closed lifecycle and the
/// write-buffering discipline around the handshake window: writes issued
/// while Connecting are queued and flushed in order, exactly once, the
/// moment the handshake succeeds; writes after close are documented no-ops.
///
/// `S` is the protocol engine session, `P` the decoded application packet.
pub struct WsTransport<S, P> {
    state: TransportState,
    buffer: WriteBuffer,
    /// 最近一次写入是否已刷到链接
    drained: bool,
    config: Arc<TransportConfig>,
    negotiator: HandshakeNegotiator,
    session: Option<S>,
    handler: Box<dyn TransportHandler<P>>,
    codec: Box<dyn PacketCodec<P>>,
    sender: Sender<Command>,
    receiver: Receiver<Command>,
    close_emitted: bool,
}

impl<S, P> WsTransport<S, P>
where
    S: EngineSession,
    P: Send,
{
    pub fn new(
        handler: Box<dyn TransportHandler<P>>,
        codec: Box<dyn PacketCodec<P>>,
        config: Arc<TransportConfig>,
    ) -> Self {
        let (sender, receiver) = channel(10);
        Self {
            state: TransportState::Connecting,
            buffer: WriteBuffer::new(),
            drained: true,
            negotiator: HandshakeNegotiator::new(config.clone()),
            config,
            session: None,
            handler,
            codec,
            sender,
            receiver,
            close_emitted: false,
        }
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }

    pub fn sender(&self) -> TransportSender {
        TransportSender {
            inner: self.sender.clone(),
        }
    }

    /// Queues or sends one already-encoded payload.
    ///
    /// Connecting buffers, Open sends through the engine, Closing and Closed
    /// are silent no-ops. Fire and forget, mirroring what the session layer
    /// expects.
    pub async fn write<M: Into<String>>(&mut self, payload: M) -> ProtResult<()> {
        if self.state.is_connecting() {
            self.drained = false;
            self.buffer.enqueue(payload.into());
            return Ok(());
        }
        if !self.state.is_open() {
            log::trace!("websocket: write after close ignored");
            return Ok(());
        }
        if let Some(session) = self.session.as_mut() {
            self.drained = false;
            let payload = payload.into();
            log::debug!("websocket: writing {} bytes", payload.len());
            session.send_message(OwnedMessage::Text(payload)).await?;
            self.drained = true;
        }
        Ok(())
    }

    /// Batch form of [`write`], per-message order preserved.
    ///
    /// [`write`]: WsTransport::write
    pub async fn payload<I>(&mut self, msgs: I) -> ProtResult<()>
    where
        I: IntoIterator<Item = String>,
    {
        for msg in msgs {
            self.write(msg).await?;
        }
        Ok(())
    }

    /// Drives the handshake for a freshly accepted socket.
    ///
    /// On success `bind` receives the raw socket, the serialized `101`
    /// response to flush first, and the configuration, and must return the
    /// live engine session; the transport then drains its buffer and opens.
    /// On rejection the HTTP response is written back, the socket is shut
    /// down and the failure is surfaced as [`ProtError::Handshake`].
    ///
    /// A transport already closed by a local `close()` only releases the
    /// socket, so a late handshake completion never drains or writes.
    pub async fn on_socket_connect<T, B, F>(
        &mut self,
        mut io: T,
        req: Request<B>,
        bind: F,
    ) -> ProtResult<()>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
        B: webparse::Serialize,
        F: FnOnce(T, Binary, &TransportConfig) -> S,
    {
        if !self.state.is_connecting() {
            let _ = io.shutdown().await;
            return Ok(());
        }
        let negotiated = {
            let span = tracing::trace_span!("ws_handshake");
            let _enter = span.enter();
            self.negotiator.negotiate(&req)
        };
        match negotiated {
            Ok(negotiated) => {
                let mut response = negotiated.response;
                let mut binary = BinaryMut::new();
                let _ = response.serialize(&mut binary);
                let session = bind(io, binary.freeze(), &self.config);
                self.open(session).await
            }
            Err(reject) => {
                log::warn!("websocket: invalid handshake: {}", reject.message);
                let dropped = self.buffer.discard();
                if dropped > 0 {
                    log::debug!(
                        "websocket: discarded {} buffered payload(s) after rejected handshake",
                        dropped
                    );
                }
                if let Err(e) = write_rejection(&mut io, &reject).await {
                    log::warn!("websocket: failed to send handshake rejection: {}", e);
                }
                let _ = io.shutdown().await;
                self.state.set_closed(Some(CloseData::new(
                    CloseCode::Abnormal,
                    reject.message.clone(),
                )));
                self.emit_close().await;
                Err(ProtError::Handshake(reject))
            }
        }
    }

    /// Completes Connecting → Open with a negotiated engine session.
    ///
    /// The buffer drains in full, in order, before the state flips, so no
    /// later write can overtake a buffered one, and the drain happens at
    /// most once. Already-closed transports release the session instead.
    pub async fn open(&mut self, mut session: S) -> ProtResult<()> {
        if !self.state.is_connecting() {
            let _ = session.shutdown().await;
            return Ok(());
        }
        for payload in self.buffer.drain_all() {
            log::debug!("websocket: flushing buffered payload ({} bytes)", payload.len());
            if let Err(e) = session.send_message(OwnedMessage::Text(payload)).await {
                let _ = session.shutdown().await;
                self.state.set_closed(Some(CloseData::new(
                    CloseCode::Abnormal,
                    "flush failed".to_string(),
                )));
                self.emit_close().await;
                return Err(e);
            }
        }
        self.drained = true;
        self.state.set_open();
        self.session = Some(session);
        self.handler.on_open().await?;
        Ok(())
    }

    /// Requests a graceful close. Idempotent.
    ///
    /// With a live session this sends a close frame and waits up to the
    /// configured `close_timeout` for the peer's acknowledgement before
    /// releasing the socket; while still Connecting it goes straight to
    /// Closed and the buffer is discarded, never flushed.
    pub async fn close(&mut self) -> ProtResult<()> {
        if self.state.is_connecting() {
            let _ = self.buffer.discard();
            self.state.set_closed(None);
            self.emit_close().await;
            return Ok(());
        }
        if !self.state.is_open() {
            return Ok(());
        }
        self.state.set_closing(CloseData::normal());
        if let Some(mut session) = self.session.take() {
            let _ = session.start_close(None).await;
            let acked = tokio::time::timeout(self.config.close_wait(), async {
                while let Some(event) = session.next_event().await {
                    if let Ok(OwnedMessage::Close(_)) = event {
                        break;
                    }
                }
            })
            .await;
            if acked.is_err() {
                log::warn!(
                    "websocket: peer did not acknowledge close within {:?}, dropping socket",
                    self.config.close_wait()
                );
            }
            let _ = session.shutdown().await;
        }
        self.state.set_closed(None);
        self.emit_close().await;
        Ok(())
    }

    /// Runs the per-connection dispatch loop until the transport closes.
    ///
    /// Consumes inbound engine events and [`TransportSender`] commands, one
    /// consumer each, in order. Whatever ends the loop, the session is
    /// released exactly once and `on_close` fires exactly once.
    pub async fn serve(&mut self) -> ProtResult<()> {
        if self.state.is_connecting() {
            return Err(ProtError::Extension("transport is not open"));
        }
        let result = self.dispatch().await;
        if let Some(mut session) = self.session.take() {
            let _ = session.shutdown().await;
        }
        self.state.set_closed(None);
        self.emit_close().await;
        result
    }

    async fn dispatch(&mut self) -> ProtResult<()> {
        // One deadline covers both waits: close acknowledgement, and the
        // forced teardown after an engine error with no close event behind it.
        let mut deadline: Option<Instant> = None;
        let mut commands_done = false;
        loop {
            if self.state.is_closed() {
                return Ok(());
            }
            let Self {
                state,
                session,
                receiver,
                handler,
                codec,
                config,
                drained,
                ..
            } = self;
            let session = match session.as_mut() {
                Some(session) => session,
                None => return Ok(()),
            };
            tokio::select! {
                event = session.next_event() => match event {
                    None => {
                        state.set_closed(None);
                    }
                    Some(Ok(msg)) => match translate(msg) {
                        Inbound::Packet(text) => match codec.decode(&text) {
                            Ok(packet) => handler.on_message(packet).await?,
                            Err(e) => {
                                log::warn!("websocket: dropping undecodable message: {}", e)
                            }
                        },
                        Inbound::Unsupported(kind) => {
                            log::warn!("websocket: unsupported {} message received", kind);
                        }
                        Inbound::Control => {
                            log::trace!("websocket: control frame left to the engine");
                        }
                        Inbound::Close(data) => {
                            deadline = None;
                            state.set_closed(data);
                        }
                    },
                    Some(Err(e)) => {
                        log::warn!("websocket: connection error: {}", e);
                        if deadline.is_none() {
                            deadline = Some(Instant::now() + config.close_wait());
                        }
                    }
                },
                cmd = receiver.recv(), if !commands_done => {
                    let close_requested = matches!(cmd, None | Some(Command::Close));
                    if cmd.is_none() {
                        commands_done = true;
                    }
                    if let Some(Command::Write(payload)) = cmd {
                        if state.is_open() {
                            *drained = false;
                            session.send_message(OwnedMessage::Text(payload)).await?;
                            *drained = true;
                        } else {
                            log::trace!("websocket: dropping write, connection no longer open");
                        }
                    }
                    if close_requested && state.is_open() {
                        state.set_closing(CloseData::normal());
                        session.start_close(None).await?;
                        deadline = Some(Instant::now() + config.close_wait());
                    }
                },
                _ = wait_deadline(deadline) => {
                    log::warn!(
                        "websocket: close not acknowledged within {:?}, dropping socket",
                        config.close_wait()
                    );
                    state.set_closed(Some(CloseData::new(
                        CloseCode::Abnormal,
                        "close timeout".to_string(),
                    )));
                }
            }
        }
    }

    async fn emit_close(&mut self) {
        if !self.close_emitted {
            self.close_emitted = true;
            self.handler.on_close().await;
        }
    }
}

async fn wait_deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
