// Copyright 2024 - 2026 Wsport See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use async_trait::async_trait;

use crate::ProtResult;

/// The session layer's view of one connection.
///
/// Injected at construction instead of inherited: the transport calls these
/// hooks, the connection manager implements them. `P` is whatever the packet
/// codec produces.
#[async_trait]
pub trait TransportHandler<P: Send>: Send {
    /// Ready signal, fired once, after buffered writes have been flushed.
    async fn on_open(&mut self) -> ProtResult<()> {
        Ok(())
    }

    /// One call per successfully decoded inbound text message.
    async fn on_message(&mut self, packet: P) -> ProtResult<()>;

    /// Exactly once, terminal, for any terminating condition.
    async fn on_close(&mut self) {}
}

/// 外部报文编解码器, 文本帧解码为应用报文
pub trait PacketCodec<P>: Send {
    fn decode(&mut self, text: &str) -> ProtResult<P>;
}
