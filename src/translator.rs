// Copyright 2024 - 2026 Wsport See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use webparse::ws::{CloseData, OwnedMessage};

/// What the dispatch loop should do with one inbound engine event.
#[derive(Debug)]
pub enum Inbound {
    /// 文本帧, 交由编解码器解码后递交给会话层
    Packet(String),
    /// Frame kind this transport does not deliver. Warn and stay open.
    Unsupported(&'static str),
    /// Ping/pong, handled inside the engine, nothing to forward.
    Control,
    /// Peer close, or the acknowledgement of ours.
    Close(Option<CloseData>),
}

pub fn translate(msg: OwnedMessage) -> Inbound {
    match msg {
        OwnedMessage::Text(text) => Inbound::Packet(text),
        OwnedMessage::Binary(_) => Inbound::Unsupported("binary"),
        OwnedMessage::Ping(_) | OwnedMessage::Pong(_) => Inbound::Control,
        OwnedMessage::Close(data) => Inbound::Close(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_becomes_a_packet() {
        match translate(OwnedMessage::Text("40/chat".to_string())) {
            Inbound::Packet(text) => assert_eq!(text, "40/chat"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn binary_is_unsupported_not_fatal() {
        assert!(matches!(
            translate(OwnedMessage::Binary(vec![1, 2, 3])),
            Inbound::Unsupported("binary")
        ));
    }

    #[test]
    fn control_frames_stay_with_the_engine() {
        assert!(matches!(
            translate(OwnedMessage::Ping(vec![])),
            Inbound::Control
        ));
        assert!(matches!(
            translate(OwnedMessage::Pong(vec![])),
            Inbound::Control
        ));
    }

    #[test]
    fn close_carries_the_peer_data() {
        assert!(matches!(
            translate(OwnedMessage::Close(None)),
            Inbound::Close(None)
        ));
        assert!(matches!(
            translate(OwnedMessage::Close(Some(CloseData::normal()))),
            Inbound::Close(Some(_))
        ));
    }
}
