// Copyright 2024 - 2026 Wsport See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use webparse::ws::CloseData;

#[derive(Debug)]
pub enum TransportState {
    /// Handshake not finished, writes are buffered
    Connecting,

    /// Currently open in a sane state
    Open,

    /// Close frame sent, waiting for the peer's acknowledgement
    Closing(CloseData),

    /// In a closed state, terminal
    Closed(CloseData),
}

impl TransportState {
    pub fn is_connecting(&self) -> bool {
        matches!(self, TransportState::Connecting)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, TransportState::Open)
    }

    pub fn is_closing(&self) -> bool {
        matches!(self, TransportState::Closing(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, TransportState::Closed(_))
    }

    /// 握手成功, 仅能从Connecting进入Open
    pub fn set_open(&mut self) {
        match self {
            TransportState::Connecting => {
                *self = TransportState::Open;
            }
            _ => {}
        }
    }

    pub fn set_closing(&mut self, data: CloseData) {
        match self {
            TransportState::Open => {
                *self = TransportState::Closing(data);
            }
            _ => {}
        }
    }

    pub fn set_closed(&mut self, data: Option<CloseData>) {
        match self {
            TransportState::Connecting | TransportState::Open => {
                *self = TransportState::Closed(data.unwrap_or(CloseData::normal()));
            }
            TransportState::Closing(data) => {
                *self = TransportState::Closed(data.clone());
            }
            _ => {}
        }
    }
}
