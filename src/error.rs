// Copyright 2024 - 2026 Wsport See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::{fmt::Display, io};

use tokio::sync::mpsc::error::SendError;
use webparse::WebError;

use crate::handshake::HandshakeReject;

pub type ProtResult<T> = Result<T, ProtError>;

#[derive(Debug)]
pub enum ProtError {
    /// 标准错误库的错误类型
    IoError(io::Error),
    /// 解析库发生错误
    WebError(WebError),
    /// 握手被拒绝, 已给对端写回HTTP响应
    Handshake(HandshakeReject),
    /// 收到本传输不支持的帧类型, 链接继续保持
    UnsupportedFrame(&'static str),
    /// 协议引擎上报的协议错误
    Protocol(&'static str),
    /// 对端未在限定时间内确认关闭
    CloseTimeout,
    /// 配置文件解析失败
    Config(toml::de::Error),

    SendError,
    /// 其它错误信息
    Extension(&'static str),
}

impl Display for ProtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtError::IoError(_) => f.write_str("io error"),
            ProtError::WebError(w) => w.fmt(f),
            ProtError::Handshake(r) => {
                f.write_fmt(format_args!("handshake rejected: {} {}", r.status, r.message))
            }
            ProtError::UnsupportedFrame(kind) => {
                f.write_fmt(format_args!("unsupported {} frame", kind))
            }
            ProtError::Protocol(s) => f.write_fmt(format_args!("protocol error: {}", s)),
            ProtError::CloseTimeout => f.write_str("close not acknowledged in time"),
            ProtError::Config(e) => e.fmt(f),
            ProtError::SendError => f.write_str("send error"),
            ProtError::Extension(s) => f.write_fmt(format_args!("extension {}", s)),
        }
    }
}

impl From<io::Error> for ProtError {
    fn from(value: io::Error) -> Self {
        ProtError::IoError(value)
    }
}

impl From<WebError> for ProtError {
    fn from(value: WebError) -> Self {
        ProtError::WebError(value)
    }
}

impl From<toml::de::Error> for ProtError {
    fn from(value: toml::de::Error) -> Self {
        ProtError::Config(value)
    }
}

impl From<HandshakeReject> for ProtError {
    fn from(value: HandshakeReject) -> Self {
        ProtError::Handshake(value)
    }
}

impl<T> From<SendError<T>> for ProtError {
    fn from(_: SendError<T>) -> Self {
        ProtError::SendError
    }
}

impl ProtError {
    pub fn is_io(&self) -> bool {
        match self {
            Self::IoError(_) => true,
            _ => false,
        }
    }

    pub fn is_handshake(&self) -> bool {
        match self {
            Self::Handshake(_) => true,
            _ => false,
        }
    }

    pub fn is_close_timeout(&self) -> bool {
        match self {
            Self::CloseTimeout => true,
            _ => false,
        }
    }

    /// 握手拒绝信息, 包括状态码与原因
    pub fn reject(&self) -> Option<&HandshakeReject> {
        match self {
            Self::Handshake(r) => Some(r),
            _ => None,
        }
    }
}
