// Copyright 2024 - 2026 Wsport See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::Arc;

use sha1::{Digest, Sha1};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use webparse::{Buf, BinaryMut, Request, Response, Serialize};

use crate::{ProtError, ProtResult, TransportConfig};

static MAGIC_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// A handshake that could not be accepted. The HTTP-style response described
/// here is written back to the peer before the socket is released, so clients
/// see a proper rejection instead of an abrupt drop.
#[derive(Debug)]
pub struct HandshakeReject {
    /// HTTP状态码, 未指定时默认400
    pub status: u16,
    pub message: String,
    pub headers: Vec<(String, String)>,
}

impl HandshakeReject {
    pub fn new<M: Into<String>>(message: M) -> Self {
        Self::with_status(400, message)
    }

    pub fn with_status<M: Into<String>>(status: u16, message: M) -> Self {
        Self {
            status,
            message: message.into(),
            headers: vec![],
        }
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Outcome of a successful negotiation: the `101 Switching Protocols`
/// response to flush through the engine, plus the agreed sub-protocol.
#[derive(Debug)]
pub struct Negotiated {
    pub response: Response<()>,
    pub protocol: Option<String>,
}

/// Validates upgrade requests against the configured policy and produces
/// either the accept response or a structured rejection.
pub struct HandshakeNegotiator {
    config: Arc<TransportConfig>,
}

impl HandshakeNegotiator {
    pub fn new(config: Arc<TransportConfig>) -> Self {
        Self { config }
    }

    /// RFC 6455 accept key: base64(sha1(key + guid)).
    pub fn build_accept(key: &str) -> ProtResult<String> {
        match base64::decode(key) {
            Ok(vec) => {
                if vec.len() != 16 {
                    return Err(ProtError::Protocol("Sec-WebSocket-Key must be 16 bytes"));
                }
                let mut concat_key = String::with_capacity(key.len() + 36);
                concat_key.push_str(key);
                concat_key.push_str(MAGIC_GUID);
                let hash = Sha1::digest(concat_key.as_bytes());
                let key: [u8; 20] = hash.into();
                Ok(base64::encode(key))
            }
            Err(_) => Err(ProtError::Protocol("invalid Sec-WebSocket-Key")),
        }
    }

    pub fn negotiate<B: Serialize>(&self, req: &Request<B>) -> Result<Negotiated, HandshakeReject> {
        let key = req.headers().get_str_value(&"Sec-WebSocket-Key");
        let version = req.headers().get_str_value(&"Sec-WebSocket-Version");
        if key.is_none() || version.as_ref().map(|s| &**s) != Some("13") {
            return Err(HandshakeReject::new("invalid websocket version"));
        }
        let key = key.unwrap();
        let accept = Self::build_accept(&key)
            .map_err(|_| HandshakeReject::new("invalid Sec-WebSocket-Key"))?;

        if !self.config.auto_accept_connections && !self.config.accepted_origins.is_empty() {
            let origin = req.headers().get_str_value(&"Origin");
            let allowed = origin
                .as_ref()
                .map(|o| self.config.accepted_origins.iter().any(|a| a == o))
                .unwrap_or(false);
            if !allowed {
                return Err(HandshakeReject::with_status(403, "origin not allowed"));
            }
        }

        let requested: Vec<String> = req
            .headers()
            .get_str_value(&"Sec-WebSocket-Protocol")
            .map(|p| {
                p.split(|c| c == ',' || c == ' ')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();
        let protocol = if self.config.auto_accept_connections
            || self.config.accepted_protocols.is_empty()
        {
            requested.first().cloned()
        } else {
            match requested
                .iter()
                .find(|p| self.config.accepted_protocols.contains(p))
            {
                Some(p) => Some(p.clone()),
                None => return Err(HandshakeReject::new("no acceptable sub-protocol")),
            }
        };

        let mut builder = Response::builder()
            .status(101)
            .header("Upgrade", "websocket")
            .header("Connection", "Upgrade")
            .header("Sec-WebSocket-Accept", accept);
        if let Some(p) = &protocol {
            builder = builder.header("Sec-WebSocket-Protocol", p.clone());
        }
        let response = builder
            .body(())
            .map_err(|_| HandshakeReject::new("failed to build accept response"))?;
        Ok(Negotiated { response, protocol })
    }
}

/// Writes the rejection back to the peer. The socket is not shut down here,
/// the caller still owns teardown.
pub async fn write_rejection<T>(io: &mut T, reject: &HandshakeReject) -> ProtResult<()>
where
    T: AsyncWrite + Unpin,
{
    let mut builder = Response::builder().status(reject.status);
    for (key, value) in &reject.headers {
        builder = builder.header(key.clone(), value.clone());
    }
    let mut response = builder
        .header("Content-Length", format!("{}", reject.message.len()))
        .body(())?;
    let mut binary = BinaryMut::new();
    let _ = response.serialize(&mut binary);
    io.write_all(binary.chunk()).await?;
    io.write_all(reject.message.as_bytes()).await?;
    io.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn upgrade_request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().method("GET").url("http://127.0.0.1/ws");
        for (key, value) in headers {
            builder = builder.header(key.to_string(), value.to_string());
        }
        builder.body(()).unwrap()
    }

    fn negotiator(config: TransportConfig) -> HandshakeNegotiator {
        HandshakeNegotiator::new(Arc::new(config))
    }

    #[test]
    fn accept_key_matches_rfc_sample() {
        let accept = HandshakeNegotiator::build_accept("dGhlIHNhbXBsZSBub25jZQ==").unwrap();
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn accept_key_must_be_sixteen_bytes() {
        assert!(HandshakeNegotiator::build_accept("c2hvcnQ=").is_err());
        assert!(HandshakeNegotiator::build_accept("not base64 at all").is_err());
    }

    #[test]
    fn negotiate_accepts_first_requested_protocol() {
        let req = upgrade_request(&[
            ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
            ("Sec-WebSocket-Version", "13"),
            ("Sec-WebSocket-Protocol", "chat, superchat"),
        ]);
        let negotiated = negotiator(TransportConfig::new()).negotiate(&req).unwrap();
        assert_eq!(negotiated.protocol.as_deref(), Some("chat"));
        assert!(negotiated.response.status() == 101);
        assert_eq!(
            negotiated
                .response
                .headers()
                .get_str_value(&"Sec-WebSocket-Accept"),
            Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=".to_string())
        );
    }

    #[test]
    fn missing_version_is_rejected_with_400() {
        let req = upgrade_request(&[("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")]);
        let reject = negotiator(TransportConfig::new()).negotiate(&req).unwrap_err();
        assert_eq!(reject.status, 400);
    }

    #[test]
    fn disallowed_origin_is_rejected_with_403() {
        let mut config = TransportConfig::new();
        config.accepted_origins = vec!["https://ok.example".to_string()];
        let req = upgrade_request(&[
            ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
            ("Sec-WebSocket-Version", "13"),
            ("Origin", "https://evil.example"),
        ]);
        let reject = negotiator(config).negotiate(&req).unwrap_err();
        assert_eq!(reject.status, 403);
    }

    #[test]
    fn protocol_allowlist_picks_first_acceptable() {
        let mut config = TransportConfig::new();
        config.accepted_protocols = vec!["superchat".to_string()];
        let req = upgrade_request(&[
            ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
            ("Sec-WebSocket-Version", "13"),
            ("Sec-WebSocket-Protocol", "chat, superchat"),
        ]);
        let negotiated = negotiator(config).negotiate(&req).unwrap();
        assert_eq!(negotiated.protocol.as_deref(), Some("superchat"));

        let mut config = TransportConfig::new();
        config.accepted_protocols = vec!["graphql".to_string()];
        let req = upgrade_request(&[
            ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
            ("Sec-WebSocket-Version", "13"),
            ("Sec-WebSocket-Protocol", "chat"),
        ]);
        let reject = negotiator(config).negotiate(&req).unwrap_err();
        assert_eq!(reject.status, 400);
    }

    #[test]
    fn auto_accept_skips_policy_checks() {
        let mut config = TransportConfig::new();
        config.auto_accept_connections = true;
        config.accepted_origins = vec!["https://ok.example".to_string()];
        let req = upgrade_request(&[
            ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
            ("Sec-WebSocket-Version", "13"),
            ("Origin", "https://evil.example"),
            ("Sec-WebSocket-Protocol", "chat"),
        ]);
        let negotiated = negotiator(config).negotiate(&req).unwrap();
        assert_eq!(negotiated.protocol.as_deref(), Some("chat"));
    }

    #[tokio::test]
    async fn rejection_is_written_as_http_response() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let reject = HandshakeReject::with_status(403, "origin not allowed")
            .header("X-Reason", "policy");
        write_rejection(&mut server, &reject).await.unwrap();
        drop(server);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        let text = String::from_utf8(received).unwrap();
        assert!(text.starts_with("HTTP/1.1 403"), "unexpected response: {}", text);
        assert!(text.contains("X-Reason"));
        assert!(text.ends_with("origin not allowed"));
    }
}
