// Copyright 2024 - 2026 Wsport See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::time::Duration;

use serde::Deserialize;

use crate::ProtResult;

/// 每个链接的协议限制与策略, 构造后不再修改
///
/// Time-valued options are stored in milliseconds, size-valued options in
/// bytes. Everything has a documented default so a partial TOML file (or a
/// plain `TransportConfig::new()`) is always valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Upper bound on a single inbound frame. Default 64KiB.
    pub max_received_frame_size: usize,
    /// Upper bound on an assembled multi-frame message, only applicable
    /// if `assemble_fragments` is true. Default 1MiB.
    pub max_received_message_size: usize,
    /// Outgoing messages larger than `fragmentation_threshold` will be
    /// split into multiple fragments. Default on.
    pub fragment_outgoing_messages: bool,
    /// Outgoing frames are fragmented if they exceed this threshold.
    /// Default 16KiB.
    pub fragmentation_threshold: usize,
    /// If true, the engine sends a ping whenever the connection has been
    /// idle for `keepalive_interval`. Default off.
    pub keepalive: bool,
    /// 心跳间隔, 毫秒
    pub keepalive_interval: u64,
    /// 心跳宽限期, 毫秒, keepalive为false时忽略
    pub keepalive_grace_period: u64,
    /// Drop the connection when a keepalive ping goes unanswered past the
    /// grace period. Ignored if `keepalive` is false. Default on.
    pub drop_connection_on_keepalive_timeout: bool,
    /// Reassemble fragmented inbound frames before delivery. Default on.
    pub assemble_fragments: bool,
    /// Skip origin and sub-protocol validation and accept the first
    /// requested sub-protocol. Only use behind a trusted boundary.
    /// Default off.
    pub auto_accept_connections: bool,
    /// Favor latency over throughput on the socket. Default on.
    pub disable_nagle_algorithm: bool,
    /// 发送关闭帧后等待对端确认的上限, 毫秒
    pub close_timeout: u64,
    /// Soft backpressure threshold before pausing inbound reads.
    /// Default 16KiB.
    pub receive_buffer_size: usize,
    /// Soft scheduling-fairness hint for message handling, milliseconds.
    pub message_blocking_time: u64,
    /// Sub-protocols this endpoint is willing to speak. Empty accepts any.
    pub accepted_protocols: Vec<String>,
    /// Origins allowed to open a connection. Empty accepts any.
    pub accepted_origins: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_received_frame_size: 0x10000,
            max_received_message_size: 0x100000,
            fragment_outgoing_messages: true,
            fragmentation_threshold: 0x4000,
            keepalive: false,
            keepalive_interval: 20_000,
            keepalive_grace_period: 10_000,
            drop_connection_on_keepalive_timeout: true,
            assemble_fragments: true,
            auto_accept_connections: false,
            disable_nagle_algorithm: true,
            close_timeout: 5_000,
            receive_buffer_size: 0x4000,
            message_blocking_time: 1,
            accepted_protocols: vec![],
            accepted_origins: vec![],
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml(value: &str) -> ProtResult<Self> {
        let config = toml::from_str(value)?;
        Ok(config)
    }

    pub fn close_wait(&self) -> Duration {
        Duration::from_millis(self.close_timeout)
    }

    pub fn keepalive_wait(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval)
    }

    pub fn keepalive_grace(&self) -> Duration {
        Duration::from_millis(self.keepalive_grace_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_values() {
        let config = TransportConfig::new();
        assert_eq!(config.max_received_frame_size, 0x10000);
        assert_eq!(config.max_received_message_size, 0x100000);
        assert!(config.fragment_outgoing_messages);
        assert_eq!(config.fragmentation_threshold, 0x4000);
        assert!(!config.keepalive);
        assert_eq!(config.close_wait(), Duration::from_secs(5));
        assert_eq!(config.keepalive_wait(), Duration::from_secs(20));
        assert_eq!(config.keepalive_grace(), Duration::from_secs(10));
        assert!(!config.auto_accept_connections);
        assert!(config.disable_nagle_algorithm);
        assert_eq!(config.receive_buffer_size, 0x4000);
        assert_eq!(config.message_blocking_time, 1);
        assert!(config.accepted_protocols.is_empty());
        assert!(config.accepted_origins.is_empty());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = TransportConfig::from_toml(
            "close_timeout = 1000\nauto_accept_connections = true\naccepted_protocols = [\"chat\"]\n",
        )
        .unwrap();
        assert_eq!(config.close_wait(), Duration::from_secs(1));
        assert!(config.auto_accept_connections);
        assert_eq!(config.accepted_protocols, vec!["chat".to_string()]);
        assert_eq!(config.max_received_frame_size, 0x10000);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = TransportConfig::from_toml("close_timeout = \"soon\"").unwrap_err();
        assert!(matches!(err, crate::ProtError::Config(_)));
    }
}
