//! Typed errors for topology, switch control channel, installation and path tracing.

use std::net::Ipv4Addr;
use std::time::Duration;

use thiserror::Error;

use crate::models::DeviceId;

/// Rejected fat-tree parameters or coordinates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// K must be even and at least 2
    #[error("fat-tree K must be even and >= 2, got {0}")]
    InvalidK(u32),
    /// K must fit the two-digit device id fields (core switches use pod = K)
    #[error("fat-tree K must be <= {max}, got {k}")]
    KTooLarge { k: u32, max: u32 },
}

/// Failure reported by a switch control channel
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("management endpoint unreachable: {0}")]
    Connect(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("command exited with status {status}: {stderr}")]
    CommandFailed { status: i32, stderr: String },
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("channel task failed: {0}")]
    Task(String),
}

/// Failure to install a single planned rule
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("flow backend rejected rule: {0}")]
    Backend(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Reasons a traced packet did not reach its destination
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("unknown host {0}")]
    UnknownHost(Ipv4Addr),
    #[error("device {0} is not part of the wiring")]
    UnknownSwitch(DeviceId),
    #[error("no rule on {device} matches {dst}")]
    TableMiss { device: DeviceId, dst: Ipv4Addr },
    #[error("port {port} on {device} is not wired")]
    DanglingPort { device: DeviceId, port: u32 },
    #[error("packet for {dst} delivered to {delivered}")]
    Misdelivered { dst: Ipv4Addr, delivered: Ipv4Addr },
    #[error("packet for {dst} exceeded {limit} hops")]
    HopLimit { dst: Ipv4Addr, limit: usize },
    #[error("path for {dst} is not up/down: {path}")]
    NotUpDown { dst: Ipv4Addr, path: String },
}
