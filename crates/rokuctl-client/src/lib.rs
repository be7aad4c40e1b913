//! # rokuctl-client - Async Device Client
//!
//! Drives a Roku-class device over its HTTP control surface and tails its
//! debug log streams, for test harnesses and tooling.
//!
//! Two pieces carry the real semantics:
//!
//! - [`CommandQueue`] -- every control action becomes one queued operation;
//!   operations execute strictly in submission order with a single one in
//!   flight, however fast the caller enqueues them.
//! - [`DebugChannel`] -- connects to a device log port, discards the replayed
//!   history during a grace window, then broadcasts live lines to
//!   subscribers.
//!
//! Everything else is a thin HTTP/XML wrapper assembled by [`RokuClient`].
//!
//! ## Public API
//!
//! - [`RokuClient`] / [`RokuClientBuilder`] - the facade
//! - [`CommandHandle`] - per-command completion future
//! - [`LaunchTarget`] - launch by id, name, or media URL
//! - [`AppRecord`] / [`DeviceInfo`] - query results
//! - [`ChannelPhase`] - debug log channel lifecycle
//! - [`DeviceConfig`] - toml device configuration

pub mod client;
pub mod config;
pub mod debug;
pub mod query;
pub mod queue;

pub use client::{LaunchTarget, RokuClient, RokuClientBuilder};
pub use config::DeviceConfig;
pub use debug::{ChannelPhase, DebugChannel, DEFAULT_GRACE};
pub use query::{AppRecord, DeviceInfo};
pub use queue::{CommandHandle, CommandQueue};
