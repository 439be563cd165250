//! # Wireless Module
//!
//! Narrow interface to the wireless transport stack.
//!
//! This module handles:
//! - Probing whether the transport is reachable at all
//! - Looking up a connected device handle by hardware identity
//! - Disconnecting a device and watching for disconnects
//!
//! The production implementation talks to BlueZ through `bluer`.

pub mod bluez;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::identity::HardwareIdentity;

pub use bluez::BluezTransport;

/// Handle to one wireless device. Dropping the handle releases it.
#[async_trait]
pub trait WirelessDevice: Send + Sync {
    /// Link-layer address as reported by the transport.
    fn address(&self) -> &str;

    /// Whether the device currently has a live link.
    async fn is_connected(&self) -> Result<bool>;

    /// Request the transport to drop the link.
    async fn disconnect(&self) -> Result<()>;

    /// Resolves once the transport reports the device as disconnected.
    async fn wait_disconnected(&self);
}

/// Entry point to the wireless transport stack.
#[async_trait]
pub trait WirelessTransport: Send + Sync {
    /// Lightweight capability probe.
    ///
    /// # Errors
    ///
    /// Returns `TransportUnavailable` if the stack or every adapter is unreachable.
    async fn probe(&self) -> Result<()>;

    /// Find the device whose address matches `identity` (case-insensitive) on any adapter.
    async fn find_device(&self, identity: &HardwareIdentity)
        -> Result<Option<Arc<dyn WirelessDevice>>>;
}
