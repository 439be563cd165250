//! # BlueZ Transport
//!
//! [`WirelessTransport`] over the BlueZ D-Bus API using `bluer`.
//!
//! The D-Bus session is opened lazily and dropped again when a probe fails, so
//! a restarted `bluetoothd` is picked up on the next discovery pass.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bluer::{Device, DeviceEvent, DeviceProperty, Session};
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{WirelessDevice, WirelessTransport};
use crate::error::{PadsleepError, Result};
use crate::identity::HardwareIdentity;

/// Fallback poll interval when the device property stream is unavailable
const CONNECTION_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// BlueZ-backed wireless transport
#[derive(Default)]
pub struct BluezTransport {
    session: Mutex<Option<Session>>,
}

impl BluezTransport {
    /// Create a transport; the D-Bus session is opened on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn session(&self) -> Result<Session> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }

        let session = Session::new()
            .await
            .map_err(|e| PadsleepError::TransportUnavailable(format!("BlueZ session: {}", e)))?;
        debug!("Opened BlueZ session");
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn reset_session(&self) {
        *self.session.lock().await = None;
    }

    async fn adapter_names(&self) -> Result<Vec<String>> {
        let session = self.session().await?;
        session
            .adapter_names()
            .await
            .map_err(|e| PadsleepError::TransportUnavailable(format!("Listing adapters: {}", e)))
    }
}

#[async_trait]
impl WirelessTransport for BluezTransport {
    async fn probe(&self) -> Result<()> {
        match self.adapter_names().await {
            Ok(names) if names.is_empty() => Err(PadsleepError::TransportUnavailable(
                "no Bluetooth adapters".to_string(),
            )),
            Ok(_) => Ok(()),
            Err(e) => {
                self.reset_session().await;
                Err(e)
            }
        }
    }

    async fn find_device(
        &self,
        identity: &HardwareIdentity,
    ) -> Result<Option<Arc<dyn WirelessDevice>>> {
        let session = self.session().await?;

        for name in self.adapter_names().await? {
            let adapter = session.adapter(&name)?;
            for address in adapter.device_addresses().await? {
                if identity.matches_address(&address.to_string()) {
                    let device = adapter.device(address)?;
                    debug!("Found {} on adapter {}", identity, name);
                    return Ok(Some(Arc::new(BluezDevice::new(device))));
                }
            }
        }

        Ok(None)
    }
}

/// A BlueZ device handle
pub struct BluezDevice {
    device: Device,
    address: String,
}

impl std::fmt::Debug for BluezDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BluezDevice")
            .field("address", &self.address)
            .field("adapter", &self.device.adapter_name())
            .finish_non_exhaustive()
    }
}

impl BluezDevice {
    fn new(device: Device) -> Self {
        let address = device.address().to_string();
        Self { device, address }
    }

    async fn poll_until_disconnected(&self) {
        loop {
            tokio::time::sleep(CONNECTION_POLL_INTERVAL).await;
            match self.device.is_connected().await {
                Ok(true) => {}
                Ok(false) => return,
                Err(e) => {
                    debug!("{} no longer queryable: {}", self.address, e);
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl WirelessDevice for BluezDevice {
    fn address(&self) -> &str {
        &self.address
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.device.is_connected().await?)
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(self.device.disconnect().await?)
    }

    async fn wait_disconnected(&self) {
        match self.device.events().await {
            Ok(events) => {
                futures::pin_mut!(events);
                while let Some(event) = events.next().await {
                    if let DeviceEvent::PropertyChanged(DeviceProperty::Connected(false)) = event {
                        return;
                    }
                }
                debug!("Event stream for {} ended, polling connection state", self.address);
            }
            Err(e) => {
                warn!("Cannot watch {} for disconnects ({}), polling instead", self.address, e);
            }
        }

        self.poll_until_disconnected().await;
    }
}

impl Drop for BluezDevice {
    fn drop(&mut self) {
        debug!("Released wireless handle {}", self.address);
    }
}
