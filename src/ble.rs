use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::effect::EFFECT_CHARACTERISTIC_UUID;
use crate::transport::{Session, Transport};
use crate::TransportError;

/// How often the peripheral list is polled while scanning
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Gets the default Bluetooth adapter
#[instrument(skip(manager))]
async fn get_central(manager: &Manager) -> Result<Adapter, TransportError> {
    debug!("Getting default Bluetooth adapter");
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            error!("No Bluetooth adapters found");
            TransportError::NoBluetoothAdapters
        })?;

    debug!("Using Bluetooth adapter");
    Ok(adapter)
}

/// Discovers services and looks up the effect characteristic
async fn effect_characteristic(peripheral: &Peripheral) -> Result<Characteristic, TransportError> {
    debug!("Discovering services...");
    peripheral.discover_services().await?;

    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == EFFECT_CHARACTERISTIC_UUID)
        .ok_or_else(|| {
            TransportError::CharacteristicNotFound(EFFECT_CHARACTERISTIC_UUID.to_string())
        })
}

/// Runs `release` when `result` is an error, so a half opened link is not left behind.
/// The original error is returned either way.
async fn release_on_error<T, E: fmt::Display>(
    result: Result<T, TransportError>,
    release: impl Future<Output = Result<(), E>>,
) -> Result<T, TransportError> {
    if result.is_err() {
        if let Err(e) = release.await {
            warn!("Failed to disconnect after setup error: {}", e);
        }
    }
    result
}

/// Timeouts and write behaviour for [`BleTransport`]
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum time to wait for the device to show up in a scan
    pub scan_timeout: Duration,
    /// Maximum time to wait for the connection to be established
    pub connect_timeout: Duration,
    /// Ask the peripheral to acknowledge effect writes
    pub confirm_writes: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            confirm_writes: false,
        }
    }
}

/// Transport backed by the platform BLE stack
pub struct BleTransport {
    adapter: Adapter,
    config: TransportConfig,
}

impl BleTransport {
    /// Binds to the first Bluetooth adapter on the system
    #[instrument]
    pub async fn new(config: TransportConfig) -> Result<Self, TransportError> {
        info!("Initializing BLE transport");
        let manager = Manager::new().await?;
        let adapter = get_central(&manager).await?;
        Ok(Self { adapter, config })
    }

    /// Scans until a peripheral matching `id` by address or platform id appears
    async fn find(&self, id: &str) -> Result<Peripheral, TransportError> {
        loop {
            let peripherals = self.adapter.peripherals().await?;
            trace!("Found {} BLE peripherals so far", peripherals.len());

            for p in peripherals {
                if p.address().to_string().eq_ignore_ascii_case(id)
                    || p.id().to_string().eq_ignore_ascii_case(id)
                {
                    return Ok(p);
                }
            }

            time::sleep(SCAN_POLL_INTERVAL).await;
        }
    }

    /// Scans for `id`, always stopping the scan before returning
    async fn scan_for(&self, id: &str) -> Result<Peripheral, TransportError> {
        self.adapter.start_scan(ScanFilter::default()).await?;

        let found = time::timeout(self.config.scan_timeout, self.find(id)).await;

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        match found {
            Ok(peripheral) => peripheral,
            Err(_) => {
                error!(
                    "Candle {} not found within {} seconds",
                    id,
                    self.config.scan_timeout.as_secs()
                );
                Err(TransportError::DeviceNotFound(id.to_string()))
            }
        }
    }
}

#[async_trait]
impl Transport for BleTransport {
    #[instrument(skip(self))]
    async fn open(&self, id: &str) -> Result<Box<dyn Session>, TransportError> {
        info!("Scanning for candle {}...", id);
        let peripheral = self.scan_for(id).await?;

        info!("Connecting to candle {}...", id);
        if !peripheral.is_connected().await? {
            // A timed out connect may still complete later, so it is released too
            let connected = time::timeout(self.config.connect_timeout, peripheral.connect())
                .await
                .map_err(|_| TransportError::Timeout(self.config.connect_timeout))
                .and_then(|r| r.map_err(TransportError::from));
            release_on_error(connected, peripheral.disconnect()).await?;
        }

        let characteristic =
            release_on_error(effect_characteristic(&peripheral).await, peripheral.disconnect())
                .await?;
        debug!("Found effect characteristic: {}", characteristic.uuid);

        let write_type = if self.config.confirm_writes {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        Ok(Box::new(BleSession {
            peripheral,
            characteristic,
            write_type,
        }))
    }
}

/// A connected candle peripheral and its effect characteristic
struct BleSession {
    peripheral: Peripheral,
    characteristic: Characteristic,
    write_type: WriteType,
}

#[async_trait]
impl Session for BleSession {
    #[instrument(skip(self, frame), fields(frame_len = frame.len()))]
    async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        trace!("Writing effect frame {:02x?} ({:?})", frame, self.write_type);
        self.peripheral
            .write(&self.characteristic, frame, self.write_type)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn close(&mut self) -> Result<(), TransportError> {
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
        }
        debug!("Peripheral disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_setup_releases_the_link() {
        let mut released = false;
        let result: Result<(), TransportError> = release_on_error(
            Err(TransportError::CharacteristicNotFound("fffb".into())),
            async {
                released = true;
                Ok::<(), String>(())
            },
        )
        .await;

        assert!(matches!(result, Err(TransportError::CharacteristicNotFound(_))));
        assert!(released);
    }

    #[tokio::test]
    async fn connect_timeout_is_kept_when_release_fails() {
        let result: Result<(), TransportError> = release_on_error(
            Err(TransportError::Timeout(Duration::from_secs(10))),
            async { Err::<(), String>("not connected".into()) },
        )
        .await;

        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn successful_setup_keeps_the_link() {
        let mut released = false;
        let result = release_on_error(Ok(7), async {
            released = true;
            Ok::<(), String>(())
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert!(!released);
    }
}
