/*!
 # PLAYBULB Candle Controller Library

 A Rust library for driving PLAYBULB-style Bluetooth LE candle lights.
 A colour and a lighting effect are encoded into the candle's effect
 characteristic frame and written to one or many devices addressed by
 their BLE identifier.

 ## Features

 * Hex colour parsing with optional brightness byte
 * Flash, pulse, rainbow, fade, candle flicker and solid effects
 * Single candles and candle groups behind one [`Candle`] trait
 * Pluggable transport: btleplug for real hardware, an in-memory mock for tests

 ## Example

 ```no_run
 use std::sync::Arc;
 use std::time::Duration;
 use playbulb_candle::*;

 #[tokio::main]
 async fn main() -> color_eyre::Result<()> {
     tracing_subscriber::fmt::init();
     color_eyre::install()?;

     let transport = Arc::new(BleTransport::new(TransportConfig::default()).await?);
     let colour = Colour::from_hex_str("80FF8800")?;
     let effect = Effect::new(EffectMode::Candle, colour, 0);

     let mut candle = PlaybulbCandle::new("AA:BB:CC:DD:EE:FF", transport);

     // The write is unacknowledged, so give it a second to leave before disconnecting
     apply_effect(&mut candle, &effect, Duration::from_secs(1)).await?;
     Ok(())
 }
 ```
*/

use std::time::Duration;

use thiserror::Error;

/// Error types for the candle controller library
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed hex colour string
    #[error("Only 6 or 8 character hex colours are supported, got '{0}'")]
    InvalidFormat(String),

    /// Effect name not recognised
    #[error("Unsupported effect '{0}'")]
    UnsupportedEffect(String),

    /// Speed outside of the 0-255 range
    #[error("Speed must be between 0 and 255, got {0}")]
    SpeedOutOfRange(i64),

    /// No candle identifiers were given
    #[error("No candle IDs given")]
    NoDevicesSpecified,

    /// Could not open a session to the candle
    #[error("Failed to connect to candle {id}: {source}")]
    ConnectionFailed {
        id: String,
        #[source]
        source: TransportError,
    },

    /// The effect write was not accepted by the BLE stack
    #[error("Failed to send effect to candle {id}: {source}")]
    TransmitFailed {
        id: String,
        #[source]
        source: TransportError,
    },

    /// Closing the session failed
    #[error("Failed to disconnect from candle {id}: {source}")]
    DisconnectFailed {
        id: String,
        #[source]
        source: TransportError,
    },

    /// An effect was sent before connecting
    #[error("Candle {0} is not connected")]
    NotConnected(String),

    /// One or more members of a candle group failed
    #[error("{} candle(s) in the group failed: {}", .0.len(), join_errors(.0))]
    Group(Vec<Error>),
}

impl Error {
    /// True for input errors caught before any device is touched
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidFormat(_)
                | Error::UnsupportedEffect(_)
                | Error::SpeedOutOfRange(_)
                | Error::NoDevicesSpecified
        )
    }
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failures reported by the BLE transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// No Bluetooth adapters found
    #[error("No Bluetooth adapters found")]
    NoBluetoothAdapters,

    /// No peripheral with the given identifier showed up during the scan
    #[error("Device {0} not found")]
    DeviceNotFound(String),

    /// Failed to find required BLE characteristic
    #[error("Could not find required BLE characteristic: {0}")]
    CharacteristicNotFound(String),

    /// Operation did not finish in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Error from btleplug
    #[error(transparent)]
    Ble(#[from] btleplug::Error),

    /// The transport refused the operation
    #[error("{0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod ble;
pub mod candle;
pub mod colour;
pub mod config;
pub mod effect;
pub mod group;
pub mod transport;

pub use ble::{BleTransport, TransportConfig};
pub use candle::{apply_effect, Candle, PlaybulbCandle};
pub use colour::Colour;
pub use config::{Config, Plan, Target, DEFAULT_COLOUR, DEFAULT_FLUSH_INTERVAL};
pub use effect::{Effect, EffectMode, EFFECT_CHARACTERISTIC_UUID};
pub use group::CandleGroup;
pub use transport::{Session, Transport};
