/*!
 # Effect modes for PLAYBULB candles

 An effect is written to the candle's effect characteristic as an 8 byte
 frame: `[brightness, red, green, blue, mode, 0x00, speed, 0x00]`.
*/

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::{Colour, Error, Result};

/// Effect characteristic (0xFFFB) on the candle's vendor service
pub const EFFECT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000fffb_0000_1000_8000_00805f9b34fb);

/// Length of an encoded effect frame
pub const EFFECT_FRAME_LEN: usize = 8;

/// Lighting animations supported by the candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EffectMode {
    /// Blink the colour on and off
    Flash,
    /// Fade the colour in and out
    Pulse,
    /// Jump through the rainbow
    Rainbow,
    /// Crossfade through the rainbow
    Fade,
    /// Flicker like a real candle
    Candle,
    /// Hold the colour
    #[default]
    Solid,
}

impl EffectMode {
    pub const ALL: [EffectMode; 6] = [
        EffectMode::Flash,
        EffectMode::Pulse,
        EffectMode::Rainbow,
        EffectMode::Fade,
        EffectMode::Candle,
        EffectMode::Solid,
    ];

    /// Mode byte understood by the device
    pub fn code(&self) -> u8 {
        match self {
            EffectMode::Flash => 0x00,
            EffectMode::Pulse => 0x01,
            EffectMode::Rainbow => 0x02,
            EffectMode::Fade => 0x03,
            EffectMode::Candle => 0x04,
            EffectMode::Solid => 0xff,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EffectMode::Flash => "flash",
            EffectMode::Pulse => "pulse",
            EffectMode::Rainbow => "rainbow",
            EffectMode::Fade => "fade",
            EffectMode::Candle => "candle",
            EffectMode::Solid => "solid",
        }
    }
}

impl FromStr for EffectMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EffectMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnsupportedEffect(s.to_string()))
    }
}

impl fmt::Display for EffectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single effect command: mode, colour and animation speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Effect {
    mode: EffectMode,
    colour: Colour,
    speed: u8,
}

impl Effect {
    pub fn new(mode: EffectMode, colour: Colour, speed: u8) -> Self {
        Self {
            mode,
            colour,
            speed,
        }
    }

    pub fn mode(&self) -> EffectMode {
        self.mode
    }

    pub fn colour(&self) -> Colour {
        self.colour
    }

    /// Animation speed, 0 being static
    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// Encodes the effect characteristic frame
    pub fn to_frame(&self) -> [u8; EFFECT_FRAME_LEN] {
        let [brightness, r, g, b] = self.colour.to_bytes();
        [brightness, r, g, b, self.mode.code(), 0x00, self.speed, 0x00]
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} colour={} speed={}",
            self.mode, self.colour, self.speed
        )
    }
}
