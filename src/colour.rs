/*!
 # Candle colours

 A candle colour is four bytes: a brightness (white channel) byte followed
 by red, green and blue. Colours are usually given as hex strings, either
 `RRGGBB` or `BBRRGGBB` where the leading pair is the brightness.
*/

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// A fully specified candle colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Colour {
    brightness: u8,
    r: u8,
    g: u8,
    b: u8,
}

impl Colour {
    pub const fn new(brightness: u8, r: u8, g: u8, b: u8) -> Self {
        Self { brightness, r, g, b }
    }

    /// Parses a 6 or 8 digit hex colour.
    ///
    /// With 8 digits the first pair is the brightness, otherwise the
    /// brightness is 0. Digits are case-insensitive.
    ///
    /// ```
    /// use playbulb_candle::Colour;
    ///
    /// let c = Colour::from_hex_str("80112233").unwrap();
    /// assert_eq!((c.brightness(), c.r(), c.g(), c.b()), (128, 17, 34, 51));
    /// ```
    pub fn from_hex_str(s: &str) -> Result<Self> {
        let valid = matches!(s.len(), 6 | 8) && s.bytes().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(Error::InvalidFormat(s.to_string()));
        }

        let (brightness, rgb) = match s.len() {
            8 => (hex_byte(s, &s[..2])?, &s[2..]),
            _ => (0, s),
        };

        Ok(Self {
            brightness,
            r: hex_byte(s, &rgb[0..2])?,
            g: hex_byte(s, &rgb[2..4])?,
            b: hex_byte(s, &rgb[4..6])?,
        })
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn r(&self) -> u8 {
        self.r
    }

    pub fn g(&self) -> u8 {
        self.g
    }

    pub fn b(&self) -> u8 {
        self.b
    }

    /// Bytes in the order the candle expects them: brightness, red, green, blue
    pub fn to_bytes(&self) -> [u8; 4] {
        [self.brightness, self.r, self.g, self.b]
    }
}

/// Decodes one hex pair; `input` is the whole string, kept for the error
fn hex_byte(input: &str, pair: &str) -> Result<u8> {
    u8::from_str_radix(pair, 16).map_err(|_| Error::InvalidFormat(input.to_string()))
}

impl FromStr for Colour {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex_str(s)
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}{:02X}{:02X}{:02X}",
            self.brightness, self.r, self.g, self.b
        )
    }
}
