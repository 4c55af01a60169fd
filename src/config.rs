/*!
 # Run configuration

 [`Config`] holds the raw command input. [`Config::validate`] checks all of
 it before any device is touched and produces a [`Plan`] that builds the
 target and runs the effect.
*/

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::transport::Transport;
use crate::{
    apply_effect, Candle, CandleGroup, Colour, Effect, EffectMode, Error, PlaybulbCandle, Result,
};

/// Colour used when none is given: brightness off, red stored
pub const DEFAULT_COLOUR: &str = "00FF0000";

/// Time allowed for an unacknowledged effect write to leave before disconnecting
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Raw command input, as given by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Effect name, empty for solid
    pub effect: String,
    /// 6 or 8 digit hex colour, empty for [`DEFAULT_COLOUR`]
    pub colour: String,
    /// Animation speed, must fit 0-255
    pub speed: i64,
    /// Candle identifiers
    pub targets: Vec<String>,
    pub flush_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            effect: String::new(),
            colour: String::new(),
            speed: 0,
            targets: Vec::new(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl Config {
    /// Checks colour, effect, speed and targets, in that order
    #[instrument(skip(self))]
    pub fn validate(self) -> Result<Plan> {
        let colour = if self.colour.is_empty() {
            DEFAULT_COLOUR
        } else {
            self.colour.as_str()
        };
        let colour = Colour::from_hex_str(colour)?;

        let mode = if self.effect.is_empty() {
            EffectMode::default()
        } else {
            self.effect.parse()?
        };

        let speed = u8::try_from(self.speed).map_err(|_| Error::SpeedOutOfRange(self.speed))?;

        if self.targets.is_empty() {
            return Err(Error::NoDevicesSpecified);
        }

        let effect = Effect::new(mode, colour, speed);
        debug!("Validated effect: {}", effect);

        Ok(Plan {
            effect,
            targets: self.targets,
            flush_interval: self.flush_interval,
        })
    }
}

/// A validated command, ready to run against devices.
///
/// Only [`Config::validate`] builds a plan, so it always has at least one target.
///
/// ```compile_fail
/// use std::time::Duration;
/// use playbulb_candle::{Colour, Effect, EffectMode, Plan};
///
/// let plan = Plan {
///     effect: Effect::new(EffectMode::Solid, Colour::default(), 0),
///     targets: Vec::new(),
///     flush_interval: Duration::ZERO,
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    effect: Effect,
    targets: Vec<String>,
    flush_interval: Duration,
}

/// What a plan runs against
#[derive(Debug)]
pub enum Target {
    Single(PlaybulbCandle),
    Group(CandleGroup),
}

impl Target {
    pub fn candle_mut(&mut self) -> &mut dyn Candle {
        match self {
            Target::Single(candle) => candle as &mut dyn Candle,
            Target::Group(group) => group as &mut dyn Candle,
        }
    }
}

impl Plan {
    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// A single candle for one target, a group for several
    pub fn target(&self, transport: Arc<dyn Transport>) -> Target {
        match self.targets.as_slice() {
            [id] => Target::Single(PlaybulbCandle::new(id.as_str(), transport)),
            ids => Target::Group(CandleGroup::new(
                ids.iter()
                    .map(|id| {
                        Box::new(PlaybulbCandle::new(id.as_str(), Arc::clone(&transport)))
                            as Box<dyn Candle>
                    })
                    .collect(),
            )),
        }
    }

    /// Connects, sends the effect, waits the flush interval and disconnects
    #[instrument(skip(self, transport), fields(targets = self.targets.len()))]
    pub async fn execute(&self, transport: Arc<dyn Transport>) -> Result<()> {
        let mut target = self.target(transport);
        info!("Applying {} to {}", self.effect, self.targets.join(", "));
        apply_effect(target.candle_mut(), &self.effect, self.flush_interval).await
    }
}
