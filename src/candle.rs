use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, instrument, warn};

use crate::transport::{Session, Transport};
use crate::{Effect, Error, Result};

/// Anything an effect can be sent to: a single candle or a group of them.
///
/// Effect writes are not acknowledged by the candle. After the last
/// [`set_effect`](Candle::set_effect), callers must wait a flush interval
/// (about a second) before calling [`disconnect`](Candle::disconnect), or
/// the frame may be dropped with the link. [`apply_effect`] does this.
#[async_trait]
pub trait Candle: Send {
    async fn connect(&mut self) -> Result<()>;

    async fn set_effect(&mut self, effect: &Effect) -> Result<()>;

    /// Safe to call when already disconnected
    async fn disconnect(&mut self) -> Result<()>;

    /// Identifiers of every device behind this candle, in order
    fn ids(&self) -> Vec<String>;

    fn is_connected(&self) -> bool;
}

/// One physical candle addressed by its BLE identifier
pub struct PlaybulbCandle {
    id: String,
    transport: Arc<dyn Transport>,
    session: Option<Box<dyn Session>>,
}

impl PlaybulbCandle {
    /// Creates a disconnected candle
    pub fn new(id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            id: id.into(),
            transport,
            session: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Debug for PlaybulbCandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybulbCandle")
            .field("id", &self.id)
            .field("connected", &self.session.is_some())
            .finish()
    }
}

#[async_trait]
impl Candle for PlaybulbCandle {
    #[instrument(skip(self), fields(id = %self.id))]
    async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("Already connected");
            return Ok(());
        }

        let session = self
            .transport
            .open(&self.id)
            .await
            .map_err(|source| Error::ConnectionFailed {
                id: self.id.clone(),
                source,
            })?;
        self.session = Some(session);

        info!("Connected to candle {}", self.id);
        Ok(())
    }

    #[instrument(skip(self, effect), fields(id = %self.id, effect = %effect))]
    async fn set_effect(&mut self, effect: &Effect) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::NotConnected(self.id.clone()))?;

        let frame = effect.to_frame();
        debug!("Sending effect frame {:02x?}", frame);
        session
            .write(&frame)
            .await
            .map_err(|source| Error::TransmitFailed {
                id: self.id.clone(),
                source,
            })?;

        info!("Effect sent to candle {}", self.id);
        Ok(())
    }

    #[instrument(skip(self), fields(id = %self.id))]
    async fn disconnect(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            debug!("Already disconnected");
            return Ok(());
        };

        session
            .close()
            .await
            .map_err(|source| Error::DisconnectFailed {
                id: self.id.clone(),
                source,
            })?;

        info!("Disconnected from candle {}", self.id);
        Ok(())
    }

    fn ids(&self) -> Vec<String> {
        vec![self.id.clone()]
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

/// Number of devices a failed `set_effect` did not hand a frame to
fn unsent(error: &Error) -> usize {
    match error {
        Error::NotConnected(_) | Error::TransmitFailed { .. } => 1,
        Error::Group(errors) => errors.iter().map(unsent).sum(),
        _ => 0,
    }
}

/// Connects, sends `effect`, waits `flush` and disconnects.
///
/// The flush wait happens whenever at least one device accepted the frame,
/// including a group where only some members failed. A failed send still
/// disconnects and its error wins over any disconnect error.
#[instrument(skip(candle, effect), fields(ids = ?candle.ids()))]
pub async fn apply_effect(
    candle: &mut dyn Candle,
    effect: &Effect,
    flush: Duration,
) -> Result<()> {
    candle.connect().await?;

    let sent = candle.set_effect(effect).await;
    let accepted = match &sent {
        Ok(()) => candle.ids().len(),
        Err(e) => candle.ids().len().saturating_sub(unsent(e)),
    };
    if accepted > 0 {
        debug!("Waiting {:?} for the effect to flush", flush);
        time::sleep(flush).await;
    } else {
        debug!("No candle accepted the effect, skipping flush");
    }

    let closed = candle.disconnect().await;
    if let (Err(_), Err(e)) = (&sent, &closed) {
        warn!("Disconnect after failed send also failed: {}", e);
    }

    sent.and(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{Event, MockTransport};
    use crate::{Colour, EffectMode, TransportError};

    fn candle(id: &str, transport: &MockTransport) -> PlaybulbCandle {
        PlaybulbCandle::new(id, Arc::new(transport.clone()))
    }

    fn red_pulse() -> Effect {
        Effect::new(EffectMode::Pulse, Colour::new(0xff, 0xff, 0, 0), 10)
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let transport = MockTransport::new();
        let c = candle("A", &transport);
        assert!(!c.is_connected());
        assert_eq!(c.ids(), vec!["A".to_string()]);
        assert!(transport.events().is_empty());
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let transport = MockTransport::new();
        let mut c = candle("A", &transport);

        c.connect().await.unwrap();
        assert!(c.is_connected());
        c.set_effect(&red_pulse()).await.unwrap();
        c.disconnect().await.unwrap();
        assert!(!c.is_connected());

        assert_eq!(
            transport.events(),
            vec![
                Event::Open("A".into()),
                Event::Write("A".into(), red_pulse().to_frame().to_vec()),
                Event::Close("A".into()),
            ]
        );
        assert_eq!(transport.open_sessions(), 0);
    }

    #[tokio::test]
    async fn set_effect_before_connect_is_rejected() {
        let transport = MockTransport::new();
        let mut c = candle("A", &transport);

        let err = c.set_effect(&red_pulse()).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected(ref id) if id == "A"));
        assert!(transport.events().is_empty());
    }

    #[tokio::test]
    async fn connecting_twice_keeps_one_session() {
        let transport = MockTransport::new();
        let mut c = candle("A", &transport);

        c.connect().await.unwrap();
        c.connect().await.unwrap();
        assert_eq!(transport.open_sessions(), 1);
        assert_eq!(transport.events(), vec![Event::Open("A".into())]);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let transport = MockTransport::new();
        let mut c = candle("A", &transport);

        c.disconnect().await.unwrap();

        c.connect().await.unwrap();
        c.disconnect().await.unwrap();
        c.disconnect().await.unwrap();

        let closes = transport
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::Close(_)))
            .count();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn unreachable_candle_fails_to_connect() {
        let transport = MockTransport::new();
        transport.set_unreachable("A");
        let mut c = candle("A", &transport);

        let err = c.connect().await.unwrap_err();
        assert!(matches!(
            err,
            Error::ConnectionFailed { ref id, source: TransportError::DeviceNotFound(_) } if id == "A"
        ));
        assert!(!c.is_connected());
    }

    #[tokio::test]
    async fn failed_write_is_transmit_failure() {
        let transport = MockTransport::new();
        transport.fail_writes("A");
        let mut c = candle("A", &transport);

        c.connect().await.unwrap();
        let err = c.set_effect(&red_pulse()).await.unwrap_err();
        assert!(matches!(err, Error::TransmitFailed { ref id, .. } if id == "A"));
        // Still connected, the caller decides what to do next
        assert!(c.is_connected());
    }

    #[tokio::test]
    async fn failed_close_still_releases_the_session() {
        let transport = MockTransport::new();
        transport.fail_closes("A");
        let mut c = candle("A", &transport);

        c.connect().await.unwrap();
        let err = c.disconnect().await.unwrap_err();
        assert!(matches!(err, Error::DisconnectFailed { ref id, .. } if id == "A"));
        assert!(!c.is_connected());
        assert_eq!(transport.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn apply_effect_waits_before_disconnecting() {
        let transport = MockTransport::new();
        let mut c = candle("A", &transport);
        let flush = Duration::from_secs(1);

        apply_effect(&mut c, &red_pulse(), flush).await.unwrap();

        let timeline = transport.timeline();
        let (written, _) = timeline
            .iter()
            .find(|(_, e)| matches!(e, Event::Write(..)))
            .unwrap();
        let (closed, _) = timeline
            .iter()
            .find(|(_, e)| matches!(e, Event::Close(_)))
            .unwrap();
        assert!(*closed - *written >= flush);
    }

    #[tokio::test(start_paused = true)]
    async fn apply_effect_disconnects_after_failed_send() {
        let transport = MockTransport::new();
        transport.fail_writes("A");
        transport.fail_closes("A");
        let mut c = candle("A", &transport);
        let started = time::Instant::now();

        let err = apply_effect(&mut c, &red_pulse(), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TransmitFailed { .. }));
        assert!(!c.is_connected());
        assert_eq!(transport.open_sessions(), 0);
        // No flush wait when nothing was sent
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn apply_effect_stops_when_connect_fails() {
        let transport = MockTransport::new();
        transport.set_unreachable("A");
        let mut c = candle("A", &transport);

        let err = apply_effect(&mut c, &red_pulse(), Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed { .. }));
        assert!(transport.events().is_empty());
    }
}
