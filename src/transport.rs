//! Transport boundary between candles and the BLE stack.
//!
//! A [`Transport`] opens one [`Session`] per device identifier. A session
//! writes effect frames without waiting for the peripheral to acknowledge
//! them and is closed exactly once.

use async_trait::async_trait;

use crate::TransportError;

/// Opens sessions to devices by identifier
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, id: &str) -> Result<Box<dyn Session>, TransportError>;
}

/// An open connection to one device
#[async_trait]
pub trait Session: Send {
    /// Queues `frame` on the effect characteristic. Returning `Ok` only means
    /// the local stack accepted the write.
    async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

pub mod mock {
    //! In-memory transport that records every call, for tests.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tokio::time::Instant;

    /// A recorded transport call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Open(String),
        Write(String, Vec<u8>),
        Close(String),
    }

    #[derive(Default)]
    struct State {
        timeline: Vec<(Instant, Event)>,
        unreachable: HashSet<String>,
        failing_writes: HashSet<String>,
        failing_closes: HashSet<String>,
        open_sessions: usize,
    }

    /// Cloneable handle; clones share the recorded state.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        state: Arc<Mutex<State>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// `open` fails for this id
        pub fn set_unreachable(&self, id: &str) {
            self.state.lock().unreachable.insert(id.to_string());
        }

        /// Writes on sessions for this id fail
        pub fn fail_writes(&self, id: &str) {
            self.state.lock().failing_writes.insert(id.to_string());
        }

        /// Closing sessions for this id fails (the session is still released)
        pub fn fail_closes(&self, id: &str) {
            self.state.lock().failing_closes.insert(id.to_string());
        }

        pub fn events(&self) -> Vec<Event> {
            self.state
                .lock()
                .timeline
                .iter()
                .map(|(_, event)| event.clone())
                .collect()
        }

        pub fn timeline(&self) -> Vec<(Instant, Event)> {
            self.state.lock().timeline.clone()
        }

        /// Frames successfully written to `id`, in order
        pub fn frames_for(&self, id: &str) -> Vec<Vec<u8>> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    Event::Write(target, frame) if target == id => Some(frame),
                    _ => None,
                })
                .collect()
        }

        pub fn open_sessions(&self) -> usize {
            self.state.lock().open_sessions
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn open(&self, id: &str) -> Result<Box<dyn Session>, TransportError> {
            let mut state = self.state.lock();
            if state.unreachable.contains(id) {
                return Err(TransportError::DeviceNotFound(id.to_string()));
            }
            state.open_sessions += 1;
            state
                .timeline
                .push((Instant::now(), Event::Open(id.to_string())));

            Ok(Box::new(MockSession {
                id: id.to_string(),
                state: Arc::clone(&self.state),
                closed: false,
            }))
        }
    }

    struct MockSession {
        id: String,
        state: Arc<Mutex<State>>,
        closed: bool,
    }

    #[async_trait]
    impl Session for MockSession {
        async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
            let mut state = self.state.lock();
            if self.closed {
                return Err(TransportError::Rejected("session closed".into()));
            }
            if state.failing_writes.contains(&self.id) {
                return Err(TransportError::Rejected("write refused".into()));
            }
            state
                .timeline
                .push((Instant::now(), Event::Write(self.id.clone(), frame.to_vec())));
            Ok(())
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            let mut state = self.state.lock();
            if self.closed {
                return Ok(());
            }
            self.closed = true;
            state.open_sessions -= 1;
            state
                .timeline
                .push((Instant::now(), Event::Close(self.id.clone())));

            if state.failing_closes.contains(&self.id) {
                return Err(TransportError::Rejected("disconnect refused".into()));
            }
            Ok(())
        }
    }
}
