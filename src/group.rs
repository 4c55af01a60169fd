/*!
 # Candle groups

 A [`CandleGroup`] drives several candles as one. Members are processed in
 insertion order, with these failure policies:

 * `connect` is fail-fast: on the first failure the members that already
   connected are disconnected again before the error is returned.
 * `set_effect` sends to every member and reports all failures together.
 * `disconnect` runs for every member concurrently and reports all
   failures together.
*/

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::{Candle, Effect, Error, Result};

/// A set of candles behind the [`Candle`] interface
#[derive(Default)]
pub struct CandleGroup {
    members: Vec<Box<dyn Candle>>,
}

impl CandleGroup {
    pub fn new(members: Vec<Box<dyn Candle>>) -> Self {
        Self { members }
    }

    pub fn push(&mut self, member: Box<dyn Candle>) {
        self.members.push(member);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl std::fmt::Debug for CandleGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleGroup")
            .field("ids", &self.ids())
            .finish()
    }
}

/// Folds member failures into one error, `Ok` when there are none
fn aggregate(errors: Vec<Error>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Group(errors))
    }
}

#[async_trait]
impl Candle for CandleGroup {
    #[instrument(skip(self), fields(members = self.members.len()))]
    async fn connect(&mut self) -> Result<()> {
        for i in 0..self.members.len() {
            if let Err(e) = self.members[i].connect().await {
                warn!("Connect failed, rolling back {} connected candle(s)", i);
                for member in &mut self.members[..i] {
                    if let Err(cleanup) = member.disconnect().await {
                        warn!("Rollback disconnect failed: {}", cleanup);
                    }
                }
                return Err(e);
            }
        }

        info!("Connected to {} candle(s)", self.members.len());
        Ok(())
    }

    #[instrument(skip(self, effect), fields(members = self.members.len(), effect = %effect))]
    async fn set_effect(&mut self, effect: &Effect) -> Result<()> {
        let mut errors = Vec::new();
        for member in &mut self.members {
            if let Err(e) = member.set_effect(effect).await {
                warn!("{}", e);
                errors.push(e);
            }
        }

        debug!(
            "Effect sent to {}/{} candle(s)",
            self.members.len() - errors.len(),
            self.members.len()
        );
        aggregate(errors)
    }

    #[instrument(skip(self), fields(members = self.members.len()))]
    async fn disconnect(&mut self) -> Result<()> {
        let results = join_all(self.members.iter_mut().map(|m| m.disconnect())).await;

        let errors: Vec<Error> = results.into_iter().filter_map(|r| r.err()).collect();
        for e in &errors {
            warn!("{}", e);
        }
        aggregate(errors)
    }

    fn ids(&self) -> Vec<String> {
        self.members.iter().flat_map(|m| m.ids()).collect()
    }

    fn is_connected(&self) -> bool {
        !self.members.is_empty() && self.members.iter().all(|m| m.is_connected())
    }
}
