use crate::observer::{MediationEvent, MediationObserver};
use crate::provider::Demand;
use crate::MediationError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Ranked demands of a finished auction, winner first
#[derive(Debug, Clone, Default)]
pub struct Waterfall {
    demands: Vec<Demand>,
}

impl Waterfall {
    pub fn new(demands: Vec<Demand>) -> Self {
        Self { demands }
    }

    pub fn winner(&self) -> Option<&Demand> {
        self.demands.first()
    }

    pub fn get(&self, index: usize) -> Option<&Demand> {
        self.demands.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Demand> {
        self.demands.iter()
    }

    pub fn len(&self) -> usize {
        self.demands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.demands.is_empty()
    }
}

impl From<Vec<Demand>> for Waterfall {
    fn from(demands: Vec<Demand>) -> Self {
        Self::new(demands)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterfallState {
    Idle,
    /// Filling the demand at this index
    Loading(usize),
    Done,
}

/// Fills demands of a waterfall in order until one succeeds
pub struct WaterfallController {
    waterfall: Waterfall,
    observer: Arc<dyn MediationObserver>,
    timeout: Option<Duration>,
    state: Mutex<WaterfallState>,
}

impl WaterfallController {
    /// `timeout` bounds the whole traversal, `None` waits indefinitely
    pub fn new(
        waterfall: Waterfall,
        observer: Arc<dyn MediationObserver>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            waterfall,
            observer,
            timeout,
            state: Mutex::new(WaterfallState::Idle),
        }
    }

    pub fn state(&self) -> WaterfallState {
        *self.state.lock()
    }

    pub fn waterfall(&self) -> &Waterfall {
        &self.waterfall
    }

    /// Returns the first demand whose provider fills its ad.
    ///
    /// Fails with [`MediationError::NoFill`] when every fill fails and with
    /// [`MediationError::Timeout`] when the traversal outlives the timeout.
    /// A controller loads once.
    pub async fn load(&self) -> crate::Result<Demand> {
        {
            let mut state = self.state.lock();
            if *state != WaterfallState::Idle {
                warn!("Waterfall is {:?}, loading attempt is ignored", *state);
                return Err(MediationError::InvalidState(format!(
                    "waterfall is {:?}",
                    *state
                )));
            }
            *state = WaterfallState::Loading(0);
        }

        info!("Waterfall will load {} demands", self.waterfall.len());

        let result = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.traverse()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Waterfall exceeded timeout of {}ms", timeout.as_millis());
                    self.cancel_current();
                    Err(MediationError::Timeout)
                }
            },
            None => self.traverse().await,
        };

        self.set_state(WaterfallState::Done);
        result
    }

    async fn traverse(&self) -> crate::Result<Demand> {
        for (index, demand) in self.waterfall.iter().enumerate() {
            self.set_state(WaterfallState::Loading(index));
            debug!(
                "Waterfall will fill {} ({}/{})",
                demand.ad(),
                index + 1,
                self.waterfall.len()
            );
            self.observer.log(MediationEvent::FillRequest {
                bid: demand.bid().clone(),
            });

            match demand.source().fill(demand.ad()).await {
                Ok(()) => {
                    info!("Waterfall did fill {}", demand.ad());
                    self.observer.log(MediationEvent::FillResponse {
                        bid: demand.bid().clone(),
                    });
                    return Ok(demand.clone());
                }
                Err(error) => {
                    debug!("Waterfall failed to fill {}: {}", demand.ad(), error);
                    self.observer.log(MediationEvent::FillError {
                        bid: demand.bid().clone(),
                        error,
                    });
                }
            }
        }

        info!("Waterfall is exhausted");
        Err(MediationError::NoFill)
    }

    fn set_state(&self, state: WaterfallState) {
        *self.state.lock() = state;
    }

    fn cancel_current(&self) {
        let WaterfallState::Loading(index) = self.state() else {
            return;
        };
        if let Some(demand) = self.waterfall.get(index) {
            demand.source().cancel();
            self.observer.log(MediationEvent::FillError {
                bid: demand.bid().clone(),
                error: MediationError::Timeout,
            });
        }
    }
}
