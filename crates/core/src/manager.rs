use crate::auction::{AuctionController, ControllerEvent};
use crate::domain::{Ad, AdType};
use crate::observer::{BaseMediationObserver, MediationAttemptReport, MediationObserver};
use crate::provider::{AdapterRegistry, Demand};
use crate::transport::{AuctionRequest, MediationTransport, StatisticsRequest};
use crate::waterfall::{Waterfall, WaterfallController};
use crate::MediationError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Settings of a placement driven by an [`AdManager`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MediationConfig {
    pub ad_type: AdType,
    pub placement: String,

    /// Budget of the whole waterfall, unbounded when absent
    pub waterfall_timeout_ms: Option<u64>,

    /// Asks the server for test auctions
    pub test_mode: bool,
}

impl Default for MediationConfig {
    fn default() -> Self {
        Self {
            ad_type: AdType::Interstitial,
            placement: "default".to_string(),
            waterfall_timeout_ms: None,
            test_mode: false,
        }
    }
}

impl MediationConfig {
    pub fn waterfall_timeout(&self) -> Option<Duration> {
        self.waterfall_timeout_ms
            .filter(|timeout| *timeout > 0)
            .map(Duration::from_millis)
    }
}

#[derive(Debug, Clone)]
pub enum AdManagerState {
    Idle,
    Preparing,
    Auction,
    Loading,
    Ready(Demand),
}

impl AdManagerState {
    pub fn name(&self) -> &'static str {
        match self {
            AdManagerState::Idle => "idle",
            AdManagerState::Preparing => "preparing",
            AdManagerState::Auction => "auction",
            AdManagerState::Loading => "loading",
            AdManagerState::Ready(_) => "ready",
        }
    }
}

/// Progress of a session, forwarded to the caller when it subscribed
#[derive(Debug, Clone)]
pub enum AdManagerEvent {
    Controller(ControllerEvent),
    Loaded(Ad),
    FailedToLoad(MediationError),
}

/// Loads ads for one placement: fetches the auction plan, runs the auction,
/// fills the waterfall and uploads the attempt report.
pub struct AdManager {
    config: MediationConfig,
    registry: Arc<AdapterRegistry>,
    transport: Arc<dyn MediationTransport>,
    events: Option<mpsc::UnboundedSender<AdManagerEvent>>,
    state: Mutex<AdManagerState>,
}

impl AdManager {
    pub fn new(
        config: MediationConfig,
        registry: Arc<AdapterRegistry>,
        transport: Arc<dyn MediationTransport>,
    ) -> Self {
        Self {
            config,
            registry,
            transport,
            events: None,
            state: Mutex::new(AdManagerState::Idle),
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<AdManagerEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &MediationConfig {
        &self.config
    }

    pub fn state(&self) -> AdManagerState {
        self.state.lock().clone()
    }

    /// Loaded demand, if any
    pub fn demand(&self) -> Option<Demand> {
        match &*self.state.lock() {
            AdManagerState::Ready(demand) => Some(demand.clone()),
            _ => None,
        }
    }

    /// Drops the loaded demand so the next ad can be loaded
    pub fn reset(&self) {
        self.set_state(AdManagerState::Idle);
    }

    /// Runs a full mediation attempt and returns the filled demand.
    ///
    /// Only an idle manager loads; otherwise the session in flight is left
    /// untouched and [`MediationError::InvalidState`] is returned.
    pub async fn load_ad(&self) -> crate::Result<Demand> {
        let ad_type = self.config.ad_type;
        {
            let mut state = self.state.lock();
            if !matches!(*state, AdManagerState::Idle) {
                warn!(
                    "{} ad manager is {}, loading attempt is ignored",
                    ad_type,
                    state.name()
                );
                return Err(MediationError::InvalidState(format!(
                    "ad manager is {}",
                    state.name()
                )));
            }
            *state = AdManagerState::Preparing;
        }

        let result = self.mediate().await;
        match &result {
            Ok(demand) => {
                info!("{} ad manager did load {}", ad_type, demand.ad());
                self.set_state(AdManagerState::Ready(demand.clone()));
                self.emit(AdManagerEvent::Loaded(demand.ad().clone()));
            }
            Err(e) => {
                warn!("{} ad manager failed to load ad: {}", ad_type, e);
                self.set_state(AdManagerState::Idle);
                self.emit(AdManagerEvent::FailedToLoad(e.clone()));
            }
        }
        result
    }

    async fn mediate(&self) -> crate::Result<Demand> {
        let ad_type = self.config.ad_type;
        let request = AuctionRequest {
            placement: self.config.placement.clone(),
            ad_type,
            auction_id: uuid::Uuid::new_v4().to_string(),
            adapters: self.registry.identifiers(),
            test: self.config.test_mode,
        };

        info!(
            "{} ad manager will request auction {} for placement '{}'",
            ad_type, request.auction_id, request.placement
        );
        let configuration = self.transport.fetch_auction(&request).await?;

        self.set_state(AdManagerState::Auction);
        let observer = Arc::new(BaseMediationObserver::new(
            configuration.auction_id.clone(),
            configuration.auction_configuration_id,
            ad_type,
        ));
        let (controller, mut events) = AuctionController::builder()
            .with_ad_type(ad_type)
            .with_configuration(&configuration)?
            .with_providers(self.registry.providers(ad_type))
            .with_observer(observer.clone())
            .build()?;
        controller.load();

        let outcome = self.auction_outcome(&mut events).await;
        let result = match outcome {
            Ok(waterfall) => {
                self.set_state(AdManagerState::Loading);
                WaterfallController::new(waterfall, observer.clone(), self.config.waterfall_timeout())
                    .load()
                    .await
            }
            Err(e) => Err(e),
        };

        self.send_statistics(observer.report()).await;
        result
    }

    /// Forwards controller events until the auction settles
    async fn auction_outcome(
        &self,
        events: &mut mpsc::UnboundedReceiver<ControllerEvent>,
    ) -> crate::Result<Waterfall> {
        while let Some(event) = events.recv().await {
            self.emit(AdManagerEvent::Controller(event.clone()));
            match event {
                ControllerEvent::AuctionCompleted { waterfall, .. } => return Ok(waterfall),
                ControllerEvent::AuctionFailed { error } => return Err(error),
                _ => {}
            }
        }
        Err(MediationError::InternalInconsistency)
    }

    async fn send_statistics(&self, stats: MediationAttemptReport) {
        let ad_type = self.config.ad_type;
        let request = StatisticsRequest { ad_type, stats };
        match self.transport.send_statistics(&request).await {
            Ok(()) => debug!("{} ad manager did send statistics", ad_type),
            Err(e) => warn!("{} ad manager failed to send statistics: {}", ad_type, e),
        }
    }

    fn set_state(&self, state: AdManagerState) {
        *self.state.lock() = state;
    }

    fn emit(&self, event: AdManagerEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
