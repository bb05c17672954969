use super::{AdRepository, AuctionGraph, AuctionRound};
use crate::domain::bid::timestamp_ms;
use crate::domain::{Ad, AdType, AuctionConfiguration, AuctionEvent, Bid, LineItem, LineItems, Price};
use crate::observer::{BaseMediationObserver, MediationEvent, MediationObserver};
use crate::provider::{Demand, DemandSource};
use crate::waterfall::Waterfall;
use crate::MediationError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Lifecycle of a single-use auction controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Running,
    Finished,
}

/// Progress of an auction, delivered in order through the controller's channel
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    AuctionStarted,
    RoundStarted { round: String, pricefloor: Price },
    BidReceived { ad: Ad, network: String },
    RoundCompleted { round: String },
    /// The auction found a winner; `waterfall` ranks every bid, winner first
    AuctionCompleted { winner: Bid, waterfall: Waterfall },
    /// The auction ended without any bid
    AuctionFailed { error: MediationError },
}

impl ControllerEvent {
    /// Whether no further events follow
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ControllerEvent::AuctionCompleted { .. } | ControllerEvent::AuctionFailed { .. }
        )
    }
}

/// Provider answer collected by a round
struct BidResponse {
    network: String,
    demand_position: usize,
    line_item: Option<LineItem>,
    requested_at: u64,
    result: crate::Result<Ad>,
}

/// State shared by the driver and every round task
struct AuctionState {
    phase: ControllerState,
    repository: AdRepository,
    /// Rounds in flight and their cancellation handles
    active: HashMap<String, CancellationToken>,
    sequence: u64,
}

struct ControllerInner {
    id: String,
    ad_type: AdType,
    auction: AuctionGraph,
    line_items: LineItems,
    pricefloor: Price,
    providers: HashMap<String, DemandSource>,
    observer: Arc<dyn MediationObserver>,
    events: mpsc::UnboundedSender<ControllerEvent>,
    state: Mutex<AuctionState>,
    cancellation: CancellationToken,
}

/// Runs the rounds of one auction concurrently and picks the winner.
///
/// Rounds start as soon as every round seeding them has completed. Each round
/// invites its networks in parallel with the best price received so far as the
/// floor, and completes once every provider answered or its timeout fired.
/// When no round is left the bids are ranked, providers are notified and the
/// outcome is sent through the event channel.
pub struct AuctionController {
    inner: Arc<ControllerInner>,
}

impl AuctionController {
    pub fn builder() -> AuctionControllerBuilder {
        AuctionControllerBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn ad_type(&self) -> AdType {
        self.inner.ad_type
    }

    pub fn auction(&self) -> &AuctionGraph {
        &self.inner.auction
    }

    pub fn pricefloor(&self) -> Price {
        self.inner.pricefloor
    }

    pub fn state(&self) -> ControllerState {
        self.inner.state.lock().phase
    }

    /// Starts the auction on the current Tokio runtime.
    ///
    /// A controller runs a single auction: calling `load` again while running
    /// or after completion is ignored.
    pub fn load(&self) {
        let inner = &self.inner;
        {
            let mut state = inner.state.lock();
            if state.phase != ControllerState::Idle {
                warn!(
                    "{} auction {} is {:?}, loading attempt is ignored",
                    inner.ad_type, inner.id, state.phase
                );
                return;
            }
            state.phase = ControllerState::Running;
            state.repository.clear();
            state.active.clear();
        }

        info!("{} auction will perform: {}", inner.ad_type, inner.auction);
        inner.observer.log(MediationEvent::AuctionStart);
        inner.emit(ControllerEvent::AuctionStarted);

        tokio::spawn(Arc::clone(inner).run());
    }

    /// Stops every running round and finishes with the bids received so far
    pub fn cancel(&self) {
        self.inner.cancellation.cancel();
    }
}

impl ControllerInner {
    fn emit(&self, event: ControllerEvent) {
        trace!("{} auction {} emits {:?}", self.ad_type, self.id, event);
        if self.events.send(event).is_err() {
            trace!("{} auction {} has no event receiver", self.ad_type, self.id);
        }
    }

    /// Drives the round graph: rounds are joined one completion at a time and
    /// unlocked seeds are spawned into the same set.
    async fn run(self: Arc<Self>) {
        let mut rounds = JoinSet::new();
        let mut waiting: HashMap<String, usize> = self
            .auction
            .rounds()
            .iter()
            .map(|round| (round.id().to_string(), self.auction.predecessors(round.id())))
            .collect();

        for round in self.auction.roots() {
            self.perform(round.clone(), &mut rounds);
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    warn!("{} auction {} has been cancelled", self.ad_type, self.id);
                    break;
                }
                joined = rounds.join_next() => joined,
            };

            let round_id = match joined {
                Some(Ok(round_id)) => round_id,
                Some(Err(e)) => {
                    warn!("{} auction {} lost a round task: {}", self.ad_type, self.id, e);
                    continue;
                }
                None => break,
            };

            let started = self.complete(&round_id, &mut waiting, &mut rounds);
            if started == 0 && self.has_no_active_rounds() {
                break;
            }
        }

        self.finish(rounds);
    }

    fn has_no_active_rounds(&self) -> bool {
        self.state.lock().active.is_empty()
    }

    fn perform(self: &Arc<Self>, round: AuctionRound, rounds: &mut JoinSet<String>) {
        let token = self.cancellation.child_token();
        let pricefloor = {
            let mut state = self.state.lock();
            state.active.insert(round.id().to_string(), token.clone());
            state.repository.best_price().unwrap_or(self.pricefloor)
        };

        info!("{} auction will perform {} with pricefloor {}", self.ad_type, round, pricefloor);
        self.observer.log(MediationEvent::RoundStart {
            round: round.id().to_string(),
            pricefloor,
        });
        self.emit(ControllerEvent::RoundStarted {
            round: round.id().to_string(),
            pricefloor,
        });

        let controller = Arc::clone(self);
        rounds.spawn(async move { controller.execute(round, pricefloor, token).await });
    }

    /// Fans out bid requests and collects answers until every provider
    /// answered, the round timeout fired or the round was cancelled.
    async fn execute(
        self: Arc<Self>,
        round: AuctionRound,
        pricefloor: Price,
        token: CancellationToken,
    ) -> String {
        let round_position = self.auction.position(round.id()).unwrap_or_default();
        let mut requests = JoinSet::new();
        let mut pending: HashMap<String, DemandSource> = HashMap::new();

        for (demand_position, network) in round.demands().iter().enumerate() {
            let Some(source) = self.providers.get(network).cloned() else {
                debug!(
                    "{} auction {} has no demand provider for {}",
                    self.ad_type,
                    round.id(),
                    network
                );
                self.observer.log(MediationEvent::BidError {
                    round: round.id().to_string(),
                    network: network.clone(),
                    error: MediationError::InvalidConfiguration(format!(
                        "no demand provider registered for {network}"
                    )),
                });
                continue;
            };

            if pending.contains_key(network) {
                debug!("{} auction {} invites {} twice", self.ad_type, round.id(), network);
                continue;
            }

            let line_item = if source.is_direct() {
                self.line_items.item(network, pricefloor).cloned()
            } else {
                None
            };

            self.observer.log(MediationEvent::BidRequest {
                round: round.id().to_string(),
                network: network.clone(),
                line_item: line_item.clone(),
            });
            pending.insert(network.clone(), source.clone());

            let network = network.clone();
            let requested_at = timestamp_ms();
            requests.spawn(async move {
                let result = source.bid(pricefloor, line_item.as_ref()).await;
                BidResponse {
                    network,
                    demand_position,
                    line_item,
                    requested_at,
                    result,
                }
            });
        }

        let deadline = round.timeout().map(|timeout| Instant::now() + timeout);
        let mut timed_out = false;

        loop {
            let joined = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = expiry(deadline) => {
                    timed_out = true;
                    break;
                }
                joined = requests.join_next() => joined,
            };

            match joined {
                Some(Ok(response)) => {
                    pending.remove(&response.network);
                    self.receive(&round, round_position, pricefloor, &token, response);
                }
                Some(Err(e)) => {
                    warn!("{} auction {} bid request failed: {}", self.ad_type, round.id(), e);
                }
                None => break,
            }
        }

        if timed_out {
            warn!("{} auction {} execution exceeded timeout.", self.ad_type, round);
            token.cancel();
        }

        let reason = if timed_out {
            MediationError::Timeout
        } else {
            MediationError::Cancelled
        };
        for (network, source) in pending.drain() {
            debug!("{} auction {} cancels {}", self.ad_type, round.id(), source);
            source.cancel();
            self.observer.log(MediationEvent::BidError {
                round: round.id().to_string(),
                network,
                error: reason.clone(),
            });
        }
        requests.abort_all();

        round.id().to_string()
    }

    fn receive(
        &self,
        round: &AuctionRound,
        round_position: usize,
        pricefloor: Price,
        token: &CancellationToken,
        response: BidResponse,
    ) {
        let BidResponse {
            network,
            demand_position,
            line_item,
            requested_at,
            result,
        } = response;

        let ad = match result {
            Ok(ad) => ad,
            Err(error) => {
                debug!(
                    "{} auction {} did receive error from {}: {}",
                    self.ad_type,
                    round.id(),
                    network,
                    error
                );
                self.observer.log(MediationEvent::BidError {
                    round: round.id().to_string(),
                    network,
                    error,
                });
                return;
            }
        };

        // NaN prices fail this comparison as well
        if !(ad.price > pricefloor) {
            debug!(
                "{} auction received bid: {} price is lower than pricefloor: {}",
                self.ad_type, ad, pricefloor
            );
            self.observer.log(MediationEvent::BidError {
                round: round.id().to_string(),
                network,
                error: MediationError::BelowPricefloor,
            });
            return;
        }

        let Some(source) = self.providers.get(&network).cloned() else {
            return;
        };

        let mut bid = Bid {
            ad,
            round_id: round.id().to_string(),
            network_id: network.clone(),
            round_position,
            demand_position,
            sequence: 0,
            line_item,
            requested_at,
            responded_at: timestamp_ms(),
        };

        let registered = {
            let mut state = self.state.lock();
            if token.is_cancelled() || !state.active.contains_key(round.id()) {
                None
            } else {
                state.sequence += 1;
                bid.sequence = state.sequence;
                Some(state.repository.register(Demand::new(bid.clone(), source)))
            }
        };

        match registered {
            None => {
                debug!(
                    "{} auction dropped late bid {} from {} in {}",
                    self.ad_type,
                    bid.ad,
                    network,
                    round.id()
                );
            }
            Some(stored) => {
                self.observer.log(MediationEvent::BidResponse { bid: bid.clone() });
                if stored {
                    info!("{} auction did receive bid: {} from {}", self.ad_type, bid.ad, network);
                    self.emit(ControllerEvent::BidReceived { ad: bid.ad, network });
                }
            }
        }
    }

    /// Closes a completed round and starts the seeds it unlocked.
    /// Returns the number of rounds started.
    fn complete(
        self: &Arc<Self>,
        round_id: &str,
        waiting: &mut HashMap<String, usize>,
        rounds: &mut JoinSet<String>,
    ) -> usize {
        let winner = {
            let mut state = self.state.lock();
            state.active.remove(round_id);
            state
                .repository
                .best_in_round(round_id)
                .map(|demand| demand.bid().clone())
        };

        info!("{} auction complete round: {}", self.ad_type, round_id);
        self.observer.log(MediationEvent::RoundFinish {
            round: round_id.to_string(),
            winner,
        });
        self.emit(ControllerEvent::RoundCompleted {
            round: round_id.to_string(),
        });

        let mut started = 0;
        for seed in self.auction.seeds(round_id) {
            let Some(remaining) = waiting.get_mut(seed.id()) else {
                continue;
            };
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.perform(seed.clone(), rounds);
                started += 1;
            }
        }
        started
    }

    /// Ranks the bids and notifies providers. The only place win and loss
    /// notifications are sent.
    fn finish(&self, mut rounds: JoinSet<String>) {
        let demands = {
            let mut state = self.state.lock();
            for (round, token) in state.active.drain() {
                debug!("{} auction cancels unfinished round '{}'", self.ad_type, round);
                token.cancel();
            }
            state.phase = ControllerState::Finished;
            std::mem::take(&mut state.repository).into_sorted()
        };
        // cancelled rounds still cancel their pending providers on their own
        rounds.detach_all();

        info!("{} auction did complete", self.ad_type);

        let waterfall = Waterfall::new(demands);
        match waterfall.winner().cloned() {
            Some(winner) => {
                for demand in waterfall.iter().skip(1) {
                    demand.source().notify(AuctionEvent::Lose(winner.ad().clone()));
                }
                winner.source().notify(AuctionEvent::Win(winner.ad().clone()));

                info!("{} auction did find winner: {}", self.ad_type, winner.ad());
                self.observer.log(MediationEvent::AuctionFinish {
                    winner: Some(winner.bid().clone()),
                });
                self.emit(ControllerEvent::AuctionCompleted {
                    winner: winner.bid().clone(),
                    waterfall,
                });
            }
            None => {
                info!("{} auction {} did not receive any bid", self.ad_type, self.id);
                self.observer.log(MediationEvent::AuctionFinish { winner: None });
                self.emit(ControllerEvent::AuctionFailed {
                    error: MediationError::InternalInconsistency,
                });
            }
        }
    }
}

async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Collects everything an [`AuctionController`] needs
#[derive(Default)]
pub struct AuctionControllerBuilder {
    auction_id: Option<String>,
    auction_configuration_id: i64,
    ad_type: AdType,
    auction: Option<AuctionGraph>,
    line_items: LineItems,
    pricefloor: Price,
    providers: HashMap<String, DemandSource>,
    observer: Option<Arc<dyn MediationObserver>>,
}

impl AuctionControllerBuilder {
    pub fn with_auction_id(mut self, auction_id: impl Into<String>) -> Self {
        self.auction_id = Some(auction_id.into());
        self
    }

    pub fn with_ad_type(mut self, ad_type: AdType) -> Self {
        self.ad_type = ad_type;
        self
    }

    pub fn with_auction(mut self, auction: AuctionGraph) -> Self {
        self.auction = Some(auction);
        self
    }

    pub fn with_line_items(mut self, line_items: LineItems) -> Self {
        self.line_items = line_items;
        self
    }

    pub fn with_pricefloor(mut self, pricefloor: Price) -> Self {
        self.pricefloor = pricefloor;
        self
    }

    pub fn with_providers(mut self, providers: HashMap<String, DemandSource>) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_provider(mut self, provider: DemandSource) -> Self {
        self.providers.insert(provider.network_id().to_string(), provider);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn MediationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Takes rounds, seeds, line items, floor and identifiers from a configuration
    pub fn with_configuration(mut self, configuration: &AuctionConfiguration) -> crate::Result<Self> {
        self.auction = Some(AuctionGraph::from_configuration(configuration)?);
        self.auction_id = Some(configuration.auction_id.clone());
        self.auction_configuration_id = configuration.auction_configuration_id;
        self.line_items = configuration.line_items.clone();
        self.pricefloor = configuration.pricefloor;
        Ok(self)
    }

    /// Creates the controller and the receiving end of its event channel
    pub fn build(
        self,
    ) -> crate::Result<(AuctionController, mpsc::UnboundedReceiver<ControllerEvent>)> {
        let auction = self.auction.ok_or_else(|| {
            MediationError::InvalidConfiguration("auction rounds were not provided".to_string())
        })?;
        let id = self
            .auction_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let observer: Arc<dyn MediationObserver> = match self.observer {
            Some(observer) => observer,
            None => Arc::new(BaseMediationObserver::new(
                id.clone(),
                self.auction_configuration_id,
                self.ad_type,
            )),
        };

        let (events, receiver) = mpsc::unbounded_channel();
        let inner = ControllerInner {
            id,
            ad_type: self.ad_type,
            auction,
            line_items: self.line_items,
            pricefloor: self.pricefloor,
            providers: self.providers,
            observer,
            events,
            state: Mutex::new(AuctionState {
                phase: ControllerState::Idle,
                repository: AdRepository::new(),
                active: HashMap::new(),
                sequence: 0,
            }),
            cancellation: CancellationToken::new(),
        };

        Ok((
            AuctionController {
                inner: Arc::new(inner),
            },
            receiver,
        ))
    }
}
