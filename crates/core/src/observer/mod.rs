pub mod report;

pub use report::{
    AuctionResultReport, AuctionResultStatus, DemandReport, DemandReportStatus,
    MediationAttemptReport, RoundReport,
};

use crate::domain::bid::timestamp_ms;
use crate::domain::{AdType, Bid, LineItem, Price, UNKNOWN_PRICE};
use crate::MediationError;
use parking_lot::Mutex;
use std::fmt;
use tracing::trace;

/// Everything that happens during a mediation attempt, as seen by telemetry
#[derive(Debug, Clone)]
pub enum MediationEvent {
    AuctionStart,
    RoundStart {
        round: String,
        pricefloor: Price,
    },
    BidRequest {
        round: String,
        network: String,
        line_item: Option<LineItem>,
    },
    BidResponse {
        bid: Bid,
    },
    BidError {
        round: String,
        network: String,
        error: MediationError,
    },
    RoundFinish {
        round: String,
        winner: Option<Bid>,
    },
    AuctionFinish {
        winner: Option<Bid>,
    },
    FillRequest {
        bid: Bid,
    },
    FillResponse {
        bid: Bid,
    },
    FillError {
        bid: Bid,
        error: MediationError,
    },
}

impl fmt::Display for MediationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediationEvent::AuctionStart => write!(f, "auction start"),
            MediationEvent::RoundStart { round, pricefloor } => {
                write!(f, "round '{round}' start, pricefloor: {pricefloor}")
            }
            MediationEvent::BidRequest { round, network, .. } => {
                write!(f, "round '{round}' bid request to {network}")
            }
            MediationEvent::BidResponse { bid } => {
                write!(f, "round '{}' bid response: {}", bid.round_id, bid.ad)
            }
            MediationEvent::BidError { round, network, error } => {
                write!(f, "round '{round}' bid error from {network}: {error}")
            }
            MediationEvent::RoundFinish { round, winner } => match winner {
                Some(bid) => write!(f, "round '{round}' finish, winner: {}", bid.ad),
                None => write!(f, "round '{round}' finish without bids"),
            },
            MediationEvent::AuctionFinish { winner } => match winner {
                Some(bid) => write!(f, "auction finish, winner: {}", bid.ad),
                None => write!(f, "auction finish without bids"),
            },
            MediationEvent::FillRequest { bid } => write!(f, "fill request: {}", bid.ad),
            MediationEvent::FillResponse { bid } => write!(f, "fill response: {}", bid.ad),
            MediationEvent::FillError { bid, error } => {
                write!(f, "fill error: {}, {}", bid.ad, error)
            }
        }
    }
}

/// Telemetry sink of a mediation attempt. Never influences control flow.
pub trait MediationObserver: Send + Sync {
    fn log(&self, event: MediationEvent);

    /// Snapshot of everything observed so far
    fn report(&self) -> MediationAttemptReport;
}

#[derive(Debug, Clone)]
struct DemandObservation {
    network_id: String,
    line_item: Option<LineItem>,
    price: Option<Price>,
    status: DemandReportStatus,
    bid_start: Option<u64>,
    bid_finish: Option<u64>,
    fill_start: Option<u64>,
    fill_finish: Option<u64>,
}

impl DemandObservation {
    fn new(network_id: String, line_item: Option<LineItem>) -> Self {
        Self {
            network_id,
            line_item,
            price: None,
            status: DemandReportStatus::Unknown,
            bid_start: Some(timestamp_ms()),
            bid_finish: None,
            fill_start: None,
            fill_finish: None,
        }
    }

    fn report(&self) -> DemandReport {
        let line_item = self.line_item.as_ref();
        DemandReport {
            network_id: self.network_id.clone(),
            ad_unit_id: line_item.map(|item| item.ad_unit_id.clone()),
            ecpm: self
                .price
                .or_else(|| line_item.map(|item| item.pricefloor))
                .unwrap_or(UNKNOWN_PRICE),
            status: self.status,
            bid_start_ts: self.bid_start,
            bid_finish_ts: self.bid_finish,
            fill_start_ts: self.fill_start,
            fill_finish_ts: self.fill_finish,
        }
    }
}

#[derive(Debug, Clone)]
struct RoundObservation {
    id: String,
    pricefloor: Price,
    winner: Option<Bid>,
    demands: Vec<DemandObservation>,
}

#[derive(Debug, Default)]
struct Observations {
    rounds: Vec<RoundObservation>,
    winner: Option<Bid>,
    fired_line_items: Vec<LineItem>,
}

impl Observations {
    fn demand(&mut self, round: &str, network: &str) -> Option<&mut DemandObservation> {
        self.rounds
            .iter_mut()
            .rev()
            .find(|observation| observation.id == round)?
            .demands
            .iter_mut()
            .find(|demand| demand.network_id == network)
    }
}

/// Observer that records rounds and demands and builds the attempt report
pub struct BaseMediationObserver {
    auction_id: String,
    auction_configuration_id: i64,
    ad_type: AdType,
    observations: Mutex<Observations>,
}

impl BaseMediationObserver {
    pub fn new(auction_id: impl Into<String>, auction_configuration_id: i64, ad_type: AdType) -> Self {
        Self {
            auction_id: auction_id.into(),
            auction_configuration_id,
            ad_type,
            observations: Mutex::new(Observations::default()),
        }
    }

    pub fn auction_id(&self) -> &str {
        &self.auction_id
    }

    /// Line items sent to direct providers, in request order
    pub fn fired_line_items(&self) -> Vec<LineItem> {
        self.observations.lock().fired_line_items.clone()
    }

    fn record(observations: &mut Observations, event: MediationEvent) {
        match event {
            MediationEvent::AuctionStart | MediationEvent::AuctionFinish { .. } => {}
            MediationEvent::RoundStart { round, pricefloor } => {
                observations.rounds.push(RoundObservation {
                    id: round,
                    pricefloor,
                    winner: None,
                    demands: Vec::new(),
                });
            }
            MediationEvent::BidRequest {
                round,
                network,
                line_item,
            } => {
                let Some(observation) = observations
                    .rounds
                    .iter_mut()
                    .rev()
                    .find(|observation| observation.id == round)
                else {
                    return;
                };
                observation
                    .demands
                    .push(DemandObservation::new(network, line_item.clone()));
                if let Some(item) = line_item {
                    observations.fired_line_items.push(item);
                }
            }
            MediationEvent::BidResponse { bid } => {
                if let Some(demand) = observations.demand(&bid.round_id, &bid.network_id) {
                    demand.price = Some(bid.price());
                    demand.bid_start = Some(bid.requested_at);
                    demand.bid_finish = Some(bid.responded_at);
                }
            }
            MediationEvent::BidError {
                round,
                network,
                error,
            } => {
                if let Some(demand) = observations.demand(&round, &network) {
                    demand.status = DemandReportStatus::from(&error);
                    demand.bid_finish = Some(timestamp_ms());
                }
            }
            MediationEvent::RoundFinish { round, winner } => {
                if let Some(observation) = observations
                    .rounds
                    .iter_mut()
                    .rev()
                    .find(|observation| observation.id == round)
                {
                    observation.winner = winner;
                }
            }
            MediationEvent::FillRequest { bid } => {
                if let Some(demand) = observations.demand(&bid.round_id, &bid.network_id) {
                    demand.fill_start = Some(timestamp_ms());
                }
            }
            MediationEvent::FillResponse { bid } => {
                if let Some(demand) = observations.demand(&bid.round_id, &bid.network_id) {
                    demand.fill_finish = Some(timestamp_ms());
                    demand.status = DemandReportStatus::Win;
                } else {
                    return;
                }
                for round in observations.rounds.iter_mut() {
                    for demand in round.demands.iter_mut() {
                        if demand.status == DemandReportStatus::Unknown {
                            demand.status = DemandReportStatus::Lose;
                        }
                    }
                }
                observations.winner = Some(bid);
            }
            MediationEvent::FillError { bid, error } => {
                if let Some(demand) = observations.demand(&bid.round_id, &bid.network_id) {
                    demand.fill_finish = Some(timestamp_ms());
                    demand.status = DemandReportStatus::from(&error);
                }
            }
        }
    }
}

impl MediationObserver for BaseMediationObserver {
    fn log(&self, event: MediationEvent) {
        trace!("{} mediation: {}", self.ad_type, event);
        let mut observations = self.observations.lock();
        Self::record(&mut observations, event);
    }

    fn report(&self) -> MediationAttemptReport {
        let observations = self.observations.lock();

        let rounds = observations
            .rounds
            .iter()
            .map(|round| RoundReport {
                round_id: round.id.clone(),
                pricefloor: round.pricefloor,
                winner_ecpm: round.winner.as_ref().map(Bid::price),
                winner_network_id: round.winner.as_ref().map(|bid| bid.network_id.clone()),
                demands: round.demands.iter().map(DemandObservation::report).collect(),
            })
            .collect();

        let result = match &observations.winner {
            Some(bid) => AuctionResultReport {
                status: AuctionResultStatus::Success,
                winner_network_id: Some(bid.network_id.clone()),
                winner_ecpm: Some(bid.price()),
                winner_ad_unit_id: bid.ad_unit_id().map(str::to_string),
            },
            None => AuctionResultReport::default(),
        };

        MediationAttemptReport {
            auction_id: self.auction_id.clone(),
            auction_configuration_id: self.auction_configuration_id,
            rounds,
            result,
        }
    }
}

impl fmt::Debug for BaseMediationObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseMediationObserver")
            .field("auction_id", &self.auction_id)
            .field("auction_configuration_id", &self.auction_configuration_id)
            .field("ad_type", &self.ad_type)
            .finish()
    }
}
