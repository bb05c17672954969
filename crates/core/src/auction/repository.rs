use crate::domain::{Bid, Price};
use crate::provider::Demand;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Auction ordering of bids.
///
/// Higher price first. Equal prices fall back to configuration order: the
/// earlier round, then the network listed first in that round, then the bid
/// accepted first.
pub fn compare(a: &Bid, b: &Bid) -> Ordering {
    b.ad.price
        .total_cmp(&a.ad.price)
        .then_with(|| a.round_position.cmp(&b.round_position))
        .then_with(|| a.demand_position.cmp(&b.demand_position))
        .then_with(|| a.sequence.cmp(&b.sequence))
}

/// Bids received during the current auction, one per network
#[derive(Debug, Default)]
pub struct AdRepository {
    demands: HashMap<String, Demand>,
}

impl AdRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.demands.clear();
    }

    /// Stores a demand for its network.
    ///
    /// A network holds a single bid; a later bid only replaces it when strictly
    /// more expensive. Returns whether the demand was stored.
    pub fn register(&mut self, demand: Demand) -> bool {
        let network = demand.network_id().to_string();

        if let Some(current) = self.demands.get(&network) {
            if demand.price() <= current.price() {
                debug!(
                    "Ignoring bid {} from {}: already holding {}",
                    demand.price(),
                    network,
                    current.price()
                );
                return false;
            }
        }

        self.demands.insert(network, demand);
        true
    }

    pub fn demand(&self, network: &str) -> Option<&Demand> {
        self.demands.get(network)
    }

    /// Demand ranked first by [`compare`]
    pub fn best(&self) -> Option<&Demand> {
        self.demands
            .values()
            .min_by(|a, b| compare(a.bid(), b.bid()))
    }

    /// Price of the best demand
    pub fn best_price(&self) -> Option<Price> {
        self.best().map(Demand::price)
    }

    /// Best demand among bids requested by `round_id`
    pub fn best_in_round(&self, round_id: &str) -> Option<&Demand> {
        self.demands
            .values()
            .filter(|demand| demand.bid().round_id == round_id)
            .min_by(|a, b| compare(a.bid(), b.bid()))
    }

    /// Every demand ranked by [`compare`]
    pub fn sorted(&self) -> Vec<Demand> {
        let mut demands: Vec<Demand> = self.demands.values().cloned().collect();
        demands.sort_by(|a, b| compare(a.bid(), b.bid()));
        demands
    }

    /// Consumes the repository into its ranked demands
    pub fn into_sorted(self) -> Vec<Demand> {
        let mut demands: Vec<Demand> = self.demands.into_values().collect();
        demands.sort_by(|a, b| compare(a.bid(), b.bid()));
        demands
    }

    pub fn len(&self) -> usize {
        self.demands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.demands.is_empty()
    }
}
