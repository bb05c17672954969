use super::{LineItems, Price};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Auction plan returned by the mediation server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuctionConfiguration {
    /// Identifier of this auction
    pub auction_id: String,

    /// Identifier of the server side configuration that produced the plan
    pub auction_configuration_id: i64,

    /// Global price floor
    pub pricefloor: Price,

    /// Rounds in configuration order
    pub rounds: Vec<RoundConfiguration>,

    /// Explicit successor rounds; rounds run as a chain when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeds: Option<HashMap<String, Vec<String>>>,

    /// Direct demand line items
    #[serde(default)]
    pub line_items: LineItems,
}

/// Single round of the auction plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundConfiguration {
    /// Round identifier
    pub id: String,

    /// Round timeout in milliseconds, zero disables it
    #[serde(default)]
    pub timeout: u64,

    /// Networks invited to bid in this round
    pub demands: Vec<String>,
}

impl RoundConfiguration {
    /// Returns the round timeout, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_millis(self.timeout))
    }
}

impl AuctionConfiguration {
    /// Parses a configuration from its JSON representation
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| crate::MediationError::InvalidConfiguration(e.to_string()))
    }

    /// Returns every network referenced by any round, in first-seen order
    pub fn networks(&self) -> Vec<&str> {
        let mut networks: Vec<&str> = Vec::new();
        for round in &self.rounds {
            for demand in &round.demands {
                if !networks.contains(&demand.as_str()) {
                    networks.push(demand);
                }
            }
        }
        networks
    }
}
