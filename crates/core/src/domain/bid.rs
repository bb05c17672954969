use super::{Ad, LineItem, Price};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the unix epoch
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Bid accepted from a demand provider during one auction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bid {
    /// Ad returned by the provider
    pub ad: Ad,

    /// Round that requested the bid
    pub round_id: String,

    /// Network that produced the bid
    pub network_id: String,

    /// Position of the round in the auction configuration
    pub round_position: usize,

    /// Position of the network inside its round
    pub demand_position: usize,

    /// Order in which the controller accepted the bid
    pub sequence: u64,

    /// Line item the bid was made for (direct demand only)
    pub line_item: Option<LineItem>,

    /// When the bid was requested
    pub requested_at: u64,

    /// When the provider answered
    pub responded_at: u64,
}

impl Bid {
    pub fn price(&self) -> Price {
        self.ad.price
    }

    /// Ad unit the bid is served from, when known
    pub fn ad_unit_id(&self) -> Option<&str> {
        self.line_item.as_ref().map(|item| item.ad_unit_id.as_str())
    }
}
