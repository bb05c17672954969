use crate::domain::Price;
use crate::MediationError;
use serde::{Deserialize, Serialize};

/// Outcome of a single demand in the report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DemandReportStatus {
    #[default]
    Unknown,
    Win,
    Lose,
    NoFill,
    Cancelled,
    Timeout,
    BelowPricefloor,
    InvalidConfiguration,
    Error,
}

impl From<&MediationError> for DemandReportStatus {
    fn from(error: &MediationError) -> Self {
        match error {
            MediationError::NoFill | MediationError::LineItemNotFound { .. } => {
                DemandReportStatus::NoFill
            }
            MediationError::Cancelled => DemandReportStatus::Cancelled,
            MediationError::Timeout => DemandReportStatus::Timeout,
            MediationError::BelowPricefloor => DemandReportStatus::BelowPricefloor,
            MediationError::InvalidConfiguration(_) => DemandReportStatus::InvalidConfiguration,
            _ => DemandReportStatus::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuctionResultStatus {
    Success,
    #[default]
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DemandReport {
    pub network_id: String,
    pub ad_unit_id: Option<String>,
    pub ecpm: Price,
    pub status: DemandReportStatus,
    pub bid_start_ts: Option<u64>,
    pub bid_finish_ts: Option<u64>,
    pub fill_start_ts: Option<u64>,
    pub fill_finish_ts: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RoundReport {
    pub round_id: String,
    pub pricefloor: Price,
    pub winner_ecpm: Option<Price>,
    pub winner_network_id: Option<String>,
    pub demands: Vec<DemandReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AuctionResultReport {
    pub status: AuctionResultStatus,
    pub winner_network_id: Option<String>,
    pub winner_ecpm: Option<Price>,
    pub winner_ad_unit_id: Option<String>,
}

/// Telemetry of one mediation attempt, uploaded once the ad is loaded or failed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MediationAttemptReport {
    pub auction_id: String,
    pub auction_configuration_id: i64,
    pub rounds: Vec<RoundReport>,
    pub result: AuctionResultReport,
}

impl MediationAttemptReport {
    /// Looks up the report of `network` in `round_id`
    pub fn demand(&self, round_id: &str, network: &str) -> Option<&DemandReport> {
        self.rounds
            .iter()
            .filter(|round| round.round_id == round_id)
            .flat_map(|round| round.demands.iter())
            .find(|demand| demand.network_id == network)
    }
}
