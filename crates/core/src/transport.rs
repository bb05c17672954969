use crate::domain::{AdType, AuctionConfiguration};
use crate::observer::MediationAttemptReport;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Request for the auction plan of a placement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuctionRequest {
    pub placement: String,
    pub ad_type: AdType,
    pub auction_id: String,

    /// Identifiers of the adapters able to take part
    pub adapters: Vec<String>,

    pub test: bool,
}

/// Upload of a finished mediation attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatisticsRequest {
    pub ad_type: AdType,
    pub stats: MediationAttemptReport,
}

/// Connection to the mediation server
#[async_trait]
pub trait MediationTransport: Send + Sync {
    /// Fetches the auction plan for a request
    async fn fetch_auction(&self, request: &AuctionRequest) -> crate::Result<AuctionConfiguration>;

    /// Uploads the report of a mediation attempt
    async fn send_statistics(&self, request: &StatisticsRequest) -> crate::Result<()>;
}
