use async_trait::async_trait;
use mediation_core::{
    Ad, AdType, AuctionEvent, DemandProvider, DemandProviderKind, DemandSourceAdapter,
    DirectDemandProvider, LineItem, MediationError, PlainDemandProvider, Price,
    ProgrammaticDemandProvider,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How a simulated network takes part in the auction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedKind {
    #[default]
    Programmatic,
    Direct,
    Plain,
}

/// Scripted behaviour of a demand network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulatedNetwork {
    pub id: String,

    #[serde(default)]
    pub kind: SimulatedKind,

    /// Price the network bids, no fill when absent. Direct networks bid
    /// their line item price instead.
    #[serde(default)]
    pub price: Option<Price>,

    #[serde(default)]
    pub latency_ms: u64,

    /// Whether the network delivers the creative after winning
    #[serde(default = "default_fills")]
    pub fills: bool,

    #[serde(default)]
    pub dsp: Option<String>,

    /// Supported ad types, every type when empty
    #[serde(default)]
    pub ad_types: Vec<AdType>,
}

fn default_fills() -> bool {
    true
}

impl SimulatedNetwork {
    fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

/// Adapter creating a [`SimulatedProvider`] per auction
pub struct SimulatedAdapter {
    network: SimulatedNetwork,
}

impl SimulatedAdapter {
    pub fn new(network: SimulatedNetwork) -> Self {
        Self { network }
    }
}

impl DemandSourceAdapter for SimulatedAdapter {
    fn identifier(&self) -> &str {
        &self.network.id
    }

    fn provider(&self, ad_type: AdType) -> mediation_core::Result<DemandProviderKind> {
        if !self.network.ad_types.is_empty() && !self.network.ad_types.contains(&ad_type) {
            return Err(MediationError::InvalidConfiguration(format!(
                "{} does not serve {} ads",
                self.network.id,
                ad_type.as_str()
            )));
        }

        let provider = Arc::new(SimulatedProvider {
            network: self.network.clone(),
            ad_type,
        });
        Ok(match self.network.kind {
            SimulatedKind::Programmatic => DemandProviderKind::Programmatic(provider),
            SimulatedKind::Direct => DemandProviderKind::Direct(provider),
            SimulatedKind::Plain => DemandProviderKind::Plain(provider),
        })
    }
}

pub struct SimulatedProvider {
    network: SimulatedNetwork,
    ad_type: AdType,
}

impl SimulatedProvider {
    fn ad(&self, id: &str, price: Price) -> Ad {
        let ad = Ad::new(id, self.network.id.clone(), price);
        match &self.network.dsp {
            Some(dsp) => ad.with_dsp(dsp.clone()),
            None => ad,
        }
    }

    async fn respond(&self, price: Option<Price>, id: &str) -> mediation_core::Result<Ad> {
        tokio::time::sleep(self.network.latency()).await;
        price
            .map(|price| self.ad(id, price))
            .ok_or(MediationError::NoFill)
    }
}

#[async_trait]
impl DemandProvider for SimulatedProvider {
    async fn fill(&self, ad: &Ad) -> mediation_core::Result<()> {
        tokio::time::sleep(self.network.latency()).await;
        if self.network.fills {
            debug!("{} filled {} ad {}", self.network.id, self.ad_type.as_str(), ad.id);
            Ok(())
        } else {
            Err(MediationError::NoFill)
        }
    }

    fn cancel(&self) {
        debug!("{} request was cancelled", self.network.id);
    }

    fn notify(&self, event: AuctionEvent) {
        match event {
            AuctionEvent::Win(ad) => info!("{} won with {}", self.network.id, ad),
            AuctionEvent::Lose(winner) => info!("{} lost to {}", self.network.id, winner),
        }
    }
}

#[async_trait]
impl ProgrammaticDemandProvider for SimulatedProvider {
    async fn bid(&self, pricefloor: Price) -> mediation_core::Result<Ad> {
        debug!("{} bids against pricefloor {}", self.network.id, pricefloor);
        self.respond(self.network.price, "bid").await
    }
}

#[async_trait]
impl DirectDemandProvider for SimulatedProvider {
    async fn bid(&self, line_item: &LineItem) -> mediation_core::Result<Ad> {
        let price = self.network.price.map(|_| line_item.pricefloor);
        self.respond(price, &line_item.ad_unit_id).await
    }
}

#[async_trait]
impl PlainDemandProvider for SimulatedProvider {
    async fn request(&self, pricefloor: Price) -> mediation_core::Result<Ad> {
        let price = self.network.price.filter(|price| *price > pricefloor);
        self.respond(price, "request").await
    }
}
