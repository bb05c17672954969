#![allow(dead_code)]

use async_trait::async_trait;
use mediation_core::{
    Ad, AuctionController, AuctionEvent, AuctionRound, ControllerEvent, DemandProvider,
    DemandSource, DirectDemandProvider, LineItem, MediationError, Price,
    ProgrammaticDemandProvider,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Demand provider answering with a scripted price after a scripted latency
pub struct MockProvider {
    network: String,
    price: Option<Price>,
    latency: Duration,
    fills: bool,
    cancels: AtomicUsize,
    notifications: Mutex<Vec<AuctionEvent>>,
    floors: Mutex<Vec<Price>>,
    line_items: Mutex<Vec<LineItem>>,
}

impl MockProvider {
    pub fn bidding(network: &str, price: Price) -> Self {
        Self {
            network: network.to_string(),
            price: Some(price),
            latency: Duration::from_millis(10),
            fills: true,
            cancels: AtomicUsize::new(0),
            notifications: Mutex::new(Vec::new()),
            floors: Mutex::new(Vec::new()),
            line_items: Mutex::new(Vec::new()),
        }
    }

    pub fn no_fill(network: &str) -> Self {
        Self {
            price: None,
            ..Self::bidding(network, 0.0)
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing_fill(mut self) -> Self {
        self.fills = false;
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn programmatic(self: &Arc<Self>) -> DemandSource {
        DemandSource::programmatic(self.network.clone(), self.clone())
    }

    pub fn direct(self: &Arc<Self>) -> DemandSource {
        DemandSource::direct(self.network.clone(), self.clone())
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn notifications(&self) -> Vec<AuctionEvent> {
        self.notifications.lock().clone()
    }

    /// Price floors this provider was asked to beat
    pub fn floors(&self) -> Vec<Price> {
        self.floors.lock().clone()
    }

    pub fn line_items(&self) -> Vec<LineItem> {
        self.line_items.lock().clone()
    }

    async fn answer(&self, price: Option<Price>) -> mediation_core::Result<Ad> {
        tokio::time::sleep(self.latency).await;
        match price {
            Some(price) => Ok(Ad::new(format!("{}-ad", self.network), self.network.clone(), price)),
            None => Err(MediationError::NoFill),
        }
    }
}

#[async_trait]
impl DemandProvider for MockProvider {
    async fn fill(&self, _ad: &Ad) -> mediation_core::Result<()> {
        tokio::time::sleep(self.latency).await;
        if self.fills {
            Ok(())
        } else {
            Err(MediationError::NoFill)
        }
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn notify(&self, event: AuctionEvent) {
        self.notifications.lock().push(event);
    }
}

#[async_trait]
impl ProgrammaticDemandProvider for MockProvider {
    async fn bid(&self, pricefloor: Price) -> mediation_core::Result<Ad> {
        self.floors.lock().push(pricefloor);
        self.answer(self.price).await
    }
}

#[async_trait]
impl DirectDemandProvider for MockProvider {
    async fn bid(&self, line_item: &LineItem) -> mediation_core::Result<Ad> {
        self.line_items.lock().push(line_item.clone());
        let price = self.price.map(|_| line_item.pricefloor);
        self.answer(price).await
    }
}

pub fn round(id: &str, timeout_ms: u64, demands: &[&str]) -> AuctionRound {
    AuctionRound::new(
        id,
        Some(Duration::from_millis(timeout_ms)),
        demands.iter().map(|demand| demand.to_string()).collect(),
    )
}

/// Receives events up to and including the auction outcome
pub async fn drain(events: &mut UnboundedReceiver<ControllerEvent>) -> Vec<ControllerEvent> {
    let mut received = Vec::new();
    while let Some(event) = events.recv().await {
        let terminal = event.is_terminal();
        received.push(event);
        if terminal {
            break;
        }
    }
    received
}

pub async fn run(
    controller: &AuctionController,
    events: &mut UnboundedReceiver<ControllerEvent>,
) -> Vec<ControllerEvent> {
    controller.load();
    drain(events).await
}

pub fn round_floor(events: &[ControllerEvent], id: &str) -> Option<Price> {
    events.iter().find_map(|event| match event {
        ControllerEvent::RoundStarted { round, pricefloor } if round == id => Some(*pricefloor),
        _ => None,
    })
}
