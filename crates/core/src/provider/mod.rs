pub mod registry;

pub use registry::{AdapterRegistry, DemandSourceAdapter};

use crate::domain::{Ad, AuctionEvent, Bid, LineItem, Price};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Capability shared by every demand provider
#[async_trait]
pub trait DemandProvider: Send + Sync {
    /// Loads the creative for an ad this provider has already bid with
    async fn fill(&self, ad: &Ad) -> crate::Result<()>;

    /// Cancels the request in flight. Best effort, may be called more than once.
    fn cancel(&self) {}

    /// Reports the auction outcome. Called at most once per auction.
    fn notify(&self, event: AuctionEvent) {
        let _ = event;
    }
}

/// Provider that answers a plain ad request constrained by a price floor
#[async_trait]
pub trait PlainDemandProvider: DemandProvider {
    async fn request(&self, pricefloor: Price) -> crate::Result<Ad>;
}

/// Provider that takes part in real-time bidding
#[async_trait]
pub trait ProgrammaticDemandProvider: DemandProvider {
    async fn bid(&self, pricefloor: Price) -> crate::Result<Ad>;
}

/// Provider that serves direct-sold line items
#[async_trait]
pub trait DirectDemandProvider: DemandProvider {
    async fn bid(&self, line_item: &LineItem) -> crate::Result<Ad>;
}

/// Bidding strategy of a provider, resolved once at registration
#[derive(Clone)]
pub enum DemandProviderKind {
    Direct(Arc<dyn DirectDemandProvider>),
    Programmatic(Arc<dyn ProgrammaticDemandProvider>),
    Plain(Arc<dyn PlainDemandProvider>),
}

impl DemandProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            DemandProviderKind::Direct(_) => "direct",
            DemandProviderKind::Programmatic(_) => "programmatic",
            DemandProviderKind::Plain(_) => "plain",
        }
    }
}

/// Demand provider bound to the network it bids for
#[derive(Clone)]
pub struct DemandSource {
    network_id: String,
    provider: DemandProviderKind,
}

impl DemandSource {
    pub fn new(network_id: impl Into<String>, provider: DemandProviderKind) -> Self {
        Self {
            network_id: network_id.into(),
            provider,
        }
    }

    pub fn direct(network_id: impl Into<String>, provider: Arc<dyn DirectDemandProvider>) -> Self {
        Self::new(network_id, DemandProviderKind::Direct(provider))
    }

    pub fn programmatic(
        network_id: impl Into<String>,
        provider: Arc<dyn ProgrammaticDemandProvider>,
    ) -> Self {
        Self::new(network_id, DemandProviderKind::Programmatic(provider))
    }

    pub fn plain(network_id: impl Into<String>, provider: Arc<dyn PlainDemandProvider>) -> Self {
        Self::new(network_id, DemandProviderKind::Plain(provider))
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn kind(&self) -> &DemandProviderKind {
        &self.provider
    }

    /// Whether the provider bids on line items instead of price floors
    pub fn is_direct(&self) -> bool {
        matches!(self.provider, DemandProviderKind::Direct(_))
    }

    /// Requests a bid using the provider's strategy.
    ///
    /// Direct providers need the line item selected for the current floor and
    /// fail with [`crate::MediationError::LineItemNotFound`] without one.
    pub async fn bid(&self, pricefloor: Price, line_item: Option<&LineItem>) -> crate::Result<Ad> {
        match &self.provider {
            DemandProviderKind::Direct(provider) => match line_item {
                Some(item) => provider.bid(item).await,
                None => Err(crate::MediationError::LineItemNotFound {
                    network: self.network_id.clone(),
                    pricefloor,
                }),
            },
            DemandProviderKind::Programmatic(provider) => provider.bid(pricefloor).await,
            DemandProviderKind::Plain(provider) => provider.request(pricefloor).await,
        }
    }

    pub async fn fill(&self, ad: &Ad) -> crate::Result<()> {
        match &self.provider {
            DemandProviderKind::Direct(provider) => provider.fill(ad).await,
            DemandProviderKind::Programmatic(provider) => provider.fill(ad).await,
            DemandProviderKind::Plain(provider) => provider.fill(ad).await,
        }
    }

    pub fn cancel(&self) {
        match &self.provider {
            DemandProviderKind::Direct(provider) => provider.cancel(),
            DemandProviderKind::Programmatic(provider) => provider.cancel(),
            DemandProviderKind::Plain(provider) => provider.cancel(),
        }
    }

    pub fn notify(&self, event: AuctionEvent) {
        match &self.provider {
            DemandProviderKind::Direct(provider) => provider.notify(event),
            DemandProviderKind::Programmatic(provider) => provider.notify(event),
            DemandProviderKind::Plain(provider) => provider.notify(event),
        }
    }
}

impl fmt::Debug for DemandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemandSource")
            .field("network_id", &self.network_id)
            .field("kind", &self.provider.name())
            .finish()
    }
}

impl fmt::Display for DemandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.network_id, self.provider.name())
    }
}

/// Accepted bid together with the provider that can fill it
#[derive(Debug, Clone)]
pub struct Demand {
    bid: Bid,
    source: DemandSource,
}

impl Demand {
    pub fn new(bid: Bid, source: DemandSource) -> Self {
        Self { bid, source }
    }

    pub fn bid(&self) -> &Bid {
        &self.bid
    }

    pub fn ad(&self) -> &Ad {
        &self.bid.ad
    }

    pub fn price(&self) -> Price {
        self.bid.ad.price
    }

    pub fn source(&self) -> &DemandSource {
        &self.source
    }

    pub fn network_id(&self) -> &str {
        self.source.network_id()
    }
}
