pub mod domain;
pub mod provider;
pub mod auction;
pub mod waterfall;
pub mod observer;
pub mod transport;
pub mod manager;

pub use auction::{AuctionController, AuctionControllerBuilder, AuctionGraph, AuctionRound, ControllerEvent, ControllerState};
pub use domain::{Ad, AdType, AuctionConfiguration, AuctionEvent, Bid, LineItem, LineItems, Price, RoundConfiguration};
pub use manager::{AdManager, AdManagerEvent, AdManagerState, MediationConfig};
pub use observer::{BaseMediationObserver, MediationAttemptReport, MediationEvent, MediationObserver};
pub use provider::{
    AdapterRegistry, Demand, DemandProvider, DemandProviderKind, DemandSource, DemandSourceAdapter,
    DirectDemandProvider, PlainDemandProvider, ProgrammaticDemandProvider,
};
pub use transport::{AuctionRequest, MediationTransport, StatisticsRequest};
pub use waterfall::{Waterfall, WaterfallController, WaterfallState};

/// Core result type for mediation operations
pub type Result<T> = std::result::Result<T, MediationError>;

/// Core error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MediationError {
    #[error("{0}")]
    Generic(String),

    #[error("{0}")]
    Message(String),

    #[error("Unknown")]
    Unknown,

    #[error("No fill")]
    NoFill,

    #[error("Request has been cancelled")]
    Cancelled,

    #[error("Request has timed out")]
    Timeout,

    #[error("Inconsistent state")]
    InternalInconsistency,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Line item was not found for network {network} and pricefloor {pricefloor}")]
    LineItemNotFound { network: String, pricefloor: Price },

    #[error("Bid price is not above the pricefloor")]
    BelowPricefloor,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
