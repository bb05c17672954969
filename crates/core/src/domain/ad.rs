use serde::{Deserialize, Serialize};
use std::fmt;

/// eCPM in USD
pub type Price = f64;

/// ISO currency code of a bid
pub type Currency = String;

/// Currency used when a network does not report one
pub const DEFAULT_CURRENCY: &str = "USD";

/// Placeholder for a price that was never reported
pub const UNKNOWN_PRICE: Price = 0.0;

/// Checks whether a price carries no usable value
pub fn is_unknown(price: Price) -> bool {
    price.is_nan() || price == 0.0 || price.is_infinite()
}

/// Ad placement format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdType {
    Banner,
    #[default]
    Interstitial,
    Rewarded,
}

impl AdType {
    /// Returns the display name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            AdType::Banner => "Banner",
            AdType::Interstitial => "Interstitial",
            AdType::Rewarded => "Rewarded",
        }
    }

    /// Returns the identifier used in requests and routes
    pub fn as_str(&self) -> &'static str {
        match self {
            AdType::Banner => "banner",
            AdType::Interstitial => "interstitial",
            AdType::Rewarded => "rewarded",
        }
    }
}

impl fmt::Display for AdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for AdType {
    type Err = crate::MediationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "banner" => Ok(AdType::Banner),
            "interstitial" => Ok(AdType::Interstitial),
            "rewarded" => Ok(AdType::Rewarded),
            other => Err(crate::MediationError::InvalidConfiguration(format!(
                "unknown ad type: {other}"
            ))),
        }
    }
}

/// Priced ad object returned by a demand provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ad {
    /// Network specific ad identifier
    pub id: String,

    /// Revenue of a single impression
    pub price: Price,

    /// Currency of `price`
    pub currency: Currency,

    /// Name of the network that returned the ad
    pub network_name: String,

    /// Demand side platform behind the network, when known
    pub dsp: Option<String>,
}

impl Ad {
    /// Creates an ad priced in the default currency
    pub fn new(id: impl Into<String>, network_name: impl Into<String>, price: Price) -> Self {
        Self {
            id: id.into(),
            price,
            currency: DEFAULT_CURRENCY.to_string(),
            network_name: network_name.into(),
            dsp: None,
        }
    }

    pub fn with_dsp(mut self, dsp: impl Into<String>) -> Self {
        self.dsp = Some(dsp.into());
        self
    }
}

impl fmt::Display for Ad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ad #{}, network: {}, dsp: {}, revenue: {} {}",
            self.id,
            self.network_name,
            self.dsp.as_deref().unwrap_or("-"),
            self.price,
            self.currency
        )
    }
}

/// Auction outcome delivered to a provider that produced a bid
#[derive(Debug, Clone, PartialEq)]
pub enum AuctionEvent {
    /// The provider's ad won the auction
    Win(Ad),
    /// The provider's ad lost; carries the winning ad
    Lose(Ad),
}
