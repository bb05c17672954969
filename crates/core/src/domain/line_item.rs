use super::Price;
use serde::{Deserialize, Serialize};

/// Direct-sold ad unit of a network with a fixed price floor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    /// Network identifier
    #[serde(rename = "id")]
    pub network_id: String,

    /// Network ad unit to request
    pub ad_unit_id: String,

    /// Price the line item is sold at
    pub pricefloor: Price,
}

impl LineItem {
    pub fn new(network_id: impl Into<String>, ad_unit_id: impl Into<String>, pricefloor: Price) -> Self {
        Self {
            network_id: network_id.into(),
            ad_unit_id: ad_unit_id.into(),
            pricefloor,
        }
    }
}

/// Line items of one auction, in configuration order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct LineItems(Vec<LineItem>);

impl LineItems {
    pub fn new(items: Vec<LineItem>) -> Self {
        Self(items)
    }

    /// Picks the cheapest line item of `network` that still beats `pricefloor`.
    ///
    /// A bid equal to the floor is rejected by the auction, so only floors
    /// strictly above `pricefloor` qualify. Equal floors keep configuration order.
    pub fn item(&self, network: &str, pricefloor: Price) -> Option<&LineItem> {
        self.0
            .iter()
            .filter(|item| item.network_id == network && item.pricefloor > pricefloor)
            .min_by(|a, b| a.pricefloor.total_cmp(&b.pricefloor))
    }

    /// Returns every line item configured for `network`
    pub fn for_network<'a>(&'a self, network: &'a str) -> impl Iterator<Item = &'a LineItem> + 'a {
        self.0.iter().filter(move |item| item.network_id == network)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineItem> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<LineItem>> for LineItems {
    fn from(items: Vec<LineItem>) -> Self {
        Self(items)
    }
}
