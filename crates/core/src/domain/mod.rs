pub mod ad;
pub mod bid;
pub mod line_item;
pub mod configuration;

pub use ad::{is_unknown, Ad, AdType, AuctionEvent, Currency, Price, DEFAULT_CURRENCY, UNKNOWN_PRICE};
pub use bid::Bid;
pub use line_item::{LineItem, LineItems};
pub use configuration::{AuctionConfiguration, RoundConfiguration};
