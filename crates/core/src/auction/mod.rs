pub mod controller;
pub mod graph;
pub mod repository;
pub mod round;

pub use controller::{AuctionController, AuctionControllerBuilder, ControllerEvent, ControllerState};
pub use graph::AuctionGraph;
pub use repository::{compare, AdRepository};
pub use round::AuctionRound;
