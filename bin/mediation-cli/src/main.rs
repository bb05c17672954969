mod sandbox;
mod settings;
mod transport;

use anyhow::{Context, Result};
use clap::Parser;
use mediation_core::{
    AdManager, AdManagerEvent, AdType, AdapterRegistry, ControllerEvent, MediationTransport,
};
use sandbox::SimulatedAdapter;
use settings::Settings;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use transport::{FileTransport, HttpTransport};

/// Runs one mediation attempt against simulated demand networks
#[derive(Parser, Debug)]
#[command(name = "mediation", version, about, long_about = None)]
pub struct Cli {
    /// Settings file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Local auction configuration (JSON) served instead of a mediation server
    #[arg(short, long)]
    pub auction: Option<PathBuf>,

    /// Mediation server base URL
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Ad type to load: banner, interstitial or rewarded
    #[arg(long)]
    pub ad_type: Option<AdType>,

    /// Placement name sent with the auction request
    #[arg(long)]
    pub placement: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Pretty-print the attempt report
    #[arg(long)]
    pub pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::load(&cli).context("failed to load settings")?;

    let mut registry = AdapterRegistry::new();
    for network in &settings.networks {
        registry.register(Arc::new(SimulatedAdapter::new(network.clone())));
    }
    info!("Registered {} simulated networks", registry.len());

    let transport: Arc<dyn MediationTransport> = match (&cli.auction, &settings.endpoint) {
        (Some(path), _) => Arc::new(FileTransport::open(path, cli.pretty)?),
        (None, Some(endpoint)) => Arc::new(HttpTransport::new(endpoint)?),
        (None, None) => anyhow::bail!("either --auction or --endpoint is required"),
    };

    let (sender, mut events) = mpsc::unbounded_channel();
    let manager = AdManager::new(settings.mediation, Arc::new(registry), transport)
        .with_events(sender);

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                AdManagerEvent::Controller(ControllerEvent::RoundStarted { round, pricefloor }) => {
                    info!("Round '{}' started with pricefloor {}", round, pricefloor)
                }
                AdManagerEvent::Controller(ControllerEvent::BidReceived { ad, network }) => {
                    info!("Bid from {}: {}", network, ad)
                }
                AdManagerEvent::Controller(ControllerEvent::RoundCompleted { round }) => {
                    info!("Round '{}' completed", round)
                }
                AdManagerEvent::Loaded(ad) => info!("Loaded {}", ad),
                AdManagerEvent::FailedToLoad(e) => warn!("Failed to load ad: {}", e),
                _ => {}
            }
        }
    });

    let result = manager.load_ad().await;
    drop(manager);
    let _ = printer.await;

    let demand = result.context("mediation attempt failed")?;
    info!(
        "Winner {} from round '{}'",
        demand.ad(),
        demand.bid().round_id
    );
    Ok(())
}
