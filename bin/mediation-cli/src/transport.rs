use anyhow::{Context, Result};
use async_trait::async_trait;
use mediation_core::transport::{AuctionRequest, MediationTransport, StatisticsRequest};
use mediation_core::{AuctionConfiguration, MediationError};
use reqwest::{Client, ClientBuilder};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Serves a local auction configuration and prints reports to stdout
pub struct FileTransport {
    configuration: AuctionConfiguration,
    pretty: bool,
}

impl FileTransport {
    pub fn open(path: &Path, pretty: bool) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read auction {}", path.display()))?;
        let configuration = AuctionConfiguration::from_json(&json)
            .with_context(|| format!("failed to parse auction {}", path.display()))?;
        Ok(Self {
            configuration,
            pretty,
        })
    }
}

#[async_trait]
impl MediationTransport for FileTransport {
    async fn fetch_auction(&self, request: &AuctionRequest) -> mediation_core::Result<AuctionConfiguration> {
        debug!(
            "Serving local auction for {} placement '{}'",
            request.ad_type.as_str(),
            request.placement
        );
        let mut configuration = self.configuration.clone();
        configuration.auction_id = request.auction_id.clone();
        Ok(configuration)
    }

    async fn send_statistics(&self, request: &StatisticsRequest) -> mediation_core::Result<()> {
        let report = if self.pretty {
            serde_json::to_string_pretty(request)
        } else {
            serde_json::to_string(request)
        }
        .map_err(|e| MediationError::Generic(e.to_string()))?;

        println!("{report}");
        Ok(())
    }
}

/// Talks to a mediation server over HTTP
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, request: &str, ad_type: &str) -> String {
        format!("{}/{}/{}", self.endpoint, ad_type, request)
    }
}

fn transport_error(e: reqwest::Error) -> MediationError {
    MediationError::Transport(e.to_string())
}

#[async_trait]
impl MediationTransport for HttpTransport {
    async fn fetch_auction(&self, request: &AuctionRequest) -> mediation_core::Result<AuctionConfiguration> {
        let url = self.url("auction", request.ad_type.as_str());
        info!("Requesting auction from {}", url);

        self.client
            .post(&url)
            .json(request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(transport_error)?
            .json::<AuctionConfiguration>()
            .await
            .map_err(transport_error)
    }

    async fn send_statistics(&self, request: &StatisticsRequest) -> mediation_core::Result<()> {
        let url = self.url("stats", request.ad_type.as_str());
        debug!("Sending statistics to {}", url);

        self.client
            .post(&url)
            .json(request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(transport_error)?;
        Ok(())
    }
}
