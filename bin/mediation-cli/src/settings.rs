//! Sandbox settings.
//!
//! Settings are layered with the following precedence:
//! 1. `MEDIATION_*` environment variables (highest priority)
//! 2. The TOML file given with `--config`
//! 3. Default values (lowest priority)
//!
//! Nested keys are separated by a double underscore, so
//! `MEDIATION_MEDIATION__PLACEMENT=level_end` sets `mediation.placement`.

use crate::sandbox::SimulatedNetwork;
use crate::Cli;
use mediation_core::MediationConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Settings {
    /// Placement driven by the sandbox
    #[serde(default)]
    pub mediation: MediationConfig,

    /// Mediation server base URL, used when no local auction is given
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Demand networks simulated by the sandbox
    #[serde(default)]
    pub networks: Vec<SimulatedNetwork>,
}

impl Settings {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = &cli.config {
            if !path.exists() {
                return Err(anyhow::anyhow!(
                    "Settings file {} does not exist",
                    path.display()
                ));
            }
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MEDIATION")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut settings: Self = builder.build()?.try_deserialize()?;

        if let Some(ad_type) = cli.ad_type {
            settings.mediation.ad_type = ad_type;
        }
        if let Some(placement) = &cli.placement {
            settings.mediation.placement = placement.clone();
        }
        if let Some(endpoint) = &cli.endpoint {
            settings.endpoint = Some(endpoint.clone());
        }

        Ok(settings)
    }
}
