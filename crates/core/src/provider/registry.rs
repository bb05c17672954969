use super::{DemandProviderKind, DemandSource};
use crate::domain::AdType;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Integration of one ad network
pub trait DemandSourceAdapter: Send + Sync {
    /// Network identifier used by the auction configuration
    fn identifier(&self) -> &str;

    /// Creates a provider for a single auction of `ad_type`
    fn provider(&self, ad_type: AdType) -> crate::Result<DemandProviderKind>;
}

/// Registered network adapters, shared read-only by every auction
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn DemandSourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter, replacing any adapter with the same identifier
    pub fn register(&mut self, adapter: Arc<dyn DemandSourceAdapter>) {
        self.adapters
            .retain(|registered| registered.identifier() != adapter.identifier());
        self.adapters.push(adapter);
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.adapters
            .iter()
            .map(|adapter| adapter.identifier().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Creates one provider per adapter for an auction of `ad_type`.
    ///
    /// Adapters that cannot produce a provider are skipped.
    pub fn providers(&self, ad_type: AdType) -> HashMap<String, DemandSource> {
        let mut providers = HashMap::with_capacity(self.adapters.len());

        for adapter in &self.adapters {
            match adapter.provider(ad_type) {
                Ok(kind) => {
                    debug!(
                        "Created {} {} demand provider for {}",
                        kind.name(),
                        ad_type.as_str(),
                        adapter.identifier()
                    );
                    providers.insert(
                        adapter.identifier().to_string(),
                        DemandSource::new(adapter.identifier(), kind),
                    );
                }
                Err(e) => {
                    warn!(
                        "Unable to create {} demand provider for {}, error: {}",
                        ad_type.as_str(),
                        adapter.identifier(),
                        e
                    );
                }
            }
        }

        providers
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.identifiers())
            .finish()
    }
}
