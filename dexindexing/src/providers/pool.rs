use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{HttpProvider, Provider};
use crate::networks::Network;

/// Each endpoint of a roster gets this many tries before acquisition gives up
pub const MAX_ATTEMPTS_PER_ENDPOINT: usize = 5;

/// Identity of a scanning worker. Bindings to endpoints are kept per worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
#[display("worker-{_0}")]
pub struct WorkerId(pub usize);

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ProviderPoolError {
    #[display("No provider available on {network:?} after {attempts} attempts")]
    NoProviderAvailable { network: Network, attempts: usize },
    #[display("Invalid JSON-RPC url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

pub struct Endpoint<P> {
    pub url: String,
    pub provider: Arc<P>,
}

impl<P> Endpoint<P> {
    pub fn new(url: &str, provider: P) -> Self {
        Self {
            url: url.to_string(),
            provider: Arc::new(provider),
        }
    }
}

/// Usage counters and worker bindings of one roster
#[derive(Debug, Default)]
struct RosterState {
    usages: Vec<u64>,
    bindings: HashMap<WorkerId, usize>,
}

impl RosterState {
    fn new(size: usize) -> Self {
        Self {
            usages: vec![0; size],
            bindings: HashMap::new(),
        }
    }

    /// Least used endpoint, ties broken by roster priority (position)
    fn least_used(&self) -> Option<usize> {
        (0..self.usages.len()).min_by_key(|index| (self.usages[*index], *index))
    }
}

/// Fixed rosters of JSON-RPC endpoints, one per network.
///
/// A worker keeps the endpoint it was first given until that endpoint fails.
/// Counters are only touched under `state`'s lock; health checks run outside it.
pub struct ProviderPool<P> {
    rosters: HashMap<Network, Vec<Endpoint<P>>>,
    state: Mutex<HashMap<Network, RosterState>>,
}

impl<P: Provider> Default for ProviderPool<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Provider> ProviderPool<P> {
    pub fn new() -> Self {
        Self {
            rosters: HashMap::new(),
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Endpoints are ranked in the given order, best first
    pub fn with_endpoints(mut self, network: Network, endpoints: Vec<Endpoint<P>>) -> Self {
        self.state.get_mut().insert(network, RosterState::new(endpoints.len()));
        self.rosters.insert(network, endpoints);

        self
    }

    pub fn roster_size(&self, network: Network) -> usize {
        self.rosters.get(&network).map(Vec::len).unwrap_or(0)
    }

    pub async fn acquire(
        &self,
        worker: WorkerId,
        network: Network,
    ) -> Result<Arc<P>, ProviderPoolError> {
        let roster = self.rosters.get(&network).map(Vec::as_slice).unwrap_or_default();
        let max_attempts = MAX_ATTEMPTS_PER_ENDPOINT * roster.len();

        for attempt in 0..max_attempts {
            let index = {
                let mut state = self.state.lock().await;
                let roster_state = state
                    .entry(network)
                    .or_insert_with(|| RosterState::new(roster.len()));

                if let Some(index) = roster_state.bindings.get(&worker) {
                    return Ok(roster[*index].provider.clone());
                }

                let Some(index) = roster_state.least_used() else {
                    break;
                };
                roster_state.usages[index] += 1;

                index
            };

            let endpoint = &roster[index];
            if endpoint.provider.is_healthy().await {
                let mut state = self.state.lock().await;
                if let Some(roster_state) = state.get_mut(&network) {
                    roster_state.bindings.insert(worker, index);
                }
                debug!(%worker, url = %endpoint.url, "Bound JSON-RPC endpoint");

                return Ok(endpoint.provider.clone());
            }

            warn!(%worker, url = %endpoint.url, attempt, "Skipping unhealthy JSON-RPC endpoint");
            self.penalize(network, index).await;
        }

        Err(ProviderPoolError::NoProviderAvailable {
            network,
            attempts: max_attempts,
        })
    }

    /// Unbinds the worker from its endpoint and sinks that endpoint's priority.
    /// The next `acquire` picks the best endpoint again.
    pub async fn report_failure(&self, worker: WorkerId, network: Network) {
        let mut state = self.state.lock().await;

        if let Some(roster_state) = state.get_mut(&network) {
            if let Some(index) = roster_state.bindings.remove(&worker) {
                roster_state.usages[index] += 1;
            }
        }
    }

    pub async fn usages(&self, network: Network) -> Vec<u64> {
        let state = self.state.lock().await;

        state.get(&network).map(|roster_state| roster_state.usages.clone()).unwrap_or_default()
    }

    async fn penalize(&self, network: Network, index: usize) {
        let mut state = self.state.lock().await;

        if let Some(roster_state) = state.get_mut(&network) {
            roster_state.usages[index] += 1;
        }
    }
}

impl ProviderPool<HttpProvider> {
    /// Pool over the default public rosters of the given networks
    pub fn connect(networks: &[Network]) -> Result<Self, ProviderPoolError> {
        networks.iter().try_fold(Self::new(), |pool, network| {
            pool.with_urls(*network, network.json_rpc_urls())
        })
    }

    pub fn with_urls(self, network: Network, urls: &[&str]) -> Result<Self, ProviderPoolError> {
        let endpoints = urls
            .iter()
            .map(|url| {
                HttpProvider::try_from(*url)
                    .map(|provider| Endpoint::new(url, provider))
                    .map_err(|error| ProviderPoolError::InvalidUrl {
                        url: url.to_string(),
                        reason: error.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.with_endpoints(network, endpoints))
    }
}
