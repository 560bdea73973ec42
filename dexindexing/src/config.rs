use crate::events::TradeEventKind;
use crate::exchanges::Exchange;
use crate::networks::Network;
use crate::repos::Repo;
use crate::scanner::RetryPolicy;

#[derive(Clone, Debug, PartialEq, Eq, derive_more::Display)]
pub enum ConfigError {
    #[display("Window size must be at least one block")]
    ZeroWindowSize,
    #[display("Worker count must be at least one")]
    ZeroWorkerCount,
    #[display("At least one exchange is required")]
    NoExchanges,
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config<R: Repo> {
    pub repo: R,
    pub network: Network,
    pub exchanges: Vec<Exchange>,
    pub window_size: u64,
    /// Defaults to the size of the network's endpoint roster
    pub worker_count: Option<usize>,
    pub start_block_number: u64,
    pub ingestion_interval_ms: u64,
    pub trade_event: TradeEventKind,
    pub retry_policy: RetryPolicy,
    pub reset_schema: bool,
}

impl<R: Repo> Config<R> {
    pub fn new(repo: R, network: Network) -> Self {
        Self {
            repo,
            network,
            exchanges: network.exchanges().to_vec(),
            window_size: 5_000,
            worker_count: None,
            start_block_number: network.genesis_block_number(),
            ingestion_interval_ms: 3_000,
            trade_event: TradeEventKind::default(),
            retry_policy: RetryPolicy::default(),
            reset_schema: false,
        }
    }

    pub fn with_exchanges(mut self, exchanges: &[Exchange]) -> Self {
        self.exchanges = exchanges.to_vec();

        self
    }

    pub fn with_window_size(mut self, window_size: u64) -> Self {
        self.window_size = window_size;

        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = Some(worker_count);

        self
    }

    pub fn with_start_block_number(mut self, start_block_number: u64) -> Self {
        self.start_block_number = start_block_number;

        self
    }

    pub fn with_ingestion_interval_ms(mut self, ingestion_interval_ms: u64) -> Self {
        self.ingestion_interval_ms = ingestion_interval_ms;

        self
    }

    pub fn with_trade_event(mut self, trade_event: TradeEventKind) -> Self {
        self.trade_event = trade_event;

        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;

        self
    }

    /// Destroys every stored entity on startup. Meant for test bootstrapping.
    pub fn reset_schema(mut self) -> Self {
        self.reset_schema = true;

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            Err(ConfigError::ZeroWindowSize)
        } else if self.worker_count == Some(0) {
            Err(ConfigError::ZeroWorkerCount)
        } else if self.exchanges.is_empty() {
            Err(ConfigError::NoExchanges)
        } else {
            Ok(())
        }
    }
}
