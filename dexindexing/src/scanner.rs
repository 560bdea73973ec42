mod retries;
mod window;

use std::future::Future;
use std::sync::Arc;

use ethers::types::{Address, Filter as EthersFilter, H256};
use tracing::{debug, error, warn};

pub use retries::{RetryAction, RetryPolicy, ScanRetries, Severity};
pub use window::{BlockWindow, WINDOW_LOWER_BOUND_TOLERANCE};

use crate::contracts::PAIR_CREATED_EVENT;
use crate::entities::{Trade, TradingPair};
use crate::events::{PairCreatedEvent, TradeEventKind};
use crate::exchanges::Exchange;
use crate::networks::Network;
use crate::persistence::{PersistenceError, PersistenceQueue};
use crate::providers::{Provider, ProviderPool, ProviderPoolError, WorkerId};
use crate::repos::RepoSession;
use crate::resolver::{EntityResolver, ResolverError};

/// Failures that end a worker's unit of work. Chain read errors never show
/// up here: they are retried.
#[derive(Debug, derive_more::Display)]
pub enum ScanError {
    #[display("{_0}")]
    NoProvider(ProviderPoolError),
    #[display("{_0}")]
    Persistence(PersistenceError),
    #[display("Scan worker aborted: {_0}")]
    WorkerAborted(String),
}

impl std::error::Error for ScanError {}

pub struct RangeScanner<P, S> {
    network: Network,
    pool: Arc<ProviderPool<P>>,
    resolver: Arc<EntityResolver<S>>,
    queue: Arc<PersistenceQueue<S>>,
    retry_policy: RetryPolicy,
    trade_event: TradeEventKind,
}

impl<P: Provider + 'static, S: RepoSession> RangeScanner<P, S> {
    pub fn new(
        network: Network,
        pool: Arc<ProviderPool<P>>,
        resolver: Arc<EntityResolver<S>>,
        queue: Arc<PersistenceQueue<S>>,
    ) -> Self {
        Self {
            network,
            pool,
            resolver,
            queue,
            retry_policy: RetryPolicy::default(),
            trade_event: TradeEventKind::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;

        self
    }

    pub fn with_trade_event(mut self, trade_event: TradeEventKind) -> Self {
        self.trade_event = trade_event;

        self
    }

    pub async fn chain_head(&self, worker: WorkerId) -> Result<u64, ScanError> {
        self.with_retries(worker, "chain head", |provider| async move {
            Ok(provider.get_block_number().await?.as_u64())
        })
        .await
    }

    /// Pairs created in the window that trade against the base currency.
    /// Nothing is persisted here.
    pub async fn scan_new_pairs(
        &self,
        worker: WorkerId,
        exchanges: &[Exchange],
        window: BlockWindow,
    ) -> Result<Vec<TradingPair>, ScanError> {
        let mut pairs = vec![];

        for exchange in exchanges {
            let found = self
                .with_retries(worker, exchange.name, move |provider| {
                    self.fetch_pairs(provider, exchange, window)
                })
                .await?;

            pairs.extend(found);
        }

        Ok(pairs)
    }

    /// Resolves the pair's trades in the window and enqueues them.
    /// Returns how many were enqueued.
    pub async fn scan_trades(
        &self,
        worker: WorkerId,
        pair: &Arc<TradingPair>,
        window: BlockWindow,
    ) -> Result<usize, ScanError> {
        let trades = self
            .with_retries(worker, pair.token.symbol.as_str(), move |provider| {
                self.fetch_trades(provider, pair, window)
            })
            .await?;
        let count = trades.len();

        for trade in trades {
            self.queue.enqueue(trade).map_err(ScanError::Persistence)?;
        }

        Ok(count)
    }

    async fn fetch_pairs(
        &self,
        provider: Arc<P>,
        exchange: &Exchange,
        window: BlockWindow,
    ) -> Result<Vec<TradingPair>, ResolverError> {
        let filter = log_filter(exchange.factory(), PAIR_CREATED_EVENT.topic(), window);
        let logs = provider.get_logs(&filter).await?;

        let mut pairs = vec![];
        for log in &logs {
            match PairCreatedEvent::decode(log) {
                Ok(event) => {
                    match self.resolver.get_trading_pair(provider.as_ref(), exchange, &event).await
                    {
                        Ok(pair) => pairs.extend(pair),
                        Err(error) if error.is_deterministic() => {
                            warn!(exchange = exchange.name, %error, "Skipping unresolvable pair")
                        }
                        Err(error) => return Err(error),
                    }
                }
                Err(error) => {
                    warn!(exchange = exchange.name, %error, "Skipping undecodable PairCreated log")
                }
            }
        }

        Ok(pairs)
    }

    async fn fetch_trades(
        &self,
        provider: Arc<P>,
        pair: &Arc<TradingPair>,
        window: BlockWindow,
    ) -> Result<Vec<Trade>, ResolverError> {
        let filter = log_filter(pair.address, self.trade_event.contract_event().topic(), window);
        let logs = provider.get_logs(&filter).await?;
        let (events, errors) = self.trade_event.decode_all(&logs);

        for error in errors {
            warn!(pair = ?pair.address, %error, "Skipping undecodable trade log");
        }

        let mut trades = Vec::with_capacity(events.len());
        for event in &events {
            match self.resolver.get_trade(provider.as_ref(), pair, event).await {
                Ok(trade) => trades.push(trade),
                Err(error) if error.is_deterministic() => {
                    warn!(pair = ?pair.address, %error, "Skipping unresolvable trade log")
                }
                Err(error) => return Err(error),
            }
        }

        Ok(trades)
    }

    /// Runs `attempt` on the worker's endpoint until it succeeds
    async fn with_retries<T, F, Fut>(
        &self,
        worker: WorkerId,
        scope: &str,
        attempt: F,
    ) -> Result<T, ScanError>
    where
        F: Fn(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T, ResolverError>>,
    {
        let mut retries = ScanRetries::new(&self.retry_policy);

        loop {
            let provider = self
                .pool
                .acquire(worker, self.network)
                .await
                .map_err(ScanError::NoProvider)?;

            let error = match attempt(provider).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let class = error.class();
            match retries.next_action(class) {
                RetryAction::RetryAfter(cooldown) => {
                    warn!(
                        %worker, scope, ?class, cooldown_secs = cooldown.as_secs(),
                        "Endpoint refused the scan, cooling down"
                    );
                    tokio::time::sleep(cooldown).await;
                }
                RetryAction::Failover => {
                    warn!(%worker, scope, %error, "Endpoint unreachable, failing over");
                    self.pool.report_failure(worker, self.network).await;
                }
                RetryAction::Retry => {
                    let retry = retries.retries();
                    match retries.severity() {
                        Severity::Silent => debug!(%worker, scope, retry, %error, "Retrying scan"),
                        Severity::Warn => warn!(%worker, scope, retry, %error, "Retrying scan"),
                        Severity::Error => error!(%worker, scope, retry, %error, "Retrying scan"),
                    }
                }
            }
        }
    }
}

fn log_filter(address: Address, topic: H256, window: BlockWindow) -> EthersFilter {
    EthersFilter::new()
        .address(address)
        .topic0(topic)
        .from_block(window.from_block())
        .to_block(window.to_block())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ethers::types::{Address, I256};
    use tokio::time::Instant;

    use super::*;
    use crate::entities::TradeAmounts;
    use crate::exchanges::PANCAKESWAP;
    use crate::factory::{self, FakeProvider};
    use crate::providers::Endpoint;
    use crate::repos::{MemoryRepo, MemorySession, Repo};

    struct Setup {
        repo: MemoryRepo,
        queue: Arc<PersistenceQueue<MemorySession>>,
        pool: Arc<ProviderPool<FakeProvider>>,
        scanner: RangeScanner<FakeProvider, MemorySession>,
    }

    async fn setup(providers: Vec<Arc<FakeProvider>>) -> Setup {
        let repo = MemoryRepo::new();
        let queue = Arc::new(PersistenceQueue::start(repo.open_session().await.unwrap()));
        queue.enqueue(PANCAKESWAP).unwrap();

        let endpoints = providers
            .into_iter()
            .enumerate()
            .map(|(index, provider)| Endpoint {
                url: format!("http://node-{index}"),
                provider,
            })
            .collect();
        let pool = Arc::new(ProviderPool::new().with_endpoints(Network::Mainnet, endpoints));
        let resolver = Arc::new(
            EntityResolver::new(Network::Mainnet.base_currency()).with_store(queue.reader()),
        );
        let scanner = RangeScanner::new(Network::Mainnet, pool.clone(), resolver, queue.clone());

        Setup {
            repo,
            queue,
            pool,
            scanner,
        }
    }

    fn pair_created_logs() -> Vec<ethers::types::Log> {
        let base = Network::Mainnet.base_currency();
        let factory = PANCAKESWAP.factory();

        let cake = Address::repeat_byte(0x44);

        vec![
            factory::pair_created_log(factory, cake, base, Address::repeat_byte(0x31), 120, 0),
            factory::pair_created_log(
                factory,
                cake,
                Address::repeat_byte(0x55),
                Address::repeat_byte(0x32),
                121,
                0,
            ),
            factory::pair_created_log(
                factory,
                base,
                Address::repeat_byte(0x66),
                Address::repeat_byte(0x33),
                500,
                0,
            ),
        ]
    }

    #[tokio::test]
    async fn keeps_only_base_currency_pairs_inside_the_window() {
        let provider = Arc::new(
            FakeProvider::new()
                .with_logs(pair_created_logs())
                .with_token(Address::repeat_byte(0x44), "Pancake", "CAKE", 18),
        );
        let Setup { scanner, .. } = setup(vec![provider.clone()]).await;

        let pairs = scanner
            .scan_new_pairs(WorkerId(0), &[PANCAKESWAP], BlockWindow::new(100, 100))
            .await
            .unwrap();

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].address, Address::repeat_byte(0x31));
        assert_eq!(provider.requested_ranges(), vec![(99, 199)]);
    }

    #[tokio::test]
    async fn enqueues_every_trade_of_the_window() {
        let pair = factory::trading_pair(PANCAKESWAP, 0x31, false);
        let provider = Arc::new(FakeProvider::new().with_logs(vec![
            factory::swap_log(pair.address, [100, 0, 0, 50], 150, 0),
            factory::swap_log(pair.address, [0, 10, 20, 0], 151, 4),
            factory::swap_log(Address::repeat_byte(0x99), [1, 0, 0, 1], 152, 0),
        ]));
        let Setup {
            repo,
            queue,
            scanner,
            ..
        } = setup(vec![provider]).await;

        let count = scanner
            .scan_trades(WorkerId(0), &pair, BlockWindow::new(100, 100))
            .await
            .unwrap();
        queue.commit().await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(repo.committed_trades().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_out_rate_limits() {
        let pair = factory::trading_pair(PANCAKESWAP, 0x31, false);
        let provider = Arc::new(
            FakeProvider::new()
                .with_logs(vec![factory::swap_log(pair.address, [1, 0, 0, 1], 150, 0)])
                .fail_get_logs(&["(code: 429) Too Many Requests"]),
        );
        let Setup { scanner, .. } = setup(vec![provider.clone()]).await;
        let started_at = Instant::now();

        let count = scanner
            .scan_trades(WorkerId(0), &pair, BlockWindow::new(100, 100))
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert!(started_at.elapsed() >= Duration::from_secs(60));
        assert_eq!(provider.requested_ranges().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_stale_filters_at_once() {
        let pair = factory::trading_pair(PANCAKESWAP, 0x31, false);
        let provider = Arc::new(
            FakeProvider::new()
                .with_logs(vec![factory::swap_log(pair.address, [1, 0, 0, 1], 150, 0)])
                .fail_get_logs(&["filter not found", "header not found", "filter not found"]),
        );
        let Setup { scanner, .. } = setup(vec![provider.clone()]).await;
        let started_at = Instant::now();

        let count = scanner
            .scan_trades(WorkerId(0), &pair, BlockWindow::new(100, 100))
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert!(started_at.elapsed() < Duration::from_secs(1));
        assert_eq!(provider.requested_ranges().len(), 4);
    }

    #[tokio::test]
    async fn fails_over_when_the_endpoint_drops() {
        let pair = factory::trading_pair(PANCAKESWAP, 0x31, false);
        let logs = vec![factory::swap_log(pair.address, [1, 0, 0, 1], 150, 0)];
        let dropping = Arc::new(
            FakeProvider::new()
                .with_logs(logs.clone())
                .fail_get_logs(&["error sending request for url: connection reset"]),
        );
        let steady = Arc::new(FakeProvider::new().with_logs(logs));
        let Setup { scanner, pool, .. } = setup(vec![dropping.clone(), steady.clone()]).await;

        let count = scanner
            .scan_trades(WorkerId(0), &pair, BlockWindow::new(100, 100))
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(dropping.requested_ranges().len(), 1);
        assert_eq!(steady.requested_ranges().len(), 1);
        assert_eq!(pool.usages(Network::Mainnet).await, vec![2, 1]);
    }

    #[tokio::test]
    async fn gives_up_without_endpoints() {
        let pair = factory::trading_pair(PANCAKESWAP, 0x31, false);
        let Setup { scanner, .. } = setup(vec![Arc::new(FakeProvider::unhealthy())]).await;

        let result = scanner.scan_trades(WorkerId(0), &pair, BlockWindow::new(100, 100)).await;

        assert!(matches!(result, Err(ScanError::NoProvider(_))));
    }

    #[tokio::test]
    async fn starts_a_pair_created_in_the_same_block_from_empty_reserves() {
        let pair = factory::trading_pair(PANCAKESWAP, 0x31, false);
        let provider = Arc::new(
            FakeProvider::new()
                .with_logs(vec![factory::sync_log(pair.address, (1_000, 400), 150, 0)]),
        );
        let Setup {
            repo,
            queue,
            scanner,
            ..
        } = setup(vec![provider.clone()]).await;
        let scanner = scanner.with_trade_event(TradeEventKind::Sync);

        let count = tokio::time::timeout(
            Duration::from_secs(2),
            scanner.scan_trades(WorkerId(0), &pair, BlockWindow::new(100, 100)),
        )
        .await
        .unwrap()
        .unwrap();
        queue.commit().await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(provider.reserve_blocks(), vec![149]);
        assert_eq!(
            repo.committed_trades().await[0].amounts,
            TradeAmounts::Delta {
                token_delta: I256::from(1_000),
                base_delta: I256::from(400),
            }
        );
    }

    #[tokio::test]
    async fn skips_logs_that_cannot_be_resolved() {
        let pair = factory::trading_pair(PANCAKESWAP, 0x31, false);
        let provider = Arc::new(
            FakeProvider::new()
                .with_logs(vec![
                    factory::sync_log(pair.address, (1_000, 400), 150, 0),
                    factory::sync_log(pair.address, (900, 450), 151, 0),
                ])
                .with_garbled_reserves(pair.address),
        );
        let Setup { scanner, .. } = setup(vec![provider.clone()]).await;
        let scanner = scanner.with_trade_event(TradeEventKind::Sync);

        let count = tokio::time::timeout(
            Duration::from_secs(2),
            scanner.scan_trades(WorkerId(0), &pair, BlockWindow::new(100, 100)),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(count, 1);
        assert_eq!(provider.reserve_blocks(), vec![149]);
    }
}
