mod progress;

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

pub use progress::Progress;

use crate::config::Config;
use crate::entities::TradingPair;
use crate::persistence::{PersistenceError, PersistenceQueue};
use crate::providers::{Provider, ProviderPool, WorkerId};
use crate::repos::{Repo, RepoSession};
use crate::resolver::EntityResolver;
use crate::scanner::{BlockWindow, RangeScanner, ScanError};
use crate::DexindexingError;

/// Outcome of one pass over the current window
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// The window is ahead of the chain
    WaitingForBlocks { chain_head: u64 },
    Indexed(Progress),
    /// Some work was abandoned; the same window is scanned again
    Incomplete,
}

pub struct Indexer<P, R: Repo> {
    config: Config<R>,
    scanner: Arc<RangeScanner<P, R::Session>>,
    queue: Arc<PersistenceQueue<R::Session>>,
    pairs: BTreeMap<Address, Arc<TradingPair>>,
    window: BlockWindow,
    worker_count: usize,
}

impl<P: Provider + 'static, R: Repo> Indexer<P, R> {
    /// Prepares the store and resumes from the last stored block. Any store
    /// failure here is fatal.
    pub async fn start(
        config: Config<R>,
        pool: Arc<ProviderPool<P>>,
    ) -> Result<Self, DexindexingError> {
        config.validate()?;

        let Config {
            repo,
            network,
            exchanges,
            ..
        } = &config;

        repo.migrate(config.reset_schema).await?;
        let queue = Arc::new(PersistenceQueue::start(repo.open_session().await?));

        for exchange in exchanges {
            queue.enqueue(*exchange)?;
        }
        queue.commit().await?;

        let reader = queue.reader();
        let last_block_number = reader.get_last_block_number().await?;
        let pairs = reader
            .get_trading_pairs(exchanges)
            .await?
            .into_iter()
            .map(|pair| (pair.address, Arc::new(pair)))
            .collect();

        let resolver = EntityResolver::new(network.base_currency()).with_store(reader);
        let scanner = RangeScanner::new(*network, pool.clone(), Arc::new(resolver), queue.clone())
            .with_retry_policy(config.retry_policy.clone())
            .with_trade_event(config.trade_event);

        let start = last_block_number.unwrap_or_default().max(config.start_block_number);
        let worker_count =
            config.worker_count.unwrap_or_else(|| pool.roster_size(*network)).max(1);

        info!(?network, start, worker_count, "Starting trade indexing");

        Ok(Self {
            window: BlockWindow::new(start, config.window_size),
            config,
            scanner: Arc::new(scanner),
            queue,
            pairs,
            worker_count,
        })
    }

    pub fn window(&self) -> BlockWindow {
        self.window
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Never returns under normal operation
    pub async fn run(mut self) -> Result<(), DexindexingError> {
        let interval = Duration::from_millis(self.config.ingestion_interval_ms);

        loop {
            match self.step().await? {
                Step::Indexed(_) => {}
                Step::WaitingForBlocks { .. } | Step::Incomplete => {
                    tokio::time::sleep(interval).await
                }
            }
        }
    }

    pub async fn step(&mut self) -> Result<Step, DexindexingError> {
        let started_at = Instant::now();
        let window = self.window;

        let chain_head = match self.scanner.chain_head(WorkerId(0)).await {
            Ok(chain_head) => chain_head,
            Err(error) => return abandon(error),
        };
        if window.to_block() > chain_head {
            return Ok(Step::WaitingForBlocks { chain_head });
        }

        let new_pairs = match self.scan_new_pairs().await {
            Ok(new_pairs) => new_pairs,
            Err(error) => return abandon(error),
        };
        let trades = match self.scan_trades().await {
            Ok(trades) => trades,
            Err(error) => return abandon(error),
        };

        let progress = Progress {
            window,
            new_pairs,
            trades,
            elapsed: started_at.elapsed(),
            chain_head,
        };

        match self.queue.commit().await {
            Ok(()) => {}
            Err(PersistenceError::Commit(error)) => {
                warn!(%window, %error, "Commit failed, scanning the window again");
                return Ok(Step::Incomplete);
            }
            Err(error) => return Err(error.into()),
        }

        info!(
            %window,
            new_pairs,
            trades,
            pairs = self.pairs.len(),
            blocks_per_second = progress.blocks_per_second(),
            eta_secs = progress.eta().as_secs(),
            "Indexed window"
        );
        self.window = window.next();

        Ok(Step::Indexed(progress))
    }

    async fn scan_new_pairs(&mut self) -> Result<usize, ScanError> {
        let pairs = self
            .scanner
            .scan_new_pairs(WorkerId(0), &self.config.exchanges, self.window)
            .await?;

        let mut new_pairs = 0;
        for pair in pairs {
            if self.pairs.contains_key(&pair.address) {
                continue;
            }

            let pair = Arc::new(pair);
            self.queue.enqueue(pair.clone()).map_err(ScanError::Persistence)?;
            self.pairs.insert(pair.address, pair);
            new_pairs += 1;
        }

        Ok(new_pairs)
    }

    /// Pairs are handed out to workers from one shared queue. A worker that
    /// loses every endpoint stops; the others finish what is left.
    async fn scan_trades(&self) -> Result<usize, ScanError> {
        let pending: VecDeque<_> = self.pairs.values().cloned().collect();
        let pending = Arc::new(Mutex::new(pending));

        let workers = (0..self.worker_count).map(|index| {
            tokio::spawn(drain(
                self.scanner.clone(),
                pending.clone(),
                WorkerId(index),
                self.window,
            ))
        });

        let mut trades = 0;
        let mut failure = None;
        for result in join_all(workers).await {
            match result {
                Ok(Ok(count)) => trades += count,
                Ok(Err(error)) => failure = Some(error),
                Err(error) => failure = Some(ScanError::WorkerAborted(error.to_string())),
            }
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(trades),
        }
    }
}

async fn drain<P: Provider + 'static, S: RepoSession>(
    scanner: Arc<RangeScanner<P, S>>,
    pending: Arc<Mutex<VecDeque<Arc<TradingPair>>>>,
    worker: WorkerId,
    window: BlockWindow,
) -> Result<usize, ScanError> {
    let mut trades = 0;

    loop {
        let Some(pair) = pending.lock().await.pop_front() else {
            return Ok(trades);
        };
        trades += scanner.scan_trades(worker, &pair, window).await?;
    }
}

fn abandon(error: ScanError) -> Result<Step, DexindexingError> {
    match error {
        ScanError::Persistence(error) => Err(error.into()),
        error => {
            warn!(%error, "Abandoning the window");
            Ok(Step::Incomplete)
        }
    }
}

#[cfg(test)]
mod tests {
    use ethers::types::Address;

    use super::*;
    use crate::exchanges::PANCAKESWAP;
    use crate::factory::{self, FakeProvider};
    use crate::networks::Network;
    use crate::providers::Endpoint;
    use crate::repos::MemoryRepo;

    fn chain() -> FakeProvider {
        let base = Network::Mainnet.base_currency();
        let cake = Address::repeat_byte(0x44);
        let pair = Address::repeat_byte(0x31);

        FakeProvider::new()
            .with_logs(vec![
                factory::pair_created_log(PANCAKESWAP.factory(), cake, base, pair, 105, 0),
                factory::swap_log(pair, [100, 0, 0, 50], 110, 1),
                factory::swap_log(pair, [0, 30, 60, 0], 149, 0),
                factory::swap_log(pair, [5, 0, 0, 2], 160, 0),
            ])
            .with_token(cake, "PancakeSwap Token", "Cake", 18)
            .with_head(400)
    }

    fn pool(provider: FakeProvider) -> Arc<ProviderPool<FakeProvider>> {
        let endpoint = Endpoint::new("http://node", provider);

        Arc::new(ProviderPool::new().with_endpoints(Network::Mainnet, vec![endpoint]))
    }

    fn config(repo: &MemoryRepo) -> Config<MemoryRepo> {
        Config::new(repo.clone(), Network::Mainnet)
            .with_exchanges(&[PANCAKESWAP])
            .with_window_size(50)
            .with_start_block_number(100)
    }

    #[tokio::test]
    async fn indexes_a_window_and_advances() {
        let repo = MemoryRepo::new();
        let mut indexer = Indexer::start(config(&repo), pool(chain())).await.unwrap();

        let Step::Indexed(progress) = indexer.step().await.unwrap() else {
            panic!("window was not indexed");
        };

        assert_eq!(progress.window, BlockWindow::new(100, 50));
        assert_eq!(progress.new_pairs, 1);
        assert_eq!(progress.trades, 2);
        assert_eq!(repo.committed_trades().await.len(), 2);
        assert_eq!(indexer.window(), BlockWindow::new(150, 50));

        let Step::Indexed(progress) = indexer.step().await.unwrap() else {
            panic!("window was not indexed");
        };

        assert_eq!(progress.new_pairs, 0);
        assert_eq!(progress.trades, 2);
        assert_eq!(repo.committed_trades().await.len(), 3);
        assert_eq!(indexer.pair_count(), 1);
    }

    #[tokio::test]
    async fn waits_for_the_chain_to_catch_up() {
        let repo = MemoryRepo::new();
        let mut indexer =
            Indexer::start(config(&repo), pool(chain().with_head(120))).await.unwrap();

        assert_eq!(
            indexer.step().await.unwrap(),
            Step::WaitingForBlocks { chain_head: 120 }
        );
    }

    #[tokio::test]
    async fn resumes_from_the_last_stored_block() {
        let repo = MemoryRepo::new();
        let trade = factory::swap_trade(factory::trading_pair(PANCAKESWAP, 0x31, false), 300, 0);
        let mut session = repo.open_session().await.unwrap();
        session.merge(&PANCAKESWAP.into()).await.unwrap();
        session.merge(&trade.into()).await.unwrap();
        session.commit().await.unwrap();

        let indexer = Indexer::start(config(&repo), pool(chain())).await.unwrap();

        assert_eq!(indexer.window().start, 300);
        assert_eq!(indexer.pair_count(), 1);
    }

    #[tokio::test]
    async fn rescans_the_window_when_endpoints_are_gone() {
        let repo = MemoryRepo::new();
        let provider = Arc::new(chain());
        let endpoint = Endpoint {
            url: "http://node".to_string(),
            provider: provider.clone(),
        };
        let pool = Arc::new(ProviderPool::new().with_endpoints(Network::Mainnet, vec![endpoint]));
        let mut indexer = Indexer::start(config(&repo), pool).await.unwrap();

        provider.set_healthy(false);

        assert_eq!(indexer.step().await.unwrap(), Step::Incomplete);
        assert_eq!(indexer.window(), BlockWindow::new(100, 50));
    }

    #[tokio::test]
    async fn refuses_invalid_configs() {
        let repo = MemoryRepo::new();

        let result = Indexer::start(config(&repo).with_window_size(0), pool(chain())).await;

        assert!(matches!(result, Err(DexindexingError::Config(_))));
    }
}
