use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ethers::types::{Address, TxHash};
use tokio::sync::Mutex;

use super::repo::{Repo, RepoError, RepoSession};
use crate::entities::{Block, Entity, Token, Trade, TradingPair, Transaction};
use crate::exchanges::Exchange;

#[derive(Clone, Debug, Default)]
struct Tables {
    exchanges: HashMap<&'static str, Exchange>,
    tokens: HashMap<Address, Token>,
    blocks: BTreeMap<u64, Block>,
    transactions: HashMap<TxHash, Transaction>,
    pairs: HashMap<Address, Arc<TradingPair>>,
    trades: BTreeMap<(TxHash, u64), Trade>,
}

impl Tables {
    fn absorb(&mut self, staged: Tables) {
        self.exchanges.extend(staged.exchanges);
        self.tokens.extend(staged.tokens);
        self.blocks.extend(staged.blocks);
        self.transactions.extend(staged.transactions);
        self.pairs.extend(staged.pairs);
        self.trades.extend(staged.trades);
    }
}

/// Store kept in process memory, with the same foreign key and commit rules
/// as the Postgres one
#[derive(Clone, Debug, Default)]
pub struct MemoryRepo {
    committed: Arc<Mutex<Tables>>,
    merges_applied: Arc<AtomicUsize>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful merges across every session
    pub fn merges_applied(&self) -> usize {
        self.merges_applied.load(Ordering::SeqCst)
    }

    pub async fn committed_trades(&self) -> Vec<Trade> {
        self.committed.lock().await.trades.values().cloned().collect()
    }

    pub async fn committed_pairs(&self) -> Vec<Arc<TradingPair>> {
        self.committed.lock().await.pairs.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl Repo for MemoryRepo {
    type Session = MemorySession;

    async fn migrate(&self, reset_schema: bool) -> Result<(), RepoError> {
        if reset_schema {
            *self.committed.lock().await = Tables::default();
        }

        Ok(())
    }

    async fn open_session(&self) -> Result<MemorySession, RepoError> {
        Ok(MemorySession {
            committed: self.committed.clone(),
            staged: Tables::default(),
            merges_applied: self.merges_applied.clone(),
        })
    }
}

pub struct MemorySession {
    committed: Arc<Mutex<Tables>>,
    staged: Tables,
    merges_applied: Arc<AtomicUsize>,
}

impl MemorySession {
    async fn has_exchange(&self, exchange: &Exchange) -> bool {
        self.staged.exchanges.contains_key(exchange.name)
            || self.committed.lock().await.exchanges.contains_key(exchange.name)
    }

    fn stage_transaction(&mut self, transaction: &Transaction) {
        self.staged.blocks.insert(transaction.block.number, transaction.block.clone());
        self.staged.transactions.insert(transaction.hash, transaction.clone());
    }

    fn stage_trading_pair(&mut self, pair: &Arc<TradingPair>) {
        self.staged.tokens.insert(pair.token.address, pair.token.clone());
        self.stage_transaction(&pair.creator_transaction);
        self.staged.pairs.insert(pair.address, pair.clone());
    }
}

#[async_trait::async_trait]
impl RepoSession for MemorySession {
    async fn get_token(&mut self, address: &Address) -> Result<Option<Token>, RepoError> {
        match self.staged.tokens.get(address) {
            Some(token) => Ok(Some(token.clone())),
            None => Ok(self.committed.lock().await.tokens.get(address).cloned()),
        }
    }

    async fn get_block(&mut self, number: u64) -> Result<Option<Block>, RepoError> {
        match self.staged.blocks.get(&number) {
            Some(block) => Ok(Some(block.clone())),
            None => Ok(self.committed.lock().await.blocks.get(&number).cloned()),
        }
    }

    async fn get_transaction(&mut self, hash: &TxHash) -> Result<Option<Transaction>, RepoError> {
        match self.staged.transactions.get(hash) {
            Some(transaction) => Ok(Some(transaction.clone())),
            None => Ok(self.committed.lock().await.transactions.get(hash).cloned()),
        }
    }

    async fn get_trading_pair(
        &mut self,
        address: &Address,
    ) -> Result<Option<TradingPair>, RepoError> {
        match self.staged.pairs.get(address) {
            Some(pair) => Ok(Some(pair.as_ref().clone())),
            None => Ok(self
                .committed
                .lock()
                .await
                .pairs
                .get(address)
                .map(|pair| pair.as_ref().clone())),
        }
    }

    async fn get_trading_pairs(
        &mut self,
        exchanges: &[Exchange],
    ) -> Result<Vec<TradingPair>, RepoError> {
        let mut pairs = self.committed.lock().await.pairs.clone();
        pairs.extend(self.staged.pairs.clone());

        let mut pairs: Vec<_> = pairs
            .into_values()
            .filter(|pair| exchanges.contains(&pair.exchange))
            .map(|pair| pair.as_ref().clone())
            .collect();
        pairs.sort_by_key(|pair| pair.address);

        Ok(pairs)
    }

    async fn get_trade(
        &mut self,
        transaction_hash: &TxHash,
        log_index: u64,
    ) -> Result<Option<Trade>, RepoError> {
        let key = (*transaction_hash, log_index);

        match self.staged.trades.get(&key) {
            Some(trade) => Ok(Some(trade.clone())),
            None => Ok(self.committed.lock().await.trades.get(&key).cloned()),
        }
    }

    async fn get_trades_by_pair(
        &mut self,
        pair: &Arc<TradingPair>,
    ) -> Result<Vec<Trade>, RepoError> {
        let mut trades = self.committed.lock().await.trades.clone();
        trades.extend(self.staged.trades.clone());

        Ok(trades.into_values().filter(|trade| trade.pair.address == pair.address).collect())
    }

    async fn get_last_block_number(&mut self) -> Result<Option<u64>, RepoError> {
        let committed = self.committed.lock().await;
        let staged = self.staged.transactions.values();

        Ok(committed
            .transactions
            .values()
            .chain(staged)
            .map(|transaction| transaction.block.number)
            .max())
    }

    async fn merge(&mut self, entity: &Entity) -> Result<(), RepoError> {
        let exchange = match entity {
            Entity::TradingPair(pair) => Some(pair.exchange),
            Entity::Trade(trade) => Some(trade.pair.exchange),
            _ => None,
        };
        if let Some(exchange) = exchange {
            if !self.has_exchange(&exchange).await {
                return Err(RepoError::MissingForeignKey(format!("dex:{}", exchange.name)));
            }
        }

        match entity {
            Entity::Exchange(exchange) => {
                self.staged.exchanges.insert(exchange.name, *exchange);
            }
            Entity::Token(token) => {
                self.staged.tokens.insert(token.address, token.clone());
            }
            Entity::Block(block) => {
                self.staged.blocks.insert(block.number, block.clone());
            }
            Entity::Transaction(transaction) => self.stage_transaction(transaction),
            Entity::TradingPair(pair) => self.stage_trading_pair(pair),
            Entity::Trade(trade) => {
                self.stage_trading_pair(&trade.pair);
                self.stage_transaction(&trade.transaction);
                self.staged
                    .trades
                    .insert((trade.transaction.hash, trade.log_index), trade.clone());
            }
        }
        self.merges_applied.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), RepoError> {
        let staged = std::mem::take(&mut self.staged);
        self.committed.lock().await.absorb(staged);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::PANCAKESWAP;
    use crate::factory;

    #[tokio::test]
    async fn hides_staged_merges_from_other_sessions_until_commit() {
        let repo = MemoryRepo::new();
        let mut writer = repo.open_session().await.unwrap();
        let mut reader = repo.open_session().await.unwrap();
        let token = factory::token(1, "Cake", "CAKE");

        writer.merge(&token.clone().into()).await.unwrap();

        assert_eq!(writer.get_token(&token.address).await.unwrap(), Some(token.clone()));
        assert_eq!(reader.get_token(&token.address).await.unwrap(), None);

        writer.commit().await.unwrap();

        assert_eq!(reader.get_token(&token.address).await.unwrap(), Some(token));
    }

    #[tokio::test]
    async fn refuses_pairs_of_unknown_exchanges() {
        let repo = MemoryRepo::new();
        let mut session = repo.open_session().await.unwrap();
        let pair = factory::trading_pair(PANCAKESWAP, 3, false);

        let result = session.merge(&pair.clone().into()).await;

        assert!(matches!(result, Err(RepoError::MissingForeignKey(_))));
        assert_eq!(session.get_trading_pair(&pair.address).await.unwrap(), None);
        assert_eq!(repo.merges_applied(), 0);
    }

    #[tokio::test]
    async fn merges_a_trade_with_everything_it_references() {
        let repo = MemoryRepo::new();
        let mut session = repo.open_session().await.unwrap();
        let trade = factory::swap_trade(factory::trading_pair(PANCAKESWAP, 3, false), 20, 1);

        session.merge(&PANCAKESWAP.into()).await.unwrap();
        session.merge(&trade.clone().into()).await.unwrap();
        session.commit().await.unwrap();

        let mut reader = repo.open_session().await.unwrap();
        assert_eq!(
            reader.get_trading_pair(&trade.pair.address).await.unwrap().as_ref(),
            Some(trade.pair.as_ref())
        );
        assert_eq!(reader.get_last_block_number().await.unwrap(), Some(20));
        assert_eq!(reader.get_trades_by_pair(&trade.pair).await.unwrap(), vec![trade]);
    }

    #[tokio::test]
    async fn keeps_one_trade_per_log() {
        let repo = MemoryRepo::new();
        let mut session = repo.open_session().await.unwrap();
        let trade = factory::swap_trade(factory::trading_pair(PANCAKESWAP, 3, false), 20, 1);

        session.merge(&PANCAKESWAP.into()).await.unwrap();
        session.merge(&trade.clone().into()).await.unwrap();
        session.merge(&trade.clone().into()).await.unwrap();
        session.commit().await.unwrap();

        assert_eq!(repo.committed_trades().await, vec![trade]);
    }
}
