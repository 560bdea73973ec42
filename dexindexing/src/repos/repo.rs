use std::sync::Arc;

use derive_more::Display;
use ethers::types::{Address, TxHash};

use crate::entities::{Block, Entity, Token, Trade, TradingPair, Transaction};
use crate::exchanges::Exchange;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum RepoError {
    NotConnected,
    #[display("Query Error: {_0}")]
    Query(String),
    #[display("Missing foreign key: {_0}")]
    MissingForeignKey(String),
    #[display("Unknown Error: {_0}")]
    Unknown(String),
}

impl std::error::Error for RepoError {}

/// A store the pipeline can open write sessions on
#[async_trait::async_trait]
pub trait Repo: Sync + Send + Clone + 'static {
    type Session: RepoSession;

    /// Creates the schema. With `reset_schema`, everything stored is destroyed first.
    async fn migrate(&self, reset_schema: bool) -> Result<(), RepoError>;

    async fn open_session(&self) -> Result<Self::Session, RepoError>;
}

/// One long-lived unit of work on the store.
///
/// Reads see everything merged in this session, committed or not. Merges
/// are insert-or-update by natural key and bring along every entity the
/// merged one references, so a Trade can be merged on its own. A failed
/// merge leaves the session as it was before that merge.
#[async_trait::async_trait]
pub trait RepoSession: Send + 'static {
    async fn get_token(&mut self, address: &Address) -> Result<Option<Token>, RepoError>;
    async fn get_block(&mut self, number: u64) -> Result<Option<Block>, RepoError>;
    async fn get_transaction(&mut self, hash: &TxHash) -> Result<Option<Transaction>, RepoError>;
    async fn get_trading_pair(&mut self, address: &Address)
        -> Result<Option<TradingPair>, RepoError>;
    async fn get_trading_pairs(
        &mut self,
        exchanges: &[Exchange],
    ) -> Result<Vec<TradingPair>, RepoError>;
    async fn get_trade(
        &mut self,
        transaction_hash: &TxHash,
        log_index: u64,
    ) -> Result<Option<Trade>, RepoError>;
    async fn get_trades_by_pair(
        &mut self,
        pair: &Arc<TradingPair>,
    ) -> Result<Vec<Trade>, RepoError>;
    /// Highest block referenced by any stored transaction
    async fn get_last_block_number(&mut self) -> Result<Option<u64>, RepoError>;

    async fn merge(&mut self, entity: &Entity) -> Result<(), RepoError>;
    async fn commit(&mut self) -> Result<(), RepoError>;
}
