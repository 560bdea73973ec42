mod config;
pub mod contracts;
mod diesel;
pub mod entities;
pub mod events;
pub mod exchanges;
mod hashes;
pub mod indexer;
pub mod networks;
pub mod persistence;
pub mod providers;
mod repos;
pub mod resolver;
pub mod scanner;

#[cfg(test)]
mod factory;

use std::sync::Arc;

pub use config::{Config, ConfigError};
pub use entities::{Block, Entity, Token, Trade, TradeAmounts, TradingPair, Transaction};
pub use events::TradeEventKind;
pub use exchanges::Exchange;
pub use hashes::Hashes;
pub use indexer::{Indexer, Progress, Step};
pub use networks::Network;
pub use persistence::{PersistenceError, PersistenceQueue, SessionReader};
pub use providers::{
    Endpoint, HttpProvider, Provider, ProviderPool, ProviderPoolError, RpcErrorClass, WorkerId,
};
pub use repos::*;
pub use resolver::{EntityResolver, ResolverError};
pub use scanner::{BlockWindow, RangeScanner, RetryPolicy, ScanError};

#[derive(Debug, derive_more::Display, derive_more::From)]
pub enum DexindexingError {
    #[display("Config Error: {_0}")]
    Config(ConfigError),
    #[display("Repo Error: {_0}")]
    Repo(RepoError),
    #[display("Persistence Error: {_0}")]
    Persistence(PersistenceError),
    #[display("Provider Error: {_0}")]
    ProviderPool(ProviderPoolError),
}

impl std::error::Error for DexindexingError {}

/// Indexes the configured network's exchanges over its public JSON-RPC
/// endpoints, forever. Returns only when the store is unusable.
pub async fn index_trades<R: Repo>(config: Config<R>) -> Result<(), DexindexingError> {
    let pool = ProviderPool::connect(&[config.network])?;

    Indexer::start(config, Arc::new(pool)).await?.run().await
}
