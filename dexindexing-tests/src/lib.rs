pub mod db;
pub mod factory;
pub mod test_runner;

use std::sync::Arc;

use dexindexing::{PostgresRepo, Repo, RepoSession, Trade, TradingPair};

/// Reads through a fresh session, so only committed trades are visible
pub async fn find_committed_trades(repo: &PostgresRepo, pair: &Arc<TradingPair>) -> Vec<Trade> {
    let mut session = repo.open_session().await.unwrap();

    session.get_trades_by_pair(pair).await.unwrap()
}
