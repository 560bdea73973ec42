//! Pure domain records. Their table mappings live in `repos`.

mod block;
mod token;
mod trade;
mod trading_pair;
mod transaction;

pub use block::Block;
pub use token::Token;
pub use trade::{Trade, TradeAmounts};
pub(crate) use trade::signed_difference;
pub use trading_pair::TradingPair;
pub use transaction::Transaction;

use std::sync::Arc;

use crate::exchanges::Exchange;
use crate::hashes::Hashes;

/// Anything the persistence queue can merge into the store
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
    Exchange(Exchange),
    Token(Token),
    Block(Block),
    Transaction(Transaction),
    TradingPair(Arc<TradingPair>),
    Trade(Trade),
}

impl Entity {
    /// Natural key, used when reporting merge failures
    pub fn key(&self) -> String {
        match self {
            Entity::Exchange(exchange) => format!("dex:{}", exchange.name),
            Entity::Token(token) => format!("token:{}", Hashes::address_to_string(&token.address)),
            Entity::Block(block) => format!("block:{}", block.number),
            Entity::Transaction(transaction) => {
                format!("tx:{}", Hashes::h256_to_string(&transaction.hash))
            }
            Entity::TradingPair(pair) => {
                format!("dex_trade_pair:{}", Hashes::address_to_string(&pair.address))
            }
            Entity::Trade(trade) => format!(
                "dex_trade:{}:{}",
                Hashes::h256_to_string(&trade.transaction.hash),
                trade.log_index
            ),
        }
    }
}

impl From<Exchange> for Entity {
    fn from(value: Exchange) -> Self {
        Entity::Exchange(value)
    }
}
impl From<Token> for Entity {
    fn from(value: Token) -> Self {
        Entity::Token(value)
    }
}
impl From<Block> for Entity {
    fn from(value: Block) -> Self {
        Entity::Block(value)
    }
}
impl From<Transaction> for Entity {
    fn from(value: Transaction) -> Self {
        Entity::Transaction(value)
    }
}
impl From<TradingPair> for Entity {
    fn from(value: TradingPair) -> Self {
        Entity::TradingPair(Arc::new(value))
    }
}
impl From<Arc<TradingPair>> for Entity {
    fn from(value: Arc<TradingPair>) -> Self {
        Entity::TradingPair(value)
    }
}
impl From<Trade> for Entity {
    fn from(value: Trade) -> Self {
        Entity::Trade(value)
    }
}
