use ethers::types::Address;

use super::{Token, Transaction};
use crate::exchanges::Exchange;

/// A pair contract trading some token against the network's base currency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradingPair {
    pub address: Address,
    pub exchange: Exchange,
    /// The counter asset, never the base currency
    pub token: Token,
    pub creator_transaction: Transaction,
    /// Fixed when the pair is created: whether `token0` of the pair contract is
    /// the base currency. Every amount normalization branches on it.
    pub is_base_token0: bool,
}
