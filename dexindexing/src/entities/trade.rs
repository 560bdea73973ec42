use std::sync::Arc;

use ethers::types::{I256, U256};

use super::{TradingPair, Transaction};

/// One observed swap or sync log of a pair. Unique by (transaction hash, log index).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trade {
    pub pair: Arc<TradingPair>,
    pub transaction: Transaction,
    pub log_index: u64,
    pub amounts: TradeAmounts,
}

/// Amounts are always from the pair contract's point of view and already
/// normalized into token / base currency sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TradeAmounts {
    /// From a Swap log
    Raw {
        token_in: U256,
        token_out: U256,
        base_in: U256,
        base_out: U256,
    },
    /// From a Sync log: change in reserves
    Delta { token_delta: I256, base_delta: I256 },
}

impl TradeAmounts {
    /// Net token and base currency deltas. `None` when a raw amount does not
    /// fit a signed 256-bit integer.
    pub fn deltas(&self) -> Option<(I256, I256)> {
        match *self {
            TradeAmounts::Raw {
                token_in,
                token_out,
                base_in,
                base_out,
            } => Some((
                signed_difference(token_in, token_out)?,
                signed_difference(base_in, base_out)?,
            )),
            TradeAmounts::Delta {
                token_delta,
                base_delta,
            } => Some((token_delta, base_delta)),
        }
    }
}

pub(crate) fn signed_difference(a: U256, b: U256) -> Option<I256> {
    let a = I256::try_from(a).ok()?;
    let b = I256::try_from(b).ok()?;

    a.checked_sub(b)
}
