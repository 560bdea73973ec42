//! Turns chain identifiers into domain entities, store first and chain second.
//! Nothing built here is written anywhere; persisting is the queue's job.

use std::sync::Arc;

use ethers::types::{Address, BlockId, BlockNumber, TxHash, U256, U64};
use tracing::debug;

use crate::contracts::{self, ContractCallError, ERC20_CONTRACT, PAIR_CONTRACT};
use crate::entities::{self, Block, Token, Trade, TradeAmounts, TradingPair, Transaction};
use crate::events::{PairCreatedEvent, Reserves, SwapEvent, SyncEvent, TradeEvent};
use crate::exchanges::Exchange;
use crate::persistence::SessionReader;
use crate::providers::{classify, Provider, ProviderError, RpcErrorClass};
use crate::repos::{RepoError, RepoSession};

#[derive(Debug, derive_more::Display)]
pub enum ResolverError {
    #[display("Provider Error: {_0}")]
    Provider(ProviderError),
    #[display("Repo Error: {_0}")]
    Repo(RepoError),
    #[display("Contract call Error: {_0}")]
    ContractCall(ContractCallError),
    /// The endpoint does not know the block or transaction (yet)
    #[display("{_0} not found on chain")]
    NotFound(String),
    #[display("Amounts of {_0} do not fit a signed 256-bit integer")]
    AmountOverflow(String),
}

impl std::error::Error for ResolverError {}

impl ResolverError {
    /// Asking again gets the same answer, so the log is skipped instead
    pub fn is_deterministic(&self) -> bool {
        matches!(self, ResolverError::ContractCall(_) | ResolverError::AmountOverflow(_))
    }

    pub fn class(&self) -> RpcErrorClass {
        match self {
            ResolverError::Provider(error) => classify(error),
            _ => RpcErrorClass::Unclassified,
        }
    }
}

impl From<ProviderError> for ResolverError {
    fn from(value: ProviderError) -> Self {
        ResolverError::Provider(value)
    }
}

impl From<RepoError> for ResolverError {
    fn from(value: RepoError) -> Self {
        ResolverError::Repo(value)
    }
}

impl From<ContractCallError> for ResolverError {
    fn from(value: ContractCallError) -> Self {
        match value {
            ContractCallError::Provider(error) => ResolverError::Provider(error),
            error => ResolverError::ContractCall(error),
        }
    }
}

pub struct EntityResolver<S> {
    store: Option<SessionReader<S>>,
    base_currency: Address,
}

impl<S: RepoSession> EntityResolver<S> {
    pub fn new(base_currency: Address) -> Self {
        Self {
            store: None,
            base_currency,
        }
    }

    pub fn with_store(mut self, store: SessionReader<S>) -> Self {
        self.store = Some(store);

        self
    }

    pub fn base_currency(&self) -> Address {
        self.base_currency
    }

    pub async fn get_token<P: Provider + ?Sized>(
        &self,
        provider: &P,
        address: Address,
    ) -> Result<Token, ResolverError> {
        if let Some(store) = &self.store {
            if let Some(token) = store.get_token(&address).await? {
                return Ok(token);
            }
        }

        let name = get_text(provider, address, "name").await?;
        let symbol = get_text(provider, address, "symbol").await?;
        let decimals = or_default(
            contracts::call::<P, u8>(provider, &ERC20_CONTRACT, address, "decimals", None).await,
        )?;

        Ok(Token {
            address,
            name,
            symbol,
            decimals,
        })
    }

    pub async fn get_block<P: Provider + ?Sized>(
        &self,
        provider: &P,
        number: u64,
    ) -> Result<Block, ResolverError> {
        if let Some(store) = &self.store {
            if let Some(block) = store.get_block(number).await? {
                return Ok(block);
            }
        }

        let block = provider
            .get_block(U64::from(number))
            .await?
            .ok_or_else(|| ResolverError::NotFound(format!("block {number}")))?;

        Ok(Block::new(number, block.timestamp.low_u64() as i64))
    }

    pub async fn get_transaction<P: Provider + ?Sized>(
        &self,
        provider: &P,
        hash: TxHash,
    ) -> Result<Transaction, ResolverError> {
        if let Some(store) = &self.store {
            if let Some(transaction) = store.get_transaction(&hash).await? {
                return Ok(transaction);
            }
        }

        let not_found = || ResolverError::NotFound(format!("transaction {hash:?}"));
        let transaction = provider.get_transaction(hash).await?.ok_or_else(not_found)?;
        let block_number = transaction.block_number.ok_or_else(not_found)?.as_u64();
        let position = transaction.transaction_index.ok_or_else(not_found)?.as_u64();

        let gas_price = match transaction.gas_price {
            Some(gas_price) => gas_price,
            None => provider
                .get_transaction_receipt(hash)
                .await?
                .and_then(|receipt| receipt.effective_gas_price)
                .unwrap_or_default(),
        };

        Ok(Transaction {
            hash,
            block: self.get_block(provider, block_number).await?,
            position,
            gas_price,
        })
    }

    /// `None` when the pair does not trade against the base currency
    pub async fn get_trading_pair<P: Provider + ?Sized>(
        &self,
        provider: &P,
        exchange: &Exchange,
        event: &PairCreatedEvent,
    ) -> Result<Option<TradingPair>, ResolverError> {
        if !event.involves(&self.base_currency) || event.token0 == event.token1 {
            debug!(pair = ?event.pair, "Ignoring pair without base currency");
            return Ok(None);
        }

        if let Some(store) = &self.store {
            if let Some(pair) = store.get_trading_pair(&event.pair).await? {
                return Ok(Some(pair));
            }
        }

        let is_base_token0 = event.token0 == self.base_currency;
        let token_address = if is_base_token0 { event.token1 } else { event.token0 };

        Ok(Some(TradingPair {
            address: event.pair,
            exchange: *exchange,
            token: self.get_token(provider, token_address).await?,
            creator_transaction: self
                .get_transaction(provider, event.position.transaction_hash)
                .await?,
            is_base_token0,
        }))
    }

    pub async fn get_trade<P: Provider + ?Sized>(
        &self,
        provider: &P,
        pair: &Arc<TradingPair>,
        event: &TradeEvent,
    ) -> Result<Trade, ResolverError> {
        let position = event.position();

        if let Some(store) = &self.store {
            if let Some(trade) =
                store.get_trade(&position.transaction_hash, position.log_index).await?
            {
                return Ok(trade);
            }
        }

        let amounts = match event {
            TradeEvent::Swap(swap) => swap_amounts(pair, swap),
            TradeEvent::Sync(sync) => {
                let previous_reserves = match sync.previous_reserves {
                    Some(reserves) => reserves,
                    None => get_reserves(provider, pair.address, position.block_number).await?,
                };

                sync_amounts(pair, sync, previous_reserves).ok_or_else(|| {
                    ResolverError::AmountOverflow(format!("{:?}", position.transaction_hash))
                })?
            }
        };

        Ok(Trade {
            pair: pair.clone(),
            transaction: self.get_transaction(provider, position.transaction_hash).await?,
            log_index: position.log_index,
            amounts,
        })
    }
}

/// Pair contracts report amounts as token0/token1; which of them is the base
/// currency was fixed when the pair was created.
pub fn swap_amounts(pair: &TradingPair, swap: &SwapEvent) -> TradeAmounts {
    if pair.is_base_token0 {
        TradeAmounts::Raw {
            token_in: swap.amount1_in,
            token_out: swap.amount1_out,
            base_in: swap.amount0_in,
            base_out: swap.amount0_out,
        }
    } else {
        TradeAmounts::Raw {
            token_in: swap.amount0_in,
            token_out: swap.amount0_out,
            base_in: swap.amount1_in,
            base_out: swap.amount1_out,
        }
    }
}

pub fn sync_amounts(
    pair: &TradingPair,
    sync: &SyncEvent,
    (previous_reserve0, previous_reserve1): Reserves,
) -> Option<TradeAmounts> {
    let delta0 = entities::signed_difference(sync.reserve0, previous_reserve0)?;
    let delta1 = entities::signed_difference(sync.reserve1, previous_reserve1)?;

    let (token_delta, base_delta) = if pair.is_base_token0 {
        (delta1, delta0)
    } else {
        (delta0, delta1)
    };

    Some(TradeAmounts::Delta {
        token_delta,
        base_delta,
    })
}

/// Reserves at the end of the block before `block_number`. A pair created
/// in `block_number` did not exist yet and starts from empty reserves.
async fn get_reserves<P: Provider + ?Sized>(
    provider: &P,
    pair: Address,
    block_number: u64,
) -> Result<Reserves, ResolverError> {
    let block = BlockId::Number(BlockNumber::Number(U64::from(block_number.saturating_sub(1))));
    let output =
        match contracts::call_raw(provider, &PAIR_CONTRACT, pair, "getReserves", Some(block)).await
        {
            Ok(output) if output.is_empty() => return Ok(Reserves::default()),
            Ok(output) => output,
            Err(error) if error.is_revert() => return Ok(Reserves::default()),
            Err(error) => return Err(error.into()),
        };

    let (reserve0, reserve1, _): (U256, U256, u32) = PAIR_CONTRACT
        .decode_output("getReserves", output)
        .map_err(|error| ContractCallError::Abi(error.to_string()))?;

    Ok((reserve0, reserve1))
}

async fn get_text<P: Provider + ?Sized>(
    provider: &P,
    address: Address,
    function: &str,
) -> Result<String, ResolverError> {
    let output = or_default(
        contracts::call_raw(provider, &ERC20_CONTRACT, address, function, None)
            .await
            .map(|output| output.to_vec()),
    )?;

    Ok(contracts::decode_string_or_bytes32(&output).unwrap_or_default())
}

/// Tokens that revert on, or garble, optional ERC20 metadata get defaults
fn or_default<T: Default>(result: Result<T, ContractCallError>) -> Result<T, ResolverError> {
    match result {
        Ok(value) => Ok(value),
        Err(error) if error.is_revert() => Ok(T::default()),
        Err(ContractCallError::Abi(_)) => Ok(T::default()),
        Err(error) => Err(error.into()),
    }
}
