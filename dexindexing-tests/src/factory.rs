use std::sync::Arc;

use dexindexing::contracts::SWAP_EVENT;
use dexindexing::exchanges::PANCAKESWAP;
use dexindexing::providers::ProviderError;
use dexindexing::{
    Block, Exchange, Provider, Token, Trade, TradeAmounts, TradingPair, Transaction,
};
use ethers::abi::{self, Token as AbiToken};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, Block as EthersBlock, BlockId, Bytes, Filter, Log, Transaction as EthersTransaction,
    TransactionReceipt, TxHash, ValueOrArray, H256, I256, U256, U64,
};
use rand::Rng;

pub fn random_address() -> Address {
    Address::from(rand::random::<[u8; 20]>())
}

pub fn random_tx_hash() -> TxHash {
    TxHash::from(rand::random::<[u8; 32]>())
}

/// Far above any block a test asserts on, and unlikely to collide
pub fn random_block_number() -> u64 {
    rand::thread_rng().gen_range(1_000_000..1_000_000_000_000)
}

pub fn block(number: u64) -> Block {
    Block::new(number, 1_700_000_000 + (number % 1_000_000) as i64)
}

pub fn token() -> Token {
    Token {
        address: random_address(),
        name: "Alpaca Finance".to_string(),
        symbol: "ALPACA".to_string(),
        decimals: 18,
    }
}

pub fn transaction(block_number: u64) -> Transaction {
    Transaction {
        hash: random_tx_hash(),
        block: block(block_number),
        position: 3,
        gas_price: U256::from(5_000_000_000u64),
    }
}

pub fn trading_pair() -> Arc<TradingPair> {
    trading_pair_on(PANCAKESWAP)
}

pub fn trading_pair_on(exchange: Exchange) -> Arc<TradingPair> {
    Arc::new(TradingPair {
        address: random_address(),
        exchange,
        token: token(),
        creator_transaction: transaction(random_block_number()),
        is_base_token0: false,
    })
}

pub fn swap_trade(pair: &Arc<TradingPair>, log_index: u64) -> Trade {
    Trade {
        pair: pair.clone(),
        transaction: transaction(pair.creator_transaction.block.number + 1),
        log_index,
        amounts: TradeAmounts::Raw {
            token_in: U256::zero(),
            token_out: U256::exp10(30),
            base_in: U256::exp10(18),
            base_out: U256::zero(),
        },
    }
}

pub fn sync_trade(pair: &Arc<TradingPair>, log_index: u64) -> Trade {
    Trade {
        pair: pair.clone(),
        transaction: transaction(pair.creator_transaction.block.number + 2),
        log_index,
        amounts: TradeAmounts::Delta {
            token_delta: I256::from(-2_500),
            base_delta: I256::from(40),
        },
    }
}

/// A chain holding one swap of `pair`. Block ranges are ignored, so the swap
/// is found by whichever window the indexer resumes from.
pub fn swap_chain(pair: Address, amounts: [u64; 4]) -> impl Provider {
    struct SwapChain {
        swap: Log,
    }

    #[async_trait::async_trait]
    impl Provider for SwapChain {
        async fn get_block_number(&self) -> Result<U64, ProviderError> {
            Ok(U64::from(1u64 << 50))
        }

        async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError> {
            let watched = match &filter.address {
                Some(ValueOrArray::Value(address)) => *address == self.swap.address,
                Some(ValueOrArray::Array(addresses)) => addresses.contains(&self.swap.address),
                None => false,
            };

            Ok(if watched { vec![self.swap.clone()] } else { vec![] })
        }

        async fn get_block(
            &self,
            block_number: U64,
        ) -> Result<Option<EthersBlock<TxHash>>, ProviderError> {
            Ok(Some(EthersBlock {
                number: Some(block_number),
                timestamp: U256::from(1_700_000_000u64),
                ..Default::default()
            }))
        }

        async fn get_transaction(
            &self,
            hash: TxHash,
        ) -> Result<Option<EthersTransaction>, ProviderError> {
            Ok((Some(hash) == self.swap.transaction_hash).then(|| EthersTransaction {
                hash,
                block_number: self.swap.block_number,
                transaction_index: self.swap.transaction_index,
                gas_price: Some(U256::from(5_000_000_000u64)),
                ..Default::default()
            }))
        }

        async fn get_transaction_receipt(
            &self,
            _hash: TxHash,
        ) -> Result<Option<TransactionReceipt>, ProviderError> {
            Ok(None)
        }

        async fn call(
            &self,
            _tx: &TypedTransaction,
            _block: Option<BlockId>,
        ) -> Result<Bytes, ProviderError> {
            Err(ProviderError::CustomError("execution reverted".to_string()))
        }
    }

    let router = H256::from(random_address());
    let swap = Log {
        address: pair,
        topics: vec![SWAP_EVENT.topic(), router, router],
        data: Bytes::from(abi::encode(&amounts.map(|amount| AbiToken::Uint(amount.into())))),
        block_number: Some(U64::from(42)),
        transaction_hash: Some(random_tx_hash()),
        transaction_index: Some(U64::from(0)),
        log_index: Some(U256::from(4)),
        ..Default::default()
    };

    SwapChain { swap }
}
