use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ethers::abi::{self, Token as AbiToken};
use ethers::contract::BaseContract;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, Block as EthersBlock, BlockId, BlockNumber, Bytes, Filter as EthersFilter, Log,
    Transaction as EthersTransaction, TransactionReceipt, TxHash, ValueOrArray, H256, U256, U64,
};

use crate::contracts::{ERC20_CONTRACT, PAIR_CONTRACT, PAIR_CREATED_EVENT, SWAP_EVENT, SYNC_EVENT};
use crate::entities::{Block, Token, Trade, TradeAmounts, TradingPair, Transaction};
use crate::exchanges::Exchange;
use crate::providers::{Provider, ProviderError};

pub const ALPHA: Exchange = Exchange {
    name: "alpha",
    router_address: "0x00000000000000000000000000000000000000a1",
    factory_address: "0x00000000000000000000000000000000000000a2",
};

const GAS_PRICE: u64 = 5_000_000_000;

pub fn tx_hash(block_number: u64, log_index: u64) -> TxHash {
    H256::from_low_u64_be(block_number * 10_000 + log_index + 1)
}

pub fn timestamp(block_number: u64) -> i64 {
    1_600_000_000 + block_number as i64 * 3
}

pub fn token(seed: u8, name: &str, symbol: &str) -> Token {
    Token {
        address: Address::repeat_byte(seed),
        name: name.to_string(),
        symbol: symbol.to_string(),
        decimals: 18,
    }
}

pub fn transaction(block_number: u64, log_index: u64) -> Transaction {
    Transaction {
        hash: tx_hash(block_number, log_index),
        block: Block::new(block_number, timestamp(block_number)),
        position: log_index,
        gas_price: U256::from(GAS_PRICE),
    }
}

pub fn trading_pair(exchange: Exchange, seed: u8, is_base_token0: bool) -> Arc<TradingPair> {
    Arc::new(TradingPair {
        address: Address::repeat_byte(seed),
        exchange,
        token: token(seed.wrapping_add(0x80), "Token", "TKN"),
        creator_transaction: transaction(1, seed as u64),
        is_base_token0,
    })
}

pub fn swap_trade(pair: Arc<TradingPair>, block_number: u64, log_index: u64) -> Trade {
    Trade {
        pair,
        transaction: transaction(block_number, log_index),
        log_index,
        amounts: TradeAmounts::Raw {
            token_in: U256::from(100),
            token_out: U256::zero(),
            base_in: U256::zero(),
            base_out: U256::from(50),
        },
    }
}

fn log(
    address: Address,
    topics: Vec<H256>,
    data: Vec<u8>,
    block_number: u64,
    log_index: u64,
) -> Log {
    Log {
        address,
        topics,
        data: Bytes::from(data),
        block_number: Some(U64::from(block_number)),
        transaction_hash: Some(tx_hash(block_number, log_index)),
        transaction_index: Some(U64::from(log_index)),
        log_index: Some(U256::from(log_index)),
        ..Default::default()
    }
}

pub fn pair_created_log(
    factory: Address,
    token0: Address,
    token1: Address,
    pair: Address,
    block_number: u64,
    log_index: u64,
) -> Log {
    log(
        factory,
        vec![PAIR_CREATED_EVENT.topic(), H256::from(token0), H256::from(token1)],
        abi::encode(&[AbiToken::Address(pair), AbiToken::Uint(U256::one())]),
        block_number,
        log_index,
    )
}

/// Amounts as [amount0In, amount1In, amount0Out, amount1Out]
pub fn swap_log(pair: Address, amounts: [u64; 4], block_number: u64, log_index: u64) -> Log {
    let router = Address::repeat_byte(0xee);

    log(
        pair,
        vec![SWAP_EVENT.topic(), H256::from(router), H256::from(router)],
        abi::encode(&amounts.map(|amount| AbiToken::Uint(U256::from(amount)))),
        block_number,
        log_index,
    )
}

pub fn sync_log(
    pair: Address,
    (reserve0, reserve1): (u64, u64),
    block_number: u64,
    log_index: u64,
) -> Log {
    log(
        pair,
        vec![SYNC_EVENT.topic()],
        abi::encode(&[AbiToken::Uint(reserve0.into()), AbiToken::Uint(reserve1.into())]),
        block_number,
        log_index,
    )
}

fn selector(contract: &BaseContract, function: &str) -> [u8; 4] {
    contract.abi().function(function).unwrap().short_signature()
}

/// In-memory JSON-RPC endpoint. Blocks and transactions are derived from the
/// logs it serves; contract calls it was not told about revert.
#[derive(Debug, Default)]
pub struct FakeProvider {
    unhealthy: AtomicBool,
    head: u64,
    logs: Vec<Log>,
    blocks: HashMap<u64, EthersBlock<TxHash>>,
    transactions: HashMap<TxHash, EthersTransaction>,
    receipts: HashMap<TxHash, TransactionReceipt>,
    calls: HashMap<(Address, [u8; 4]), Bytes>,
    get_logs_failures: Mutex<VecDeque<String>>,
    requested_ranges: Mutex<Vec<(u64, u64)>>,
    reserve_blocks: Mutex<Vec<u64>>,
    call_count: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unhealthy() -> Self {
        let provider = Self::new();
        provider.set_healthy(false);

        provider
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    pub fn with_head(mut self, head: u64) -> Self {
        self.head = head;

        self
    }

    pub fn with_logs(mut self, logs: Vec<Log>) -> Self {
        for log in logs {
            let block_number = log.block_number.unwrap().as_u64();
            let hash = log.transaction_hash.unwrap();

            self.blocks.entry(block_number).or_insert_with(|| EthersBlock {
                number: Some(U64::from(block_number)),
                timestamp: U256::from(timestamp(block_number)),
                ..Default::default()
            });
            self.transactions.entry(hash).or_insert_with(|| EthersTransaction {
                hash,
                block_number: Some(U64::from(block_number)),
                transaction_index: log.transaction_index,
                gas_price: Some(U256::from(GAS_PRICE)),
                ..Default::default()
            });
            self.head = self.head.max(block_number);
            self.logs.push(log);
        }

        self
    }

    pub fn with_token(mut self, address: Address, name: &str, symbol: &str, decimals: u8) -> Self {
        let outputs = [
            ("name", AbiToken::String(name.to_string())),
            ("symbol", AbiToken::String(symbol.to_string())),
            ("decimals", AbiToken::Uint(decimals.into())),
        ];
        for (function, output) in outputs {
            self.calls.insert(
                (address, selector(&ERC20_CONTRACT, function)),
                abi::encode(&[output]).into(),
            );
        }

        self
    }

    pub fn with_reserves(mut self, pair: Address, (reserve0, reserve1): (u64, u64)) -> Self {
        let output = abi::encode(&[
            AbiToken::Uint(reserve0.into()),
            AbiToken::Uint(reserve1.into()),
            AbiToken::Uint(U256::zero()),
        ]);
        self.calls.insert((pair, selector(&PAIR_CONTRACT, "getReserves")), output.into());

        self
    }

    /// `getReserves` answers with bytes that do not decode
    pub fn with_garbled_reserves(mut self, pair: Address) -> Self {
        self.calls.insert(
            (pair, selector(&PAIR_CONTRACT, "getReserves")),
            Bytes::from(vec![0xde, 0xad]),
        );

        self
    }

    /// Serves the transaction without a gas price, leaving it to the receipt
    pub fn without_gas_price(mut self, hash: TxHash, effective_gas_price: U256) -> Self {
        if let Some(transaction) = self.transactions.get_mut(&hash) {
            transaction.gas_price = None;
        }
        self.receipts.insert(
            hash,
            TransactionReceipt {
                transaction_hash: hash,
                effective_gas_price: Some(effective_gas_price),
                ..Default::default()
            },
        );

        self
    }

    /// The next `get_logs` calls fail with these messages, in order
    pub fn fail_get_logs(self, messages: &[&str]) -> Self {
        self.get_logs_failures
            .lock()
            .unwrap()
            .extend(messages.iter().map(|message| message.to_string()));

        self
    }

    pub fn requested_ranges(&self) -> Vec<(u64, u64)> {
        self.requested_ranges.lock().unwrap().clone()
    }

    pub fn reserve_blocks(&self) -> Vec<u64> {
        self.reserve_blocks.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn matches(filter: &EthersFilter, log: &Log) -> bool {
        let address_matches = match &filter.address {
            Some(ValueOrArray::Value(address)) => log.address == *address,
            Some(ValueOrArray::Array(addresses)) => addresses.contains(&log.address),
            None => true,
        };
        let topic_matches = match &filter.topics[0] {
            Some(ValueOrArray::Value(Some(topic))) => log.topics.first() == Some(topic),
            _ => true,
        };
        let block_number = log.block_number.unwrap_or_default();
        let in_range = filter.get_from_block().map_or(true, |from| block_number >= from)
            && filter.get_to_block().map_or(true, |to| block_number <= to);

        address_matches && topic_matches && in_range
    }
}

fn provider_error(message: &str) -> ProviderError {
    ProviderError::CustomError(message.to_string())
}

#[async_trait::async_trait]
impl Provider for FakeProvider {
    async fn get_block_number(&self) -> Result<U64, ProviderError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            Err(provider_error("error sending request for url: connection refused"))
        } else {
            Ok(U64::from(self.head))
        }
    }

    async fn get_logs(&self, filter: &EthersFilter) -> Result<Vec<Log>, ProviderError> {
        let range = (
            filter.get_from_block().unwrap_or_default().as_u64(),
            filter.get_to_block().unwrap_or_default().as_u64(),
        );
        self.requested_ranges.lock().unwrap().push(range);

        if let Some(message) = self.get_logs_failures.lock().unwrap().pop_front() {
            return Err(provider_error(&message));
        }

        Ok(self.logs.iter().filter(|log| Self::matches(filter, log)).cloned().collect())
    }

    async fn get_block(
        &self,
        block_number: U64,
    ) -> Result<Option<EthersBlock<TxHash>>, ProviderError> {
        Ok(self.blocks.get(&block_number.as_u64()).cloned())
    }

    async fn get_transaction(
        &self,
        hash: TxHash,
    ) -> Result<Option<EthersTransaction>, ProviderError> {
        Ok(self.transactions.get(&hash).cloned())
    }

    async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        Ok(self.receipts.get(&hash).cloned())
    }

    async fn call(
        &self,
        tx: &TypedTransaction,
        block: Option<BlockId>,
    ) -> Result<Bytes, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let address = tx.to().and_then(|to| to.as_address()).copied().unwrap_or_default();
        let data = tx.data().cloned().unwrap_or_default();
        let mut function_selector = [0u8; 4];
        function_selector.copy_from_slice(&data[..4]);

        if function_selector == selector(&PAIR_CONTRACT, "getReserves") {
            if let Some(BlockId::Number(BlockNumber::Number(number))) = block {
                self.reserve_blocks.lock().unwrap().push(number.as_u64());
            }
        }

        self.calls
            .get(&(address, function_selector))
            .cloned()
            .ok_or_else(|| provider_error("execution reverted"))
    }
}
