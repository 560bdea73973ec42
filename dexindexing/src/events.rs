mod params;

use ethers::types::{Address, Log, TxHash, U256};

use crate::contracts::{ContractEvent, PAIR_CREATED_EVENT, SWAP_EVENT, SYNC_EVENT};

use params::EventParams;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum EventDecodeError {
    #[display("Log is missing {_0}")]
    MissingLogField(&'static str),
    #[display("Log is missing parameter {_0}")]
    MissingParam(&'static str),
    #[display("ABI Error: {_0}")]
    Abi(String),
}

/// Where a log sits on chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogPosition {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub log_index: u64,
}

impl LogPosition {
    fn from_log(log: &Log) -> Result<Self, EventDecodeError> {
        Ok(Self {
            transaction_hash: log
                .transaction_hash
                .ok_or(EventDecodeError::MissingLogField("transactionHash"))?,
            block_number: log
                .block_number
                .ok_or(EventDecodeError::MissingLogField("blockNumber"))?
                .as_u64(),
            log_index: log.log_index.ok_or(EventDecodeError::MissingLogField("logIndex"))?.as_u64(),
        })
    }
}

/// A factory's PairCreated log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairCreatedEvent {
    pub token0: Address,
    pub token1: Address,
    pub pair: Address,
    pub position: LogPosition,
}

impl PairCreatedEvent {
    pub fn decode(log: &Log) -> Result<Self, EventDecodeError> {
        let params = EventParams::parse(&PAIR_CREATED_EVENT, log)?;

        Ok(Self {
            token0: params.get_address("token0")?,
            token1: params.get_address("token1")?,
            pair: params.get_address("pair")?,
            position: LogPosition::from_log(log)?,
        })
    }

    pub fn involves(&self, address: &Address) -> bool {
        self.token0 == *address || self.token1 == *address
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapEvent {
    pub amount0_in: U256,
    pub amount1_in: U256,
    pub amount0_out: U256,
    pub amount1_out: U256,
    pub position: LogPosition,
}

impl SwapEvent {
    pub fn decode(log: &Log) -> Result<Self, EventDecodeError> {
        let params = EventParams::parse(&SWAP_EVENT, log)?;

        Ok(Self {
            amount0_in: params.get_uint("amount0In")?,
            amount1_in: params.get_uint("amount1In")?,
            amount0_out: params.get_uint("amount0Out")?,
            amount1_out: params.get_uint("amount1Out")?,
            position: LogPosition::from_log(log)?,
        })
    }
}

/// Reserves of a pair as (reserve0, reserve1)
pub type Reserves = (U256, U256);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub reserve0: U256,
    pub reserve1: U256,
    /// Reserves right before this log, when already known from an earlier
    /// Sync log of the same pair
    pub previous_reserves: Option<Reserves>,
    pub position: LogPosition,
}

impl SyncEvent {
    pub fn decode(log: &Log) -> Result<Self, EventDecodeError> {
        let params = EventParams::parse(&SYNC_EVENT, log)?;

        Ok(Self {
            reserve0: params.get_uint("reserve0")?,
            reserve1: params.get_uint("reserve1")?,
            previous_reserves: None,
            position: LogPosition::from_log(log)?,
        })
    }

    pub fn reserves(&self) -> Reserves {
        (self.reserve0, self.reserve1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeEvent {
    Swap(SwapEvent),
    Sync(SyncEvent),
}

impl TradeEvent {
    pub fn position(&self) -> &LogPosition {
        match self {
            TradeEvent::Swap(swap) => &swap.position,
            TradeEvent::Sync(sync) => &sync.position,
        }
    }
}

/// Which pair log a scan turns into Trades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradeEventKind {
    #[default]
    Swap,
    Sync,
}

impl TradeEventKind {
    pub fn contract_event(&self) -> &'static ContractEvent {
        match self {
            TradeEventKind::Swap => &SWAP_EVENT,
            TradeEventKind::Sync => &SYNC_EVENT,
        }
    }

    pub fn decode(&self, log: &Log) -> Result<TradeEvent, EventDecodeError> {
        match self {
            TradeEventKind::Swap => SwapEvent::decode(log).map(TradeEvent::Swap),
            TradeEventKind::Sync => SyncEvent::decode(log).map(TradeEvent::Sync),
        }
    }

    /// Decodes a window's logs in chain order. Sync logs are chained so each
    /// one knows the reserves left by the previous one.
    pub fn decode_all(&self, logs: &[Log]) -> (Vec<TradeEvent>, Vec<EventDecodeError>) {
        let mut events = vec![];
        let mut errors = vec![];

        for log in logs {
            match self.decode(log) {
                Ok(event) => events.push(event),
                Err(error) => errors.push(error),
            }
        }

        events.sort_by_key(|event| {
            let position = event.position();
            (position.block_number, position.log_index)
        });

        let mut previous_reserves = None;
        for event in events.iter_mut() {
            if let TradeEvent::Sync(sync) = event {
                sync.previous_reserves = previous_reserves;
                previous_reserves = Some(sync.reserves());
            }
        }

        (events, errors)
    }
}
