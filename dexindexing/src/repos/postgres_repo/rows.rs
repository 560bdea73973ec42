use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable};
use ethers::types::{Address, TxHash, I256, U256};

use crate::diesel::schema::{block, dex, dex_trade, dex_trade_pair, token, tx};
use crate::entities::{Block, Token, TradeAmounts, Trade, TradingPair, Transaction};
use crate::exchanges::Exchange;
use crate::hashes::Hashes;
use crate::repos::RepoError;

#[derive(Debug, Insertable)]
#[diesel(table_name = dex)]
pub struct DexRow {
    pub name: String,
    pub router_address: String,
    pub factory_address: String,
}

impl From<&Exchange> for DexRow {
    fn from(exchange: &Exchange) -> Self {
        Self {
            name: exchange.name.to_string(),
            router_address: exchange.router_address.to_string(),
            factory_address: exchange.factory_address.to_string(),
        }
    }
}

#[derive(Debug, Insertable, Queryable)]
#[diesel(table_name = token)]
pub struct TokenRow {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: i16,
}

impl From<&Token> for TokenRow {
    fn from(token: &Token) -> Self {
        Self {
            address: Hashes::address_to_string(&token.address),
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            decimals: token.decimals as i16,
        }
    }
}

impl TokenRow {
    pub fn into_token(self) -> Result<Token, RepoError> {
        Ok(Token {
            address: parse_address(&self.address)?,
            name: self.name,
            symbol: self.symbol,
            decimals: u8::try_from(self.decimals)
                .map_err(|_| RepoError::Unknown(format!("token decimals {}", self.decimals)))?,
        })
    }
}

#[derive(Debug, Insertable, Queryable)]
#[diesel(table_name = block)]
pub struct BlockRow {
    pub number: i64,
    pub timestamp: DateTime<Utc>,
}

impl From<&Block> for BlockRow {
    fn from(block: &Block) -> Self {
        Self {
            number: block.number as i64,
            timestamp: block.timestamp,
        }
    }
}

impl From<BlockRow> for Block {
    fn from(row: BlockRow) -> Self {
        Block {
            number: row.number as u64,
            timestamp: row.timestamp,
        }
    }
}

#[derive(Debug, Insertable, Queryable)]
#[diesel(table_name = tx)]
pub struct TxRow {
    pub hash: String,
    pub block_number: i64,
    pub position: i64,
    pub gas_price: BigDecimal,
}

impl TxRow {
    pub fn try_from_transaction(transaction: &Transaction) -> Result<Self, RepoError> {
        Ok(Self {
            hash: Hashes::h256_to_string(&transaction.hash),
            block_number: transaction.block.number as i64,
            position: transaction.position as i64,
            gas_price: u256_to_numeric(transaction.gas_price)?,
        })
    }

    pub fn into_transaction(self, block: Block) -> Result<Transaction, RepoError> {
        Ok(Transaction {
            hash: parse_h256(&self.hash)?,
            block,
            position: self.position as u64,
            gas_price: numeric_to_u256(&self.gas_price)?,
        })
    }
}

#[derive(Debug, Insertable, Queryable)]
#[diesel(table_name = dex_trade_pair)]
pub struct TradingPairRow {
    pub address: String,
    pub dex_name: String,
    pub token_address: String,
    pub creator_tx_hash: String,
    pub is_base_token0: bool,
}

impl From<&TradingPair> for TradingPairRow {
    fn from(pair: &TradingPair) -> Self {
        Self {
            address: Hashes::address_to_string(&pair.address),
            dex_name: pair.exchange.name.to_string(),
            token_address: Hashes::address_to_string(&pair.token.address),
            creator_tx_hash: Hashes::h256_to_string(&pair.creator_transaction.hash),
            is_base_token0: pair.is_base_token0,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = dex_trade)]
pub struct NewTradeRow {
    pub pair_address: String,
    pub tx_hash: String,
    pub log_index: i64,
    pub token_in: Option<BigDecimal>,
    pub token_out: Option<BigDecimal>,
    pub base_in: Option<BigDecimal>,
    pub base_out: Option<BigDecimal>,
    pub token_delta: Option<BigDecimal>,
    pub base_delta: Option<BigDecimal>,
}

impl NewTradeRow {
    pub fn try_from_trade(trade: &Trade) -> Result<Self, RepoError> {
        let (token_in, token_out, base_in, base_out) = match trade.amounts {
            TradeAmounts::Raw {
                token_in,
                token_out,
                base_in,
                base_out,
            } => (
                Some(u256_to_numeric(token_in)?),
                Some(u256_to_numeric(token_out)?),
                Some(u256_to_numeric(base_in)?),
                Some(u256_to_numeric(base_out)?),
            ),
            TradeAmounts::Delta { .. } => (None, None, None, None),
        };
        let (token_delta, base_delta) = match trade.amounts.deltas() {
            Some((token_delta, base_delta)) => (
                Some(i256_to_numeric(token_delta)?),
                Some(i256_to_numeric(base_delta)?),
            ),
            None => (None, None),
        };

        Ok(Self {
            pair_address: Hashes::address_to_string(&trade.pair.address),
            tx_hash: Hashes::h256_to_string(&trade.transaction.hash),
            log_index: trade.log_index as i64,
            token_in,
            token_out,
            base_in,
            base_out,
            token_delta,
            base_delta,
        })
    }
}

#[derive(Debug, Queryable)]
#[diesel(table_name = dex_trade)]
pub struct TradeRow {
    pub id: i64,
    pub pair_address: String,
    pub tx_hash: String,
    pub log_index: i64,
    pub token_in: Option<BigDecimal>,
    pub token_out: Option<BigDecimal>,
    pub base_in: Option<BigDecimal>,
    pub base_out: Option<BigDecimal>,
    pub token_delta: Option<BigDecimal>,
    pub base_delta: Option<BigDecimal>,
}

impl TradeRow {
    /// Rows with all four raw amounts come from Swap logs, the rest from Sync logs
    pub fn amounts(&self) -> Result<TradeAmounts, RepoError> {
        match (
            &self.token_in,
            &self.token_out,
            &self.base_in,
            &self.base_out,
            &self.token_delta,
            &self.base_delta,
        ) {
            (Some(token_in), Some(token_out), Some(base_in), Some(base_out), _, _) => {
                Ok(TradeAmounts::Raw {
                    token_in: numeric_to_u256(token_in)?,
                    token_out: numeric_to_u256(token_out)?,
                    base_in: numeric_to_u256(base_in)?,
                    base_out: numeric_to_u256(base_out)?,
                })
            }
            (_, _, _, _, Some(token_delta), Some(base_delta)) => Ok(TradeAmounts::Delta {
                token_delta: numeric_to_i256(token_delta)?,
                base_delta: numeric_to_i256(base_delta)?,
            }),
            _ => Err(RepoError::Unknown(format!("dex_trade {} has no amounts", self.id))),
        }
    }
}

pub fn parse_address(value: &str) -> Result<Address, RepoError> {
    Hashes::parse_address(value).ok_or_else(|| RepoError::Unknown(format!("address {value}")))
}

pub fn parse_h256(value: &str) -> Result<TxHash, RepoError> {
    Hashes::parse_h256(value).ok_or_else(|| RepoError::Unknown(format!("hash {value}")))
}

fn u256_to_numeric(value: U256) -> Result<BigDecimal, RepoError> {
    BigDecimal::from_str(&value.to_string()).map_err(|error| RepoError::Unknown(error.to_string()))
}

fn i256_to_numeric(value: I256) -> Result<BigDecimal, RepoError> {
    BigDecimal::from_str(&value.to_string()).map_err(|error| RepoError::Unknown(error.to_string()))
}

/// NUMERIC(78,0) values may come back with a negative scale; rescaling keeps
/// the digits plain
fn integer_digits(value: &BigDecimal) -> String {
    let (digits, _) = value.with_scale(0).into_bigint_and_exponent();

    digits.to_string()
}

fn numeric_to_u256(value: &BigDecimal) -> Result<U256, RepoError> {
    U256::from_dec_str(&integer_digits(value))
        .map_err(|error| RepoError::Unknown(format!("uint256 {value}: {error}")))
}

fn numeric_to_i256(value: &BigDecimal) -> Result<I256, RepoError> {
    I256::from_dec_str(&integer_digits(value))
        .map_err(|error| RepoError::Unknown(format!("int256 {value}: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_full_uint256_precision() {
        let value = U256::MAX;

        let numeric = u256_to_numeric(value).unwrap();

        assert_eq!(numeric_to_u256(&numeric).unwrap(), value);
    }

    #[test]
    fn reads_numerics_with_negative_scale() {
        let numeric = BigDecimal::new(5.into(), -20);

        assert_eq!(
            numeric_to_u256(&numeric).unwrap(),
            U256::from(5) * U256::exp10(20)
        );
    }

    #[test]
    fn keeps_negative_deltas() {
        let numeric = i256_to_numeric(I256::from(-42)).unwrap();

        assert_eq!(numeric_to_i256(&numeric).unwrap(), I256::from(-42));
    }
}
