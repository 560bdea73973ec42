use std::sync::Arc;

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::upsert::excluded;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager};
use ethers::types::{Address, TxHash};

use super::rows::{
    parse_address, parse_h256, BlockRow, DexRow, NewTradeRow, TokenRow, TradeRow,
    TradingPairRow, TxRow,
};
use super::Conn;
use crate::diesel::schema::{block, dex, dex_trade, dex_trade_pair, token, tx};
use crate::entities::{Block, Entity, Token, Trade, TradingPair, Transaction};
use crate::exchanges::Exchange;
use crate::hashes::Hashes;
use crate::repos::{RepoError, RepoSession};

/// Owns one pooled connection for its whole life. An outer transaction is
/// always open; each merge runs in a nested savepoint.
pub struct PostgresSession {
    conn: Conn,
}

impl PostgresSession {
    pub(super) async fn begin(mut conn: Conn) -> Result<Self, RepoError> {
        AnsiTransactionManager::begin_transaction(&mut *conn).await.map_err(query_error)?;

        Ok(Self { conn })
    }

    fn conn(&mut self) -> &mut AsyncPgConnection {
        &mut self.conn
    }

    async fn pair_from_row(&mut self, row: TradingPairRow) -> Result<TradingPair, RepoError> {
        let exchange = Exchange::by_name(&row.dex_name)
            .ok_or_else(|| RepoError::Unknown(format!("unregistered dex {}", row.dex_name)))?;
        let token = self
            .get_token(&parse_address(&row.token_address)?)
            .await?
            .ok_or_else(|| RepoError::MissingForeignKey(format!("token:{}", row.token_address)))?;
        let creator_transaction = self
            .get_transaction(&parse_h256(&row.creator_tx_hash)?)
            .await?
            .ok_or_else(|| RepoError::MissingForeignKey(format!("tx:{}", row.creator_tx_hash)))?;

        Ok(TradingPair {
            address: parse_address(&row.address)?,
            exchange,
            token,
            creator_transaction,
            is_base_token0: row.is_base_token0,
        })
    }

    async fn trade_from_row(
        &mut self,
        row: TradeRow,
        pair: Arc<TradingPair>,
    ) -> Result<Trade, RepoError> {
        let transaction = self
            .get_transaction(&parse_h256(&row.tx_hash)?)
            .await?
            .ok_or_else(|| RepoError::MissingForeignKey(format!("tx:{}", row.tx_hash)))?;

        Ok(Trade {
            pair,
            transaction,
            log_index: row.log_index as u64,
            amounts: row.amounts()?,
        })
    }

    async fn merge_entity(&mut self, entity: &Entity) -> Result<(), RepoError> {
        match entity {
            Entity::Exchange(exchange) => self.merge_exchange(exchange).await,
            Entity::Token(token) => self.merge_token(token).await,
            Entity::Block(block) => self.merge_block(block).await,
            Entity::Transaction(transaction) => self.merge_transaction(transaction).await,
            Entity::TradingPair(pair) => self.merge_trading_pair(pair).await,
            Entity::Trade(trade) => self.merge_trade(trade).await,
        }
    }

    async fn merge_exchange(&mut self, exchange: &Exchange) -> Result<(), RepoError> {
        diesel::insert_into(dex::table)
            .values(&DexRow::from(exchange))
            .on_conflict(dex::name)
            .do_update()
            .set((
                dex::router_address.eq(excluded(dex::router_address)),
                dex::factory_address.eq(excluded(dex::factory_address)),
            ))
            .execute(self.conn())
            .await
            .map_err(query_error)?;

        Ok(())
    }

    async fn merge_token(&mut self, token: &Token) -> Result<(), RepoError> {
        diesel::insert_into(token::table)
            .values(&TokenRow::from(token))
            .on_conflict(token::address)
            .do_update()
            .set((
                token::name.eq(excluded(token::name)),
                token::symbol.eq(excluded(token::symbol)),
                token::decimals.eq(excluded(token::decimals)),
            ))
            .execute(self.conn())
            .await
            .map_err(query_error)?;

        Ok(())
    }

    async fn merge_block(&mut self, block: &Block) -> Result<(), RepoError> {
        diesel::insert_into(block::table)
            .values(&BlockRow::from(block))
            .on_conflict(block::number)
            .do_update()
            .set(block::timestamp.eq(excluded(block::timestamp)))
            .execute(self.conn())
            .await
            .map_err(query_error)?;

        Ok(())
    }

    async fn merge_transaction(&mut self, transaction: &Transaction) -> Result<(), RepoError> {
        self.merge_block(&transaction.block).await?;

        let row = TxRow::try_from_transaction(transaction)?;
        diesel::insert_into(tx::table)
            .values(&row)
            .on_conflict(tx::hash)
            .do_update()
            .set((
                tx::block_number.eq(excluded(tx::block_number)),
                tx::position.eq(excluded(tx::position)),
                tx::gas_price.eq(excluded(tx::gas_price)),
            ))
            .execute(self.conn())
            .await
            .map_err(query_error)?;

        Ok(())
    }

    async fn merge_trading_pair(&mut self, pair: &TradingPair) -> Result<(), RepoError> {
        self.merge_token(&pair.token).await?;
        self.merge_transaction(&pair.creator_transaction).await?;

        diesel::insert_into(dex_trade_pair::table)
            .values(&TradingPairRow::from(pair))
            .on_conflict(dex_trade_pair::address)
            .do_update()
            .set((
                dex_trade_pair::dex_name.eq(excluded(dex_trade_pair::dex_name)),
                dex_trade_pair::token_address.eq(excluded(dex_trade_pair::token_address)),
                dex_trade_pair::creator_tx_hash.eq(excluded(dex_trade_pair::creator_tx_hash)),
                dex_trade_pair::is_base_token0.eq(excluded(dex_trade_pair::is_base_token0)),
            ))
            .execute(self.conn())
            .await
            .map_err(query_error)?;

        Ok(())
    }

    async fn merge_trade(&mut self, trade: &Trade) -> Result<(), RepoError> {
        self.merge_trading_pair(&trade.pair).await?;
        self.merge_transaction(&trade.transaction).await?;

        let row = NewTradeRow::try_from_trade(trade)?;
        diesel::insert_into(dex_trade::table)
            .values(&row)
            .on_conflict((dex_trade::tx_hash, dex_trade::log_index))
            .do_update()
            .set((
                dex_trade::pair_address.eq(excluded(dex_trade::pair_address)),
                dex_trade::token_in.eq(excluded(dex_trade::token_in)),
                dex_trade::token_out.eq(excluded(dex_trade::token_out)),
                dex_trade::base_in.eq(excluded(dex_trade::base_in)),
                dex_trade::base_out.eq(excluded(dex_trade::base_out)),
                dex_trade::token_delta.eq(excluded(dex_trade::token_delta)),
                dex_trade::base_delta.eq(excluded(dex_trade::base_delta)),
            ))
            .execute(self.conn())
            .await
            .map_err(query_error)?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl RepoSession for PostgresSession {
    async fn get_token(&mut self, address: &Address) -> Result<Option<Token>, RepoError> {
        let row = token::table
            .find(Hashes::address_to_string(address))
            .first::<TokenRow>(self.conn())
            .await
            .optional()
            .map_err(query_error)?;

        row.map(TokenRow::into_token).transpose()
    }

    async fn get_block(&mut self, number: u64) -> Result<Option<Block>, RepoError> {
        let row = block::table
            .find(number as i64)
            .first::<BlockRow>(self.conn())
            .await
            .optional()
            .map_err(query_error)?;

        Ok(row.map(Block::from))
    }

    async fn get_transaction(&mut self, hash: &TxHash) -> Result<Option<Transaction>, RepoError> {
        let row = tx::table
            .find(Hashes::h256_to_string(hash))
            .first::<TxRow>(self.conn())
            .await
            .optional()
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let block = self.get_block(row.block_number as u64).await?.ok_or_else(|| {
                    RepoError::MissingForeignKey(format!("block:{}", row.block_number))
                })?;

                row.into_transaction(block).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn get_trading_pair(
        &mut self,
        address: &Address,
    ) -> Result<Option<TradingPair>, RepoError> {
        let row = dex_trade_pair::table
            .find(Hashes::address_to_string(address))
            .first::<TradingPairRow>(self.conn())
            .await
            .optional()
            .map_err(query_error)?;

        match row {
            Some(row) => self.pair_from_row(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn get_trading_pairs(
        &mut self,
        exchanges: &[Exchange],
    ) -> Result<Vec<TradingPair>, RepoError> {
        let names: Vec<_> = exchanges.iter().map(|exchange| exchange.name.to_string()).collect();
        let rows = dex_trade_pair::table
            .filter(dex_trade_pair::dex_name.eq_any(names))
            .order(dex_trade_pair::address)
            .load::<TradingPairRow>(self.conn())
            .await
            .map_err(query_error)?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            pairs.push(self.pair_from_row(row).await?);
        }

        Ok(pairs)
    }

    async fn get_trade(
        &mut self,
        transaction_hash: &TxHash,
        log_index: u64,
    ) -> Result<Option<Trade>, RepoError> {
        let row = dex_trade::table
            .filter(dex_trade::tx_hash.eq(Hashes::h256_to_string(transaction_hash)))
            .filter(dex_trade::log_index.eq(log_index as i64))
            .first::<TradeRow>(self.conn())
            .await
            .optional()
            .map_err(query_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let pair = self
            .get_trading_pair(&parse_address(&row.pair_address)?)
            .await?
            .ok_or_else(|| RepoError::MissingForeignKey(format!("pair:{}", row.pair_address)))?;

        self.trade_from_row(row, Arc::new(pair)).await.map(Some)
    }

    async fn get_trades_by_pair(
        &mut self,
        pair: &Arc<TradingPair>,
    ) -> Result<Vec<Trade>, RepoError> {
        let rows = dex_trade::table
            .filter(dex_trade::pair_address.eq(Hashes::address_to_string(&pair.address)))
            .order(dex_trade::id)
            .load::<TradeRow>(self.conn())
            .await
            .map_err(query_error)?;

        let mut trades = Vec::with_capacity(rows.len());
        for row in rows {
            trades.push(self.trade_from_row(row, pair.clone()).await?);
        }

        Ok(trades)
    }

    async fn get_last_block_number(&mut self) -> Result<Option<u64>, RepoError> {
        let max_block_number = tx::table
            .select(diesel::dsl::max(tx::block_number))
            .first::<Option<i64>>(self.conn())
            .await
            .map_err(query_error)?;

        Ok(max_block_number.map(|number| number as u64))
    }

    async fn merge(&mut self, entity: &Entity) -> Result<(), RepoError> {
        AnsiTransactionManager::begin_transaction(self.conn()).await.map_err(query_error)?;

        match self.merge_entity(entity).await {
            Ok(()) => {
                AnsiTransactionManager::commit_transaction(self.conn()).await.map_err(query_error)
            }
            Err(error) => {
                AnsiTransactionManager::rollback_transaction(self.conn())
                    .await
                    .map_err(query_error)?;

                Err(error)
            }
        }
    }

    async fn commit(&mut self) -> Result<(), RepoError> {
        let committed =
            AnsiTransactionManager::commit_transaction(self.conn()).await.map_err(query_error);

        if committed.is_err() {
            // A failed COMMIT can leave the outer transaction open
            let _ = AnsiTransactionManager::rollback_transaction(self.conn()).await;
        }
        AnsiTransactionManager::begin_transaction(self.conn()).await.map_err(query_error)?;

        committed
    }
}

fn query_error(error: DieselError) -> RepoError {
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            RepoError::MissingForeignKey(info.message().to_string())
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            RepoError::NotConnected
        }
        error => RepoError::Query(error.to_string()),
    }
}
