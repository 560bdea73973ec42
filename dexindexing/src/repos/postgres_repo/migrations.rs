/// Raw DDL for the indexer's tables, in creation order
pub struct SQLikeMigrations;

impl SQLikeMigrations {
    pub fn reset_schema() -> &'static [&'static str] {
        &["DROP SCHEMA public CASCADE", "CREATE SCHEMA public"]
    }

    pub fn create_dex() -> &'static [&'static str] {
        &["CREATE TABLE IF NOT EXISTS dex (
                name VARCHAR PRIMARY KEY,
                router_address VARCHAR NOT NULL,
                factory_address VARCHAR NOT NULL
        )"]
    }

    pub fn create_token() -> &'static [&'static str] {
        &["CREATE TABLE IF NOT EXISTS token (
                address VARCHAR PRIMARY KEY,
                name VARCHAR NOT NULL,
                symbol VARCHAR NOT NULL,
                decimals SMALLINT NOT NULL
        )"]
    }

    pub fn create_block() -> &'static [&'static str] {
        &["CREATE TABLE IF NOT EXISTS block (
                number BIGINT PRIMARY KEY,
                timestamp TIMESTAMPTZ NOT NULL
        )"]
    }

    pub fn create_tx() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS tx (
                hash VARCHAR PRIMARY KEY,
                block_number BIGINT NOT NULL REFERENCES block(number),
                position BIGINT NOT NULL,
                gas_price NUMERIC(78,0) NOT NULL
        )",
            "CREATE INDEX IF NOT EXISTS tx_block_number_index ON tx(block_number)",
        ]
    }

    pub fn create_dex_trade_pair() -> &'static [&'static str] {
        &["CREATE TABLE IF NOT EXISTS dex_trade_pair (
                address VARCHAR PRIMARY KEY,
                dex_name VARCHAR NOT NULL REFERENCES dex(name),
                token_address VARCHAR NOT NULL REFERENCES token(address),
                creator_tx_hash VARCHAR NOT NULL REFERENCES tx(hash),
                is_base_token0 BOOLEAN NOT NULL
        )"]
    }

    pub fn create_dex_trade() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS dex_trade (
                id BIGSERIAL PRIMARY KEY,
                pair_address VARCHAR NOT NULL REFERENCES dex_trade_pair(address),
                tx_hash VARCHAR NOT NULL REFERENCES tx(hash),
                log_index BIGINT NOT NULL,
                token_in NUMERIC(78,0),
                token_out NUMERIC(78,0),
                base_in NUMERIC(78,0),
                base_out NUMERIC(78,0),
                token_delta NUMERIC(78,0),
                base_delta NUMERIC(78,0)
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS dex_trade_tx_hash_log_index
            ON dex_trade(tx_hash, log_index)",
            "CREATE INDEX IF NOT EXISTS dex_trade_pair_address_index ON dex_trade(pair_address)",
        ]
    }

    pub fn get_all() -> Vec<&'static str> {
        [
            Self::create_dex(),
            Self::create_token(),
            Self::create_block(),
            Self::create_tx(),
            Self::create_dex_trade_pair(),
            Self::create_dex_trade(),
        ]
        .concat()
    }
}
