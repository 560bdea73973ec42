pub mod schema {
    diesel::table! {
      dex (name) {
          name -> VarChar,
          router_address -> VarChar,
          factory_address -> VarChar,
      }
    }

    diesel::table! {
      token (address) {
          address -> VarChar,
          name -> VarChar,
          symbol -> VarChar,
          decimals -> Int2,
      }
    }

    diesel::table! {
      block (number) {
          number -> Int8,
          timestamp -> Timestamptz,
      }
    }

    diesel::table! {
      tx (hash) {
          hash -> VarChar,
          block_number -> Int8,
          position -> Int8,
          gas_price -> Numeric,
      }
    }

    diesel::table! {
      dex_trade_pair (address) {
          address -> VarChar,
          dex_name -> VarChar,
          token_address -> VarChar,
          creator_tx_hash -> VarChar,
          is_base_token0 -> Bool,
      }
    }

    diesel::table! {
      dex_trade (id) {
          id -> Int8,
          pair_address -> VarChar,
          tx_hash -> VarChar,
          log_index -> Int8,
          token_in -> Nullable<Numeric>,
          token_out -> Nullable<Numeric>,
          base_in -> Nullable<Numeric>,
          base_out -> Nullable<Numeric>,
          token_delta -> Nullable<Numeric>,
          base_delta -> Nullable<Numeric>,
      }
    }

    diesel::joinable!(tx -> block (block_number));
    diesel::joinable!(dex_trade_pair -> dex (dex_name));
    diesel::joinable!(dex_trade_pair -> token (token_address));
    diesel::joinable!(dex_trade_pair -> tx (creator_tx_hash));
    diesel::joinable!(dex_trade -> dex_trade_pair (pair_address));
    diesel::joinable!(dex_trade -> tx (tx_hash));

    diesel::allow_tables_to_appear_in_same_query!(dex, token, block, tx, dex_trade_pair, dex_trade);
}
