use ethers::types::Address;

use crate::exchanges::{self, Exchange};

/// First main network block worth scanning: deployment of the earliest indexed factory
pub const MAINNET_GENESIS_BLOCK_NUMBER: u64 = 6_809_737;
pub const TESTNET_GENESIS_BLOCK_NUMBER: u64 = 1;

pub const MAINNET_BASE_CURRENCY: &str = "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c";
pub const TESTNET_BASE_CURRENCY: &str = "0xae13d989daC2f0dEbFf460aC112a837C89BAa7cd";

/// Sorted from best to worst
pub const MAINNET_JSON_RPC_URLS: &[&str] = &[
    "https://bsc-dataseed.binance.org/",
    "https://bsc-dataseed1.defibit.io/",
    "https://bsc-dataseed1.ninicoin.io/",
    "https://bsc-dataseed2.defibit.io/",
    "https://bsc-dataseed3.defibit.io/",
    "https://bsc-dataseed4.defibit.io/",
    "https://bsc-dataseed2.ninicoin.io/",
    "https://bsc-dataseed3.ninicoin.io/",
    "https://bsc-dataseed4.ninicoin.io/",
    "https://bsc-dataseed1.binance.org/",
    "https://bsc-dataseed2.binance.org/",
    "https://bsc-dataseed3.binance.org/",
    "https://bsc-dataseed4.binance.org/",
];

pub const TESTNET_JSON_RPC_URLS: &[&str] = &["https://data-seed-prebsc-2-s1.binance.org:8545/"];

/// The two networks indexed. Each has its own endpoint roster, base currency
/// and exchange registry, and they are never mixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::Mainnet, Network::Testnet];

    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::Testnet)
    }

    /// The network's wrapped native asset
    pub fn base_currency(&self) -> Address {
        let address = match self {
            Network::Mainnet => MAINNET_BASE_CURRENCY,
            Network::Testnet => TESTNET_BASE_CURRENCY,
        };

        address.parse().expect("base currency address is valid")
    }

    pub fn genesis_block_number(&self) -> u64 {
        match self {
            Network::Mainnet => MAINNET_GENESIS_BLOCK_NUMBER,
            Network::Testnet => TESTNET_GENESIS_BLOCK_NUMBER,
        }
    }

    pub fn json_rpc_urls(&self) -> &'static [&'static str] {
        match self {
            Network::Mainnet => MAINNET_JSON_RPC_URLS,
            Network::Testnet => TESTNET_JSON_RPC_URLS,
        }
    }

    pub fn exchanges(&self) -> &'static [Exchange] {
        match self {
            Network::Mainnet => exchanges::MAINNET_EXCHANGES,
            Network::Testnet => exchanges::TESTNET_EXCHANGES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_base_currencies_apart() {
        assert_ne!(
            Network::Mainnet.base_currency(),
            Network::Testnet.base_currency()
        );
    }

    #[test]
    fn every_network_has_a_roster_and_exchanges() {
        for network in Network::ALL {
            assert!(!network.json_rpc_urls().is_empty());
            assert!(!network.exchanges().is_empty());
        }
    }
}
