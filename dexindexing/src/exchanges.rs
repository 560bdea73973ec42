use ethers::types::Address;

use crate::networks::Network;

/// A decentralized exchange as registered at process start.
/// Never mutated, only looked up by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Exchange {
    pub name: &'static str,
    pub router_address: &'static str,
    pub factory_address: &'static str,
}

pub const PANCAKESWAP: Exchange = Exchange {
    name: "pancakeswap",
    router_address: "0x10ED43C718714eb63d5aA57B78B54704E256024E",
    factory_address: "0xcA143Ce32Fe78f1f7019d7d551a6402fC5350c73",
};

pub const APESWAP: Exchange = Exchange {
    name: "apeswap",
    router_address: "0xcF0feBd3f17CEf5b47b0cD257aCf6025c5BFf3b7",
    factory_address: "0x0841BD0B734E4F5853f0dD8d7Ea041c241fb0Da6",
};

pub const PANCAKESWAP_TESTNET: Exchange = Exchange {
    name: "pancakeswap-testnet",
    router_address: "0x9Ac64Cc6e4415144C455BD8E4837Fea55603e5c3",
    factory_address: "0xB7926C0430Afb07AA7DEfDE6DA862aE0Bde767bc",
};

pub const MAINNET_EXCHANGES: &[Exchange] = &[PANCAKESWAP, APESWAP];
pub const TESTNET_EXCHANGES: &[Exchange] = &[PANCAKESWAP_TESTNET];

impl Exchange {
    pub fn router(&self) -> Address {
        self.router_address.parse().expect("router address is valid")
    }

    pub fn factory(&self) -> Address {
        self.factory_address.parse().expect("factory address is valid")
    }

    /// Looks up a registered exchange across every network
    pub fn by_name(name: &str) -> Option<Exchange> {
        Network::ALL
            .iter()
            .flat_map(|network| network.exchanges().iter())
            .find(|exchange| exchange.name == name)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_registered_exchanges_by_name() {
        assert_eq!(Exchange::by_name("apeswap"), Some(APESWAP));
        assert_eq!(
            Exchange::by_name("pancakeswap-testnet"),
            Some(PANCAKESWAP_TESTNET)
        );
        assert_eq!(Exchange::by_name("sushiswap"), None);
    }

    #[test]
    fn parses_registry_addresses() {
        for exchange in MAINNET_EXCHANGES.iter().chain(TESTNET_EXCHANGES) {
            assert_ne!(exchange.factory(), Address::zero());
            assert_ne!(exchange.router(), Address::zero());
        }
    }
}
