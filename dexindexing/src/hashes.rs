use std::str::FromStr;

use ethers::types::{Address, H256};
use ethers::utils::to_checksum;

/// Canonical string forms used as natural keys in the store
pub struct Hashes;

impl Hashes {
    /// Addresses are stored checksummed, the way exchanges publish them
    pub fn address_to_string(address: &Address) -> String {
        to_checksum(address, None)
    }

    pub fn h256_to_string(h256: &H256) -> String {
        format!("{h256:?}")
    }

    pub fn parse_address(value: &str) -> Option<Address> {
        Address::from_str(value).ok()
    }

    pub fn parse_h256(value: &str) -> Option<H256> {
        H256::from_str(value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_addresses_checksummed() {
        let address = Hashes::parse_address("0xbb4cdb9cbd36b01bd1cbaebf2de08d9173bc095c").unwrap();

        assert_eq!(
            Hashes::address_to_string(&address),
            "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"
        );
    }

    #[test]
    fn keeps_full_transaction_hashes() {
        let value = "0x83d751998ff98cd609bc9b18bb36bdef8659cde2f74d6d7a1b0fef2c2bf8f839";
        let hash = Hashes::parse_h256(value).unwrap();

        assert_eq!(Hashes::h256_to_string(&hash), value);
    }
}
