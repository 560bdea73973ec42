use ethers::types::{TxHash, U256};

use super::Block;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub hash: TxHash,
    pub block: Block,
    /// Index of the transaction within its block
    pub position: u64,
    pub gas_price: U256,
}
