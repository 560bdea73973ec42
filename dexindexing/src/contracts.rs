use ethers::abi::{self, Abi, Detokenize, Event, HumanReadableParser, ParamType};
use ethers::contract::BaseContract;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockId, Bytes, TransactionRequest, H256};
use once_cell::sync::Lazy;

use crate::providers::{Provider, ProviderError};

pub const PAIR_CREATED_EVENT_ABI: &str =
    "event PairCreated(address indexed token0, address indexed token1, address pair, uint256 allPairsLength)";

pub const SWAP_EVENT_ABI: &str = "event Swap(address indexed sender, uint256 amount0In, uint256 amount1In, uint256 amount0Out, uint256 amount1Out, address indexed to)";

pub const SYNC_EVENT_ABI: &str = "event Sync(uint112 reserve0, uint112 reserve1)";

const ERC20_FUNCTIONS: &[&str] = &[
    "function name() external view returns (string)",
    "function symbol() external view returns (string)",
    "function decimals() external view returns (uint8)",
];

const PAIR_FUNCTIONS: &[&str] = &[
    "function token0() external view returns (address)",
    "function token1() external view returns (address)",
    "function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)",
];

pub type ContractEventTopic = H256;

#[derive(Debug, Clone)]
pub struct ContractEvent {
    pub abi: &'static str,
    pub value: Event,
}

impl ContractEvent {
    fn new(abi: &'static str) -> Self {
        Self {
            abi,
            value: HumanReadableParser::parse_event(abi).expect("event abi is valid"),
        }
    }

    pub fn topic(&self) -> ContractEventTopic {
        self.value.signature()
    }
}

pub static PAIR_CREATED_EVENT: Lazy<ContractEvent> =
    Lazy::new(|| ContractEvent::new(PAIR_CREATED_EVENT_ABI));
pub static SWAP_EVENT: Lazy<ContractEvent> = Lazy::new(|| ContractEvent::new(SWAP_EVENT_ABI));
pub static SYNC_EVENT: Lazy<ContractEvent> = Lazy::new(|| ContractEvent::new(SYNC_EVENT_ABI));

pub static ERC20_CONTRACT: Lazy<BaseContract> = Lazy::new(|| base_contract(ERC20_FUNCTIONS));
pub static PAIR_CONTRACT: Lazy<BaseContract> = Lazy::new(|| base_contract(PAIR_FUNCTIONS));

fn base_contract(functions: &[&str]) -> BaseContract {
    let abi: Abi = abi::parse_abi(functions).expect("function abis are valid");

    BaseContract::from(abi)
}

#[derive(Debug, derive_more::Display)]
pub enum ContractCallError {
    #[display("Provider Error: {_0}")]
    Provider(ProviderError),
    #[display("ABI Error: {_0}")]
    Abi(String),
}

impl ContractCallError {
    /// The node executed the call and the contract reverted
    pub fn is_revert(&self) -> bool {
        match self {
            ContractCallError::Provider(error) => {
                error.to_string().to_lowercase().contains("revert")
            }
            ContractCallError::Abi(_) => false,
        }
    }
}

impl From<ProviderError> for ContractCallError {
    fn from(value: ProviderError) -> Self {
        ContractCallError::Provider(value)
    }
}

pub async fn call_raw<P: Provider + ?Sized>(
    provider: &P,
    contract: &BaseContract,
    address: Address,
    function: &str,
    block: Option<BlockId>,
) -> Result<Bytes, ContractCallError> {
    let data = contract
        .encode(function, ())
        .map_err(|error| ContractCallError::Abi(error.to_string()))?;
    let request: TypedTransaction = TransactionRequest::new().to(address).data(data).into();

    Ok(provider.call(&request, block).await?)
}

pub async fn call<P: Provider + ?Sized, D: Detokenize>(
    provider: &P,
    contract: &BaseContract,
    address: Address,
    function: &str,
    block: Option<BlockId>,
) -> Result<D, ContractCallError> {
    let output = call_raw(provider, contract, address, function, block).await?;

    contract
        .decode_output(function, output)
        .map_err(|error| ContractCallError::Abi(error.to_string()))
}

/// Some early tokens return `bytes32` for `name()` and `symbol()`
pub fn decode_string_or_bytes32(output: &[u8]) -> Option<String> {
    if let Ok(mut tokens) = abi::decode(&[ParamType::String], output) {
        return tokens.pop().and_then(|token| token.into_string());
    }

    let bytes = abi::decode(&[ParamType::FixedBytes(32)], output)
        .ok()?
        .pop()?
        .into_fixed_bytes()?;
    let trimmed: Vec<u8> = bytes.into_iter().take_while(|byte| *byte != 0).collect();

    String::from_utf8(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use ethers::abi::Token;

    use super::*;
    use crate::hashes::Hashes;

    #[test]
    fn decodes_string_names() {
        let output = abi::encode(&[Token::String("Wrapped BNB".to_string())]);

        assert_eq!(
            decode_string_or_bytes32(&output),
            Some("Wrapped BNB".to_string())
        );
    }

    #[test]
    fn decodes_bytes32_names() {
        let mut name = [0u8; 32];
        name[..3].copy_from_slice(b"MKR");
        let output = abi::encode(&[Token::FixedBytes(name.to_vec())]);

        assert_eq!(decode_string_or_bytes32(&output), Some("MKR".to_string()));
    }

    #[test]
    fn uses_canonical_event_topics() {
        assert_eq!(
            Hashes::h256_to_string(&SWAP_EVENT.topic()),
            "0xd78ad95fa46c994b6551d0da85fc275fe613ce37657fb8d5e3d130840159d822"
        );
        assert_eq!(
            Hashes::h256_to_string(&SYNC_EVENT.topic()),
            "0x1c411e9a96e071241c2f21f7726b17ae89e3cab4c78be50e062b03a9fffbbad1"
        );
        assert_eq!(
            Hashes::h256_to_string(&PAIR_CREATED_EVENT.topic()),
            "0x0d3648bd0f6ba80134a33ba9275ac585d9d315f0ad8355cddefde31afa28d0e9"
        );
    }
}
