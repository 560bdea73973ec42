use ethers::prelude::Middleware;
use ethers::providers::{Http, Provider as EthersProvider, ProviderError as EthersProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Block, BlockId, Bytes, Filter as EthersFilter, Log, Transaction, TransactionReceipt, TxHash,
    U64,
};

pub type ProviderError = EthersProviderError;

pub type HttpProvider = EthersProvider<Http>;

/// The chain reads the pipeline needs from a JSON-RPC endpoint
#[async_trait::async_trait]
pub trait Provider: Sync + Send {
    async fn get_block_number(&self) -> Result<U64, ProviderError>;
    async fn get_logs(&self, filter: &EthersFilter) -> Result<Vec<Log>, ProviderError>;
    async fn get_block(&self, block_number: U64) -> Result<Option<Block<TxHash>>, ProviderError>;
    async fn get_transaction(&self, hash: TxHash) -> Result<Option<Transaction>, ProviderError>;
    async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, ProviderError>;
    async fn call(
        &self,
        tx: &TypedTransaction,
        block: Option<BlockId>,
    ) -> Result<Bytes, ProviderError>;

    /// An endpoint is usable when it answers with the chain head
    async fn is_healthy(&self) -> bool {
        self.get_block_number().await.is_ok()
    }
}

#[async_trait::async_trait]
impl Provider for EthersProvider<Http> {
    async fn get_block_number(&self) -> Result<U64, ProviderError> {
        Middleware::get_block_number(self).await
    }

    async fn get_logs(&self, filter: &EthersFilter) -> Result<Vec<Log>, ProviderError> {
        Middleware::get_logs(self, filter).await
    }

    async fn get_block(&self, block_number: U64) -> Result<Option<Block<TxHash>>, ProviderError> {
        Middleware::get_block(self, block_number).await
    }

    async fn get_transaction(&self, hash: TxHash) -> Result<Option<Transaction>, ProviderError> {
        Middleware::get_transaction(self, hash).await
    }

    async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        Middleware::get_transaction_receipt(self, hash).await
    }

    async fn call(
        &self,
        tx: &TypedTransaction,
        block: Option<BlockId>,
    ) -> Result<Bytes, ProviderError> {
        Middleware::call(self, tx, block).await
    }
}
