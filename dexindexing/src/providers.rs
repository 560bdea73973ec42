mod error_class;
mod pool;
mod provider;

pub use error_class::{classify, RpcErrorClass};
pub use pool::{Endpoint, ProviderPool, ProviderPoolError, WorkerId};
pub use provider::{HttpProvider, Provider, ProviderError};
