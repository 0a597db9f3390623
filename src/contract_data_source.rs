//! # Contract Data Source
//!
//! Single point of read access to one contract. Every read goes through the
//! session's [`QueryCache`] under a key built from the contract address, the
//! method name and the arguments, so identical reads are collapsed and served
//! from cache until invalidated.

use ethers::abi::Token;
use ethers::types::Address;
use std::future::Future;
use std::sync::Arc;

use crate::contract_binding::ReadableContract;
use crate::error::{CouncilError, SharedError};
use crate::query_cache::{CacheKey, QueryCache};
use crate::types::CallArg;

pub struct ContractDataSource<C> {
    contract: Arc<C>,
    cache: Arc<QueryCache>,
}

impl<C> Clone for ContractDataSource<C> {
    fn clone(&self) -> Self {
        Self {
            contract: Arc::clone(&self.contract),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<C> ContractDataSource<C>
where
    C: ReadableContract + 'static,
{
    pub fn new(contract: C, cache: Arc<QueryCache>) -> Self {
        Self {
            contract: Arc::new(contract),
            cache,
        }
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Key under which `method(args)` on this contract is cached.
    pub fn key(&self, method: &str, args: Vec<CallArg>) -> CacheKey {
        CacheKey::new(self.contract.address(), method, args)
    }

    /// Cached view call.
    pub async fn call(&self, method: &str, args: Vec<CallArg>) -> Result<Vec<Token>, SharedError> {
        let key = self.key(method, args.clone());
        let contract = Arc::clone(&self.contract);
        let method = method.to_string();
        self.cache
            .get_or_fetch(key, async move { contract.read(&method, &args).await })
            .await
    }

    /// Cached arbitrary read (e.g. an event query), keyed like a call to
    /// `name(key_args)` on this contract.
    pub async fn cached<T, F, Fut>(
        &self,
        name: &str,
        key_args: Vec<CallArg>,
        producer: F,
    ) -> Result<T, SharedError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Arc<C>) -> Fut,
        Fut: Future<Output = Result<T, CouncilError>> + Send + 'static,
    {
        let key = self.key(name, key_args);
        self.cache
            .get_or_fetch(key, producer(Arc::clone(&self.contract)))
            .await
    }
}
