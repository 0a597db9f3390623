//! # Contract binding
//!
//! [`ReadableContract`] is the capability a data source needs from a contract:
//! named reads and event queries. [`ContractBinding`] implements it against an
//! ABI and a [`ChainReader`], and is the only place where a method name is
//! turned into calldata.

use async_trait::async_trait;
use ethers::abi::{Abi, Function, RawLog, Token};
use ethers::types::{Address, BlockNumber, Bytes, Filter, H256};
use std::fmt;
use std::sync::Arc;

use crate::chain::ChainReader;
use crate::error::CouncilError;
use crate::types::CallArg;

/// A decoded event log.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub block_number: Option<u64>,
    pub transaction_hash: Option<H256>,
    pub params: Vec<(String, Token)>,
}

impl EventRecord {
    pub fn param(&self, name: &str) -> Option<&Token> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

#[async_trait]
pub trait ReadableContract: Send + Sync {
    fn address(&self) -> Address;

    /// Calls a view method and returns its decoded outputs.
    async fn read(&self, method: &str, args: &[CallArg]) -> Result<Vec<Token>, CouncilError>;

    /// Logs of `event` in `[from_block, to_block]`. `None` bounds mean the
    /// genesis block and the latest block respectively.
    async fn query_events(
        &self,
        event: &str,
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> Result<Vec<EventRecord>, CouncilError>;
}

#[derive(Clone)]
pub struct ContractBinding {
    address: Address,
    abi: &'static Abi,
    reader: Arc<dyn ChainReader>,
}

impl fmt::Debug for ContractBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractBinding").field("address", &self.address).finish()
    }
}

impl ContractBinding {
    pub fn new(address: Address, abi: &'static Abi, reader: Arc<dyn ChainReader>) -> Self {
        Self { address, abi, reader }
    }

    pub fn abi(&self) -> &'static Abi {
        self.abi
    }

    fn function(&self, method: &str) -> Result<&'static Function, CouncilError> {
        self.abi
            .function(method)
            .map_err(|_| CouncilError::Abi(format!("unknown method {}", method)))
    }

    /// Calldata for `method(args)`.
    pub fn encode_call(&self, method: &str, args: &[CallArg]) -> Result<Bytes, CouncilError> {
        let function = self.function(method)?;
        let data = function.encode_input(&CallArg::tokens(args)?)?;
        Ok(Bytes::from(data))
    }
}

#[async_trait]
impl ReadableContract for ContractBinding {
    fn address(&self) -> Address {
        self.address
    }

    async fn read(&self, method: &str, args: &[CallArg]) -> Result<Vec<Token>, CouncilError> {
        let data = self.encode_call(method, args)?;
        let output = self.reader.call(self.address, data).await?;
        self.function(method)?
            .decode_output(output.as_ref())
            .map_err(|e| CouncilError::Decode(format!("{}: {}", method, e)))
    }

    async fn query_events(
        &self,
        event: &str,
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> Result<Vec<EventRecord>, CouncilError> {
        let event = self
            .abi
            .event(event)
            .map_err(|_| CouncilError::Abi(format!("unknown event {}", event)))?;

        let filter = Filter::new()
            .address(self.address)
            .topic0(event.signature())
            .from_block(from_block.unwrap_or(0))
            .to_block(to_block.map(BlockNumber::from).unwrap_or(BlockNumber::Latest));

        let logs = self.reader.get_logs(&filter).await?;
        logs.into_iter()
            .map(|log| {
                let parsed = event
                    .parse_log(RawLog {
                        topics: log.topics.clone(),
                        data: log.data.to_vec(),
                    })
                    .map_err(|e| CouncilError::Decode(format!("{}: {}", event.name, e)))?;
                Ok(EventRecord {
                    block_number: log.block_number.map(|b| b.as_u64()),
                    transaction_hash: log.transaction_hash,
                    params: parsed.params.into_iter().map(|p| (p.name, p.value)).collect(),
                })
            })
            .collect()
    }
}
