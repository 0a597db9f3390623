//! # Chain interfaces
//!
//! The SDK never talks to a node directly. Reads go through [`ChainReader`] and
//! state-changing calls through [`ChainWriter`], so the data sources and the
//! mutation layer can run against a live provider ([`RpcChain`]) or an
//! in-memory chain in tests.
//!
//! Both traits work at the calldata level: encoding and decoding against a
//! contract ABI is done once, in [`ContractBinding`].
//!
//! [`RpcChain`]: crate::rpc_chain::RpcChain
//! [`ContractBinding`]: crate::contract_binding::ContractBinding

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, Filter, Log, H256, U256};
use serde::Serialize;

use crate::error::CouncilError;

/// Read-only access to the chain.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `eth_call` against `to` with encoded `data`, returning the raw return data.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, CouncilError>;

    /// Logs matching `filter`, in chain order.
    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, CouncilError>;

    async fn block_number(&self) -> Result<u64, CouncilError>;
}

/// Transaction submission and confirmation, signed by an `S`.
#[async_trait]
pub trait ChainWriter<S: Signer = LocalWallet>: Send + Sync {
    /// Signs and broadcasts a call to `to`. Returns once the node accepted it.
    async fn submit(&self, to: Address, data: Bytes, signer: &S) -> Result<PendingTx, CouncilError>;

    /// Resolves once `tx` is mined. A mined-but-reverted transaction is a
    /// [`CouncilError::Revert`].
    async fn wait_for_confirmation(&self, tx: &PendingTx) -> Result<TxReceipt, CouncilError>;
}

/// Handle of a broadcast transaction that has not been confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTx {
    pub hash: H256,
    pub from: Address,
    pub to: Address,
    pub submitted_at: DateTime<Utc>,
}

impl PendingTx {
    pub fn new(hash: H256, from: Address, to: Address) -> Self {
        Self {
            hash,
            from,
            to,
            submitted_at: Utc::now(),
        }
    }

    /// Block explorer link, e.g. `https://etherscan.io/tx/0x…`.
    pub fn explorer_url(&self, tx_url_base: &str) -> String {
        format!("{}/{:?}", tx_url_base.trim_end_matches('/'), self.hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

impl From<ethers::types::TransactionReceipt> for TxReceipt {
    fn from(r: ethers::types::TransactionReceipt) -> Self {
        Self {
            hash: r.transaction_hash,
            block_number: r.block_number.map(|b| b.as_u64()),
            gas_used: r.gas_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explorer_url_joins_base_and_hash() {
        let tx = PendingTx::new(H256::from_low_u64_be(0xabc), Address::zero(), Address::zero());
        let url = tx.explorer_url("https://etherscan.io/tx/");
        assert_eq!(
            url,
            "https://etherscan.io/tx/0x0000000000000000000000000000000000000000000000000000000000000abc"
        );
    }
}
