// src/rpc_chain.rs

use crate::chain::{ChainReader, ChainWriter, PendingTx, TxReceipt};
use crate::error::CouncilError;
use crate::metrics;
use crate::settings::Rpc;
use async_trait::async_trait;
use ethers::prelude::{Http, Middleware, PendingTransaction, Provider, SignerMiddleware};
use ethers::providers::ProviderError;
use ethers::signers::Signer;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Filter, Log, TransactionRequest, U64};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::{debug, info, warn};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

type DefaultDirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// [`ChainReader`] and [`ChainWriter`] over a single HTTP JSON-RPC endpoint.
///
/// Every request waits on a shared QPS limiter. Reads that fail at the
/// transport level are retried with jittered exponential backoff; writes are
/// sent exactly once.
pub struct RpcChain {
    provider: Arc<Provider<Http>>,
    url: String,
    limiter: Arc<DefaultDirectRateLimiter>,
    chain_id: u64,
    confirmations: usize,
    read_retries: usize,
    retry_base_delay_ms: u64,
}

impl std::fmt::Debug for RpcChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChain")
            .field("url", &self.url)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl RpcChain {
    pub fn new(rpc: &Rpc) -> Result<Self, CouncilError> {
        let quota = Quota::per_second(
            NonZeroU32::new(rpc.qps_limit)
                .ok_or_else(|| CouncilError::Config("QPS must be non-zero".into()))?,
        );
        let provider = Provider::<Http>::try_from(rpc.http_url.as_str()).map_err(|e| {
            CouncilError::Config(format!("invalid RPC url {}: {}", rpc.http_url, e))
        })?;

        info!(
            "RPC chain {} on {} ({} qps, {} read retries)",
            rpc.chain_id, rpc.http_url, rpc.qps_limit, rpc.read_retries
        );

        Ok(Self {
            provider: Arc::new(provider),
            url: rpc.http_url.clone(),
            limiter: Arc::new(RateLimiter::direct(quota)),
            chain_id: rpc.chain_id,
            confirmations: rpc.confirmations,
            read_retries: rpc.read_retries,
            retry_base_delay_ms: rpc.retry_base_delay_ms,
        })
    }

    pub fn provider(&self) -> Arc<Provider<Http>> {
        Arc::clone(&self.provider)
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        // 2^n * factor ms: base, 2*base, 4*base, ...
        ExponentialBackoff::from_millis(2)
            .factor((self.retry_base_delay_ms / 2).max(1))
            .max_delay(MAX_RETRY_DELAY)
            .map(jitter)
            .take(self.read_retries)
    }

    /// Runs a rate-limited, retried read and records it.
    async fn read<T, F, Fut>(&self, method: &'static str, op: F) -> Result<T, CouncilError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let op = &op;
        RetryIf::spawn(
            self.retry_strategy(),
            move || async move {
                self.limiter.until_ready().await;
                let start = Instant::now();
                let result = op().await.map_err(CouncilError::from);
                metrics::record_rpc_call(method, start.elapsed(), result.is_ok());
                if let Err(e) = &result {
                    debug!("{} on {} failed: {}", method, self.url, e);
                }
                result
            },
            |e: &CouncilError| e.is_retryable(),
        )
        .await
    }
}

#[async_trait]
impl ChainReader for RpcChain {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, CouncilError> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        let (provider, tx) = (&self.provider, &tx);
        self.read("eth_call", move || provider.call(tx, None)).await
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, CouncilError> {
        let provider = &self.provider;
        self.read("eth_getLogs", move || provider.get_logs(filter)).await
    }

    async fn block_number(&self) -> Result<u64, CouncilError> {
        let provider = &self.provider;
        let block: U64 = self
            .read("eth_blockNumber", move || provider.get_block_number())
            .await?;
        Ok(block.as_u64())
    }
}

#[async_trait]
impl<S: Signer + Clone + 'static> ChainWriter<S> for RpcChain {
    async fn submit(&self, to: Address, data: Bytes, signer: &S) -> Result<PendingTx, CouncilError> {
        let wallet = signer.clone().with_chain_id(self.chain_id);
        let from = wallet.address();
        let client = SignerMiddleware::new(Arc::clone(&self.provider), wallet);
        let tx = TransactionRequest::new().from(from).to(to).data(data);

        self.limiter.until_ready().await;
        let start = Instant::now();
        let result = client.send_transaction(tx, None).await;
        metrics::record_rpc_call("eth_sendRawTransaction", start.elapsed(), result.is_ok());

        match result {
            Ok(pending) => {
                let hash = pending.tx_hash();
                debug!("Submitted {:?} from {:?} to {:?}", hash, from, to);
                Ok(PendingTx::new(hash, from, to))
            }
            Err(e) => Err(classify_send_error(e.to_string())),
        }
    }

    async fn wait_for_confirmation(&self, tx: &PendingTx) -> Result<TxReceipt, CouncilError> {
        let start = Instant::now();
        let receipt = PendingTransaction::new(tx.hash, &self.provider)
            .confirmations(self.confirmations)
            .await;
        metrics::record_rpc_call("eth_getTransactionReceipt", start.elapsed(), receipt.is_ok());

        let receipt = receipt?.ok_or_else(|| {
            CouncilError::Transport(format!("transaction {:?} was dropped", tx.hash))
        })?;

        if receipt.status == Some(U64::zero()) {
            warn!("Transaction {:?} reverted", tx.hash);
            return Err(CouncilError::Revert { reason: None });
        }
        Ok(TxReceipt::from(receipt))
    }
}

/// A node refusing a transaction because its simulation reverts is a revert,
/// anything else is a transport failure.
fn classify_send_error(message: String) -> CouncilError {
    if message.to_ascii_lowercase().contains("revert") {
        CouncilError::Revert {
            reason: Some(message),
        }
    } else {
        CouncilError::Transport(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc(qps_limit: u32) -> Rpc {
        Rpc {
            http_url: "http://localhost:8545".into(),
            chain_id: 1,
            qps_limit,
            read_retries: 3,
            retry_base_delay_ms: 200,
            confirmations: 1,
        }
    }

    #[test]
    fn zero_qps_is_a_config_error() {
        assert!(matches!(RpcChain::new(&rpc(0)), Err(CouncilError::Config(_))));
    }

    #[test]
    fn retry_delays_grow_and_are_bounded() {
        let chain = RpcChain::new(&rpc(10)).unwrap();
        let delays: Vec<Duration> = chain.retry_strategy().collect();
        assert_eq!(delays.len(), 3);
        assert!(delays.iter().all(|d| *d <= MAX_RETRY_DELAY));
    }

    #[test]
    fn send_errors_are_classified() {
        assert!(matches!(
            classify_send_error("execution reverted: not delegated".into()),
            CouncilError::Revert { reason: Some(_) }
        ));
        assert!(matches!(
            classify_send_error("connection refused".into()),
            CouncilError::Transport(_)
        ));
    }
}
