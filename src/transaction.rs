//! # Transaction Mutation Layer
//!
//! A [`TransactionMutation`] wraps one state-changing contract method. Each
//! call to [`TransactionMutation::prepare`] yields an independent
//! [`MutationInvocation`] that moves through
//!
//! ```text
//! Idle -> Submitted -> Mined
//!   \         \
//!    `---------`-----> Error
//! ```
//!
//! `Mined` and `Error` are terminal. The cache keys given to `prepare` are
//! invalidated only once the transaction is mined, and never on error. Every
//! failure path reports exactly one error on each channel (hooks, state and
//! broadcast).
//!
//! After submission the confirmation wait runs on a spawned task, so a
//! caller that stops waiting does not leave the cache holding pre-mutation
//! values. Hooks only reach callers still awaiting `send`.

use chrono::{DateTime, Utc};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256};
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::block_number_cache::BlockNumberCache;
use crate::chain::{ChainWriter, PendingTx, TxReceipt};
use crate::contract_binding::{ContractBinding, ReadableContract};
use crate::error::CouncilError;
use crate::metrics;
use crate::query_cache::{CacheKey, QueryCache};
use crate::types::CallArg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStage {
    Submitted,
    Mined,
    Error,
}

impl TxStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStage::Submitted => "submitted",
            TxStage::Mined => "mined",
            TxStage::Error => "error",
        }
    }
}

/// State of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Submitted(PendingTx),
    Mined(TxReceipt),
    Error(String),
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Mined(_) | TxState::Error(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TxLifecycleEvent {
    pub invocation_id: Uuid,
    pub method: String,
    pub stage: TxStage,
    pub tx_hash: Option<H256>,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Callbacks for one invocation. All default to no-ops.
pub trait LifecycleHooks: Send + Sync {
    fn on_submitted(&self, _tx: &PendingTx) {}

    /// Runs after the invocation's cache keys were invalidated.
    fn on_mined(&self, _tx: &PendingTx, _receipt: &TxReceipt) {}

    fn on_error(&self, _error: &CouncilError) {}
}

/// No callbacks.
impl LifecycleHooks for () {}

pub struct TransactionMutation<S = LocalWallet> {
    binding: ContractBinding,
    writer: Arc<dyn ChainWriter<S>>,
    cache: Arc<QueryCache>,
    blocks: Option<Arc<BlockNumberCache>>,
    method: Arc<str>,
    events: broadcast::Sender<TxLifecycleEvent>,
}

impl<S> Clone for TransactionMutation<S> {
    fn clone(&self) -> Self {
        Self {
            binding: self.binding.clone(),
            writer: Arc::clone(&self.writer),
            cache: Arc::clone(&self.cache),
            blocks: self.blocks.clone(),
            method: Arc::clone(&self.method),
            events: self.events.clone(),
        }
    }
}

impl<S: Signer + 'static> TransactionMutation<S> {
    pub fn new(
        binding: ContractBinding,
        writer: Arc<dyn ChainWriter<S>>,
        cache: Arc<QueryCache>,
        method: &str,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            binding,
            writer,
            cache,
            blocks: None,
            method: Arc::from(method),
            events,
        }
    }

    /// Records the block of every mined invocation in `blocks`.
    pub fn with_block_feed(mut self, blocks: Arc<BlockNumberCache>) -> Self {
        self.blocks = Some(blocks);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn contract(&self) -> Address {
        self.binding.address()
    }

    /// Lifecycle events of every invocation of this mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<TxLifecycleEvent> {
        self.events.subscribe()
    }

    /// A new invocation of `method(args)` that invalidates `invalidate` once mined.
    pub fn prepare(&self, args: Vec<CallArg>, invalidate: Vec<CacheKey>) -> MutationInvocation<S> {
        let (state, _) = watch::channel(TxState::Idle);
        MutationInvocation {
            progress: Arc::new(Progress {
                id: Uuid::new_v4(),
                mutation: self.clone(),
                state,
            }),
            args,
            invalidate,
            sent: AtomicBool::new(false),
        }
    }
}

pub struct MutationInvocation<S = LocalWallet> {
    progress: Arc<Progress<S>>,
    args: Vec<CallArg>,
    invalidate: Vec<CacheKey>,
    sent: AtomicBool,
}

/// The part of an invocation its confirmation task keeps alive.
struct Progress<S> {
    id: Uuid,
    mutation: TransactionMutation<S>,
    state: watch::Sender<TxState>,
}

impl<S: Signer + 'static> MutationInvocation<S> {
    pub fn id(&self) -> Uuid {
        self.progress.id
    }

    pub fn state(&self) -> TxState {
        self.progress.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<TxState> {
        self.progress.state.subscribe()
    }

    pub fn invalidates(&self) -> &[CacheKey] {
        &self.invalidate
    }

    /// Submits the transaction and waits for it to be mined.
    ///
    /// Without a signer this fails with [`CouncilError::Auth`] before any
    /// network call. An invocation can only be sent once.
    ///
    /// Once submitted, confirmation runs on its own task: dropping this
    /// future stops the hooks, but the cache keys are still invalidated and
    /// the terminal state and event still published when the transaction
    /// settles.
    pub async fn send(
        &self,
        signer: Option<&S>,
        hooks: &dyn LifecycleHooks,
    ) -> Result<TxReceipt, CouncilError> {
        if self.sent.swap(true, Ordering::SeqCst) {
            return Err(CouncilError::InvocationSpent(self.id()));
        }

        let signer = match signer {
            Some(signer) => signer,
            None => return Err(self.fail(CouncilError::Auth, hooks)),
        };

        let mutation = &self.progress.mutation;
        let data = match mutation.binding.encode_call(&mutation.method, &self.args) {
            Ok(data) => data,
            Err(e) => return Err(self.fail(e, hooks)),
        };

        let pending = match mutation.writer.submit(mutation.contract(), data, signer).await {
            Ok(pending) => pending,
            Err(e) => return Err(self.fail(e, hooks)),
        };
        info!(
            "{} submitted as {:?} (invocation {})",
            mutation.method,
            pending.hash,
            self.id()
        );
        self.progress.state.send_replace(TxState::Submitted(pending.clone()));
        self.progress.emit(TxStage::Submitted, Some(pending.hash), None);
        hooks.on_submitted(&pending);

        let confirmation = {
            let progress = Arc::clone(&self.progress);
            let pending = pending.clone();
            let invalidate = self.invalidate.clone();
            tokio::spawn(async move { progress.confirm(pending, invalidate).await })
        };

        match confirmation.await {
            Ok(Ok(receipt)) => {
                hooks.on_mined(&pending, &receipt);
                Ok(receipt)
            }
            Ok(Err(e)) => {
                hooks.on_error(&e);
                Err(e)
            }
            Err(e) => Err(self.fail(
                CouncilError::Transport(format!("confirmation of {:?} aborted: {}", pending.hash, e)),
                hooks,
            )),
        }
    }

    fn fail(&self, error: CouncilError, hooks: &dyn LifecycleHooks) -> CouncilError {
        let error = self.progress.record_failure(error);
        hooks.on_error(&error);
        error
    }
}

impl<S: Signer + 'static> Progress<S> {
    async fn confirm(&self, pending: PendingTx, invalidate: Vec<CacheKey>) -> Result<TxReceipt, CouncilError> {
        let mutation = &self.mutation;
        let receipt = match mutation.writer.wait_for_confirmation(&pending).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.record_failure(e)),
        };

        for key in &invalidate {
            mutation.cache.invalidate(key);
        }
        if let (Some(blocks), Some(block)) = (&mutation.blocks, receipt.block_number) {
            blocks.update_from_external(block);
        }
        info!(
            "{} mined in block {:?} ({} cache keys invalidated)",
            mutation.method,
            receipt.block_number,
            invalidate.len()
        );
        self.emit(TxStage::Mined, Some(pending.hash), None);
        self.state.send_replace(TxState::Mined(receipt.clone()));
        Ok(receipt)
    }

    fn record_failure(&self, error: CouncilError) -> CouncilError {
        warn!("{} failed (invocation {}): {}", self.mutation.method, self.id, error);
        let tx_hash = match &*self.state.borrow() {
            TxState::Submitted(pending) => Some(pending.hash),
            _ => None,
        };
        self.emit(TxStage::Error, tx_hash, Some(&error));
        self.state.send_replace(TxState::Error(error.to_string()));
        error
    }

    fn emit(&self, stage: TxStage, tx_hash: Option<H256>, error: Option<&CouncilError>) {
        match error {
            Some(e) => metrics::increment_tx_error(&self.mutation.method, e.kind()),
            None => metrics::increment_tx_stage(&self.mutation.method, stage.as_str()),
        }
        let _ = self.mutation.events.send(TxLifecycleEvent {
            invocation_id: self.id,
            method: self.mutation.method.to_string(),
            stage,
            tx_hash,
            error: error.map(|e| e.to_string()),
            at: Utc::now(),
        });
    }
}
