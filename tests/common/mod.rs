//! In-memory chain shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use council_sync_sdk::chain::{ChainReader, ChainWriter, PendingTx, TxReceipt};
use council_sync_sdk::contracts::{CORE_VOTING_ABI, LOCKING_VAULT_ABI, MULTI_POOL_ABI};
use council_sync_sdk::settings::{self, Settings};
use council_sync_sdk::CouncilError;
use ethers::abi::{Abi, Token};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, Filter, Log, ValueOrArray, H256, U256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const MULTI_POOL: Address = addr(0x10);
pub const LOCKING_VAULT: Address = addr(0x20);
pub const CORE_VOTING: Address = addr(0x30);
pub const VOTING_VAULT: Address = addr(0x40);

pub const fn addr(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = n;
    ethers::types::H160(bytes)
}

pub fn wallet() -> LocalWallet {
    "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
        .parse()
        .unwrap()
}

pub fn settings() -> Settings {
    Settings {
        rpc: settings::Rpc {
            http_url: "http://localhost:8545".into(),
            chain_id: 1,
            qps_limit: 100,
            read_retries: 0,
            retry_base_delay_ms: 1,
            confirmations: 1,
        },
        contracts: settings::Contracts {
            multi_pool: MULTI_POOL,
            locking_vault: LOCKING_VAULT,
            core_voting: CORE_VOTING,
            voting_vaults: vec![VOTING_VAULT],
        },
        governance: settings::Governance {
            voting_window_blocks: 100,
        },
        cache: Default::default(),
        block_number: settings::BlockNumber {
            update_interval_ms: 60_000,
        },
        explorer: Default::default(),
        log: Default::default(),
    }
}

type CallKey = (Address, Vec<u8>);

/// Answers `eth_call`s from a calldata-keyed table and `eth_getLogs` from a
/// log list. Reads can be held at a gate until the test releases them.
#[derive(Default)]
pub struct MockChain {
    responses: Mutex<HashMap<CallKey, Result<Bytes, String>>>,
    logs: Mutex<Vec<Log>>,
    block: AtomicU64,
    calls: AtomicUsize,
    log_queries: AtomicUsize,
    submits: AtomicUsize,
    confirmations: AtomicUsize,
    gated: AtomicBool,
    gate: Notify,
    hold_confirmations: AtomicBool,
    confirmation_gate: Notify,
    revert: Mutex<Option<Option<String>>>,
    reject_submit: Mutex<Option<String>>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn log_queries(&self) -> usize {
        self.log_queries.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn confirmations(&self) -> usize {
        self.confirmations.load(Ordering::SeqCst)
    }

    /// Network calls of any kind.
    pub fn network_calls(&self) -> usize {
        self.calls() + self.log_queries() + self.submits() + self.confirmations()
    }

    pub fn set_block(&self, block: u64) {
        self.block.store(block, Ordering::SeqCst);
    }

    pub fn respond(&self, to: Address, abi: &Abi, method: &str, args: &[Token], outputs: &[Token]) {
        let output = Bytes::from(ethers::abi::encode(outputs));
        self.responses
            .lock()
            .unwrap()
            .insert(calldata_key(to, abi, method, args), Ok(output));
    }

    pub fn fail(&self, to: Address, abi: &Abi, method: &str, args: &[Token], message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(calldata_key(to, abi, method, args), Err(message.to_string()));
    }

    pub fn push_log(&self, log: Log) {
        self.logs.lock().unwrap().push(log);
    }

    /// Holds every read until [`release`](Self::release) is called for it.
    pub fn hold_reads(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Lets one held (or the next) read through.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn hold_confirmations(&self) {
        self.hold_confirmations.store(true, Ordering::SeqCst);
    }

    pub fn confirm(&self) {
        self.confirmation_gate.notify_one();
    }

    /// Mined transactions revert from now on.
    pub fn revert_with(&self, reason: Option<&str>) {
        *self.revert.lock().unwrap() = Some(reason.map(str::to_string));
    }

    pub fn reject_submissions(&self, message: &str) {
        *self.reject_submit.lock().unwrap() = Some(message.to_string());
    }

    /// Waits until `n` `eth_call`s have started.
    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("reads did not start");
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, CouncilError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        let responses = self.responses.lock().unwrap();
        match responses.get(&(to, data.to_vec())) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(message)) => Err(CouncilError::Transport(message.clone())),
            None => Err(CouncilError::Transport(format!(
                "no response for {:?} 0x{}",
                to,
                hex::encode(&data)
            ))),
        }
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, CouncilError> {
        self.log_queries.fetch_add(1, Ordering::SeqCst);
        let logs = self.logs.lock().unwrap();
        Ok(logs.iter().filter(|log| matches(filter, log)).cloned().collect())
    }

    async fn block_number(&self) -> Result<u64, CouncilError> {
        Ok(self.block.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl<S: Signer + 'static> ChainWriter<S> for MockChain {
    async fn submit(&self, to: Address, _data: Bytes, signer: &S) -> Result<PendingTx, CouncilError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        if let Some(message) = self.reject_submit.lock().unwrap().clone() {
            return Err(CouncilError::Transport(message));
        }
        Ok(PendingTx::new(H256::from_low_u64_be(n), signer.address(), to))
    }

    async fn wait_for_confirmation(&self, tx: &PendingTx) -> Result<TxReceipt, CouncilError> {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        if self.hold_confirmations.load(Ordering::SeqCst) {
            self.confirmation_gate.notified().await;
        }
        if let Some(reason) = self.revert.lock().unwrap().clone() {
            return Err(CouncilError::Revert { reason });
        }
        Ok(TxReceipt {
            hash: tx.hash,
            block_number: Some(self.block.load(Ordering::SeqCst) + 1),
            gas_used: Some(U256::from(21_000u64)),
        })
    }
}

fn calldata_key(to: Address, abi: &Abi, method: &str, args: &[Token]) -> CallKey {
    let data = abi
        .function(method)
        .unwrap()
        .encode_input(args)
        .unwrap();
    (to, data)
}

fn matches(filter: &Filter, log: &Log) -> bool {
    let address_ok = match &filter.address {
        Some(ValueOrArray::Value(a)) => *a == log.address,
        Some(ValueOrArray::Array(list)) => list.contains(&log.address),
        None => true,
    };
    let topic_ok = match &filter.topics[0] {
        Some(ValueOrArray::Value(Some(topic))) => log.topics.first() == Some(topic),
        _ => true,
    };
    let block = log.block_number.map(|b| b.as_u64()).unwrap_or_default();
    let from_ok = filter.get_from_block().map_or(true, |from| block >= from.as_u64());
    let to_ok = filter.get_to_block().map_or(true, |to| block <= to.as_u64());
    address_ok && topic_ok && from_ok && to_ok
}

pub fn pool_registered(pool_id: u64, block: u64) -> Log {
    let event = MULTI_POOL_ABI.event("PoolRegistered").unwrap();
    let mut topic = [0u8; 32];
    U256::from(pool_id).to_big_endian(&mut topic);
    Log {
        address: MULTI_POOL,
        topics: vec![event.signature(), H256(topic)],
        data: Bytes::default(),
        block_number: Some(block.into()),
        ..Default::default()
    }
}

pub fn proposal_executed(proposal_id: u64, block: u64) -> Log {
    let event = CORE_VOTING_ABI.event("ProposalExecuted").unwrap();
    Log {
        address: CORE_VOTING,
        topics: vec![event.signature()],
        data: Bytes::from(ethers::abi::encode(&[Token::Uint(proposal_id.into())])),
        block_number: Some(block.into()),
        ..Default::default()
    }
}

pub fn uint(v: u64) -> Token {
    Token::Uint(U256::from(v))
}

/// `v * 10^decimals` as a token.
pub fn scaled(v: u64, decimals: usize) -> Token {
    Token::Uint(U256::from(v) * U256::exp10(decimals))
}

pub fn multi_pool_abi() -> &'static Abi {
    &MULTI_POOL_ABI
}

pub fn locking_vault_abi() -> &'static Abi {
    &LOCKING_VAULT_ABI
}

pub fn core_voting_abi() -> &'static Abi {
    &CORE_VOTING_ABI
}
