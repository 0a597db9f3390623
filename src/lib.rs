//! # Council Sync SDK
//!
//! On-chain data synchronization and transaction lifecycle for a council
//! governance deployment: a multi-pool term contract, a locking vault and a
//! core voting contract.
//!
//! ## Overview
//!
//! - **Reads**: typed data sources over each contract. Every read goes through
//!   one session-wide [`QueryCache`] that collapses concurrent identical reads
//!   and serves results until they are invalidated.
//! - **Mutations**: `changeDelegation` and `vote` run through a staged
//!   lifecycle (submitted, mined, error) with callbacks, observable events and
//!   cache invalidation after confirmation.
//! - **Derivations**: fixed-point conversions and proposal status.
//!
//! ## Architecture
//!
//! ### Chain Layer
//! [`ChainReader`]/[`ChainWriter`] abstract the node. [`RpcChain`] implements
//! both over HTTP JSON-RPC with rate limiting and read retries.
//!
//! ### Contract Layer
//! [`ContractBinding`] is the only place method names meet ABIs. Data sources
//! sit on top of it through [`ContractDataSource`].
//!
//! ### Mutation Layer
//! [`TransactionMutation`] prepares independent invocations, each sent once.

// Core Types
/// Call arguments, numeric conversions and domain records
pub mod types;
/// Error taxonomy
pub mod error;

// Chain Layer
/// Chain read/write interfaces
pub mod chain;
/// JSON-RPC implementation of the chain interfaces
pub mod rpc_chain;
/// Current block number with throttled refresh
pub mod block_number_cache;

// Contracts (Public ABIs Only)
/// Contract ABIs and decode helpers
pub mod contracts;
/// ABI-backed contract binding
pub mod contract_binding;

// Read Layer
/// Session-wide query cache
pub mod query_cache;
/// Cached reads over one contract
pub mod contract_data_source;
/// Multi-pool reads
pub mod multi_pool;
/// Locking vault and core voting reads
pub mod governance;
/// Proposal status derivation
pub mod proposal_status;

// Mutation Layer
/// Transaction lifecycle and post-confirmation invalidation
pub mod transaction;

// Infrastructure
/// Metrics and observability
pub mod metrics;
/// Configuration management
pub mod settings;
/// Session wiring
pub mod client;

// Re-exports for convenience
pub use chain::{ChainReader, ChainWriter, PendingTx, TxReceipt};
pub use client::CouncilClient;
pub use contract_binding::{ContractBinding, ReadableContract};
pub use contract_data_source::ContractDataSource;
pub use error::{CouncilError, SharedError};
pub use multi_pool::{MultiPoolContractDataSource, MultiPoolDataSource};
pub use proposal_status::ProposalStatus;
pub use query_cache::{CacheEvent, CacheEventKind, CacheKey, QueryCache};
pub use rpc_chain::RpcChain;
pub use settings::Settings;
pub use transaction::{LifecycleHooks, MutationInvocation, TransactionMutation, TxLifecycleEvent, TxState};
