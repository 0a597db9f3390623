//! # Client
//!
//! [`CouncilClient`] wires one session: a query cache shared by every data
//! source, the three contract data sources, the governance mutations and the
//! block number cache.

use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use log::info;
use std::sync::Arc;
use std::time::Duration;

use crate::block_number_cache::BlockNumberCache;
use crate::chain::{ChainReader, ChainWriter, TxReceipt};
use crate::contract_binding::ContractBinding;
use crate::contracts::{CORE_VOTING_ABI, LOCKING_VAULT_ABI, MULTI_POOL_ABI};
use crate::error::{CouncilError, SharedError};
use crate::governance::{CoreVotingDataSource, LockingVaultDataSource};
use crate::multi_pool::MultiPoolContractDataSource;
use crate::proposal_status::ProposalStatus;
use crate::query_cache::QueryCache;
use crate::rpc_chain::RpcChain;
use crate::settings::Settings;
use crate::transaction::{LifecycleHooks, MutationInvocation, TransactionMutation};
use crate::types::{Ballot, CallArg, Proposal};

/// One session, signing its transactions with an `S`.
pub struct CouncilClient<S = LocalWallet> {
    settings: Settings,
    cache: Arc<QueryCache>,
    multi_pool: MultiPoolContractDataSource,
    locking_vault: LockingVaultDataSource,
    core_voting: CoreVotingDataSource,
    change_delegation: TransactionMutation<S>,
    vote: TransactionMutation<S>,
    blocks: Arc<BlockNumberCache>,
}

impl<S: Signer + 'static> CouncilClient<S> {
    /// Connects to the node configured in `settings.rpc`.
    pub fn connect(settings: Settings) -> Result<Self, CouncilError>
    where
        S: Clone,
    {
        settings
            .validate()
            .map_err(|e| CouncilError::Config(e.to_string()))?;
        let chain = Arc::new(RpcChain::new(&settings.rpc)?);
        Ok(Self::with_chain(settings, chain.clone(), chain))
    }

    /// Builds a client over any chain implementation.
    pub fn with_chain(
        settings: Settings,
        reader: Arc<dyn ChainReader>,
        writer: Arc<dyn ChainWriter<S>>,
    ) -> Self {
        let cache = Arc::new(QueryCache::new(
            settings.cache.max_age_seconds.map(Duration::from_secs),
            settings.cache.event_capacity,
        ));
        let contracts = &settings.contracts;

        let multi_pool = ContractBinding::new(contracts.multi_pool, &MULTI_POOL_ABI, reader.clone());
        let locking_vault =
            ContractBinding::new(contracts.locking_vault, &LOCKING_VAULT_ABI, reader.clone());
        let core_voting = ContractBinding::new(contracts.core_voting, &CORE_VOTING_ABI, reader.clone());

        let blocks = Arc::new(BlockNumberCache::new(
            reader,
            Duration::from_millis(settings.block_number.update_interval_ms),
        ));
        let capacity = settings.cache.event_capacity;
        let change_delegation = TransactionMutation::new(
            locking_vault.clone(),
            writer.clone(),
            cache.clone(),
            "changeDelegation",
            capacity,
        )
        .with_block_feed(blocks.clone());
        let vote = TransactionMutation::new(core_voting.clone(), writer, cache.clone(), "vote", capacity)
            .with_block_feed(blocks.clone());

        info!(
            "Council client: multi pool {:?}, locking vault {:?}, core voting {:?}",
            contracts.multi_pool, contracts.locking_vault, contracts.core_voting
        );

        Self {
            multi_pool: MultiPoolContractDataSource::new(multi_pool, cache.clone()),
            locking_vault: LockingVaultDataSource::new(locking_vault, cache.clone()),
            core_voting: CoreVotingDataSource::new(core_voting, cache.clone()),
            change_delegation,
            vote,
            blocks,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn multi_pool(&self) -> &MultiPoolContractDataSource {
        &self.multi_pool
    }

    pub fn locking_vault(&self) -> &LockingVaultDataSource {
        &self.locking_vault
    }

    pub fn core_voting(&self) -> &CoreVotingDataSource {
        &self.core_voting
    }

    pub fn blocks(&self) -> &BlockNumberCache {
        &self.blocks
    }

    pub fn change_delegation_mutation(&self) -> &TransactionMutation<S> {
        &self.change_delegation
    }

    pub fn vote_mutation(&self) -> &TransactionMutation<S> {
        &self.vote
    }

    /// `changeDelegation(new_delegate)` on behalf of `account`; invalidates
    /// the account's deposit once mined.
    pub fn prepare_change_delegation(&self, account: Address, new_delegate: Address) -> MutationInvocation<S> {
        self.change_delegation.prepare(
            vec![new_delegate.into()],
            vec![self.locking_vault.deposits_key(account)],
        )
    }

    /// A ballot on `proposal_id` counting the configured voting vaults;
    /// invalidates the account's ballot and the proposal's tally once mined.
    pub fn prepare_vote(&self, account: Address, proposal_id: U256, ballot: Ballot) -> MutationInvocation<S> {
        let vaults = &self.settings.contracts.voting_vaults;
        let extra_data = CallArg::Array(vec![CallArg::Bytes(Vec::new()); vaults.len()]);
        self.vote.prepare(
            vec![vaults.clone().into(), extra_data, proposal_id.into(), ballot.into()],
            vec![
                self.core_voting.ballot_key(account, proposal_id),
                self.core_voting.voting_power_key(proposal_id),
            ],
        )
    }

    pub async fn change_delegation(
        &self,
        signer: Option<&S>,
        new_delegate: Address,
        hooks: &dyn LifecycleHooks,
    ) -> Result<TxReceipt, CouncilError> {
        let account = signer.map(|s| s.address()).unwrap_or_default();
        self.prepare_change_delegation(account, new_delegate)
            .send(signer, hooks)
            .await
    }

    pub async fn vote(
        &self,
        signer: Option<&S>,
        proposal_id: U256,
        ballot: Ballot,
        hooks: &dyn LifecycleHooks,
    ) -> Result<TxReceipt, CouncilError> {
        let account = signer.map(|s| s.address()).unwrap_or_default();
        self.prepare_vote(account, proposal_id, ballot)
            .send(signer, hooks)
            .await
    }

    /// Status of `proposal` at the current block, over the configured voting window.
    pub async fn proposal_status(&self, proposal: &Proposal) -> Result<ProposalStatus, SharedError> {
        let current_block = self.blocks.get_current_block().await?;
        self.core_voting
            .proposal_status(
                proposal,
                current_block,
                self.settings.governance.voting_window_blocks,
            )
            .await
    }

    /// Ends the session: every cached read is dropped. Transactions already
    /// submitted still settle and publish their lifecycle events.
    pub fn disconnect(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        info!("Council client disconnected ({} cached reads dropped)", dropped);
    }
}
