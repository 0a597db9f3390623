//! # Governance Data Sources
//!
//! Cached reads over the locking vault (deposits, delegated voting power) and
//! the core voting contract (ballots, tallies, execution). Keys of reads that a
//! governance mutation makes stale are exposed through the `*_key` helpers so
//! the mutation can name them for post-confirmation invalidation.

use ethers::types::{Address, U256};
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

use crate::contract_binding::{ContractBinding, ReadableContract};
use crate::contract_data_source::ContractDataSource;
use crate::contracts::{address_at, uint_array_at, uint_at};
use crate::error::{CouncilError, SharedError};
use crate::proposal_status::{derive_status, is_voting_open, ProposalStatus};
use crate::query_cache::{CacheKey, QueryCache};
use crate::types::conversions::to_decimal;
use crate::types::governance::VOTING_POWER_DECIMALS;
use crate::types::{Ballot, CastBallot, Deposit, Proposal, Tally};

pub struct LockingVaultDataSource<C = ContractBinding> {
    source: ContractDataSource<C>,
}

impl<C: ReadableContract + 'static> LockingVaultDataSource<C> {
    pub fn new(contract: C, cache: Arc<QueryCache>) -> Self {
        Self {
            source: ContractDataSource::new(contract, cache),
        }
    }

    pub fn address(&self) -> Address {
        self.source.address()
    }

    /// Key of [`deposits`](Self::deposits) for `account`.
    pub fn deposits_key(&self, account: Address) -> CacheKey {
        self.source.key("deposits", vec![account.into()])
    }

    pub async fn deposits(&self, account: Address) -> Result<Deposit, SharedError> {
        let deposit = self.source.call("deposits", vec![account.into()]).await?;
        Ok(Deposit {
            delegate: address_at(&deposit, 0, "deposits")?,
            amount: uint_at(&deposit, 1, "deposits")?,
        })
    }

    /// Voting power delegated to `account` as of `block`, in whole tokens.
    pub async fn voting_power_at(&self, account: Address, block: u64) -> Result<String, SharedError> {
        let power = self
            .source
            .call("queryVotePowerView", vec![account.into(), block.into()])
            .await?;
        let raw = uint_at(&power, 0, "queryVotePowerView")?;
        Ok(to_decimal(raw, VOTING_POWER_DECIMALS).map_err(CouncilError::from)?)
    }
}

pub struct CoreVotingDataSource<C = ContractBinding> {
    source: ContractDataSource<C>,
}

impl<C: ReadableContract + 'static> CoreVotingDataSource<C> {
    pub fn new(contract: C, cache: Arc<QueryCache>) -> Self {
        Self {
            source: ContractDataSource::new(contract, cache),
        }
    }

    pub fn address(&self) -> Address {
        self.source.address()
    }

    /// Key of [`ballot`](Self::ballot).
    pub fn ballot_key(&self, account: Address, proposal_id: U256) -> CacheKey {
        self.source.key("votes", vec![account.into(), proposal_id.into()])
    }

    /// Key of [`proposal_voting_power`](Self::proposal_voting_power).
    pub fn voting_power_key(&self, proposal_id: U256) -> CacheKey {
        self.source.key("getProposalVotingPower", vec![proposal_id.into()])
    }

    /// How `account` voted on `proposal_id`; `None` if it has not voted.
    pub async fn ballot(
        &self,
        account: Address,
        proposal_id: U256,
    ) -> Result<Option<CastBallot>, SharedError> {
        let votes = self
            .source
            .call("votes", vec![account.into(), proposal_id.into()])
            .await?;
        let voting_power = uint_at(&votes, 0, "votes")?;
        if voting_power.is_zero() {
            return Ok(None);
        }

        let raw_ballot = uint_at(&votes, 1, "votes")?;
        if raw_ballot > U256::from(u8::MAX) {
            return Err(Arc::new(CouncilError::Decode(format!(
                "ballot {} out of range",
                raw_ballot
            ))));
        }
        let ballot = Ballot::try_from(raw_ballot.low_u32() as u8).map_err(CouncilError::from)?;

        Ok(Some(CastBallot { voting_power, ballot }))
    }

    pub async fn proposal_voting_power(&self, proposal_id: U256) -> Result<Tally, SharedError> {
        let power = self
            .source
            .call("getProposalVotingPower", vec![proposal_id.into()])
            .await?;
        let sides = uint_array_at(&power, 0, "getProposalVotingPower")?;
        match sides.as_slice() {
            [yes, no, maybe] => Ok(Tally::new(*yes, *no, *maybe)),
            other => Err(Arc::new(CouncilError::Decode(format!(
                "getProposalVotingPower returned {} sides",
                other.len()
            )))),
        }
    }

    /// Whether a `ProposalExecuted` log exists for `proposal_id`. The full log
    /// history is read once and shared by every proposal.
    pub async fn is_executed(&self, proposal_id: U256) -> Result<bool, SharedError> {
        let executed = self
            .source
            .cached("executedProposals", vec![], |contract| async move {
                let events = contract.query_events("ProposalExecuted", None, None).await?;
                let ids = events
                    .iter()
                    .map(|event| {
                        event
                            .param("proposalId")
                            .and_then(|t| t.clone().into_uint())
                            .ok_or_else(|| {
                                CouncilError::Decode("ProposalExecuted without proposalId".into())
                            })
                    })
                    .collect::<Result<HashSet<U256>, _>>()?;
                debug!("CoreVoting: {} executed proposals", ids.len());
                Ok::<_, CouncilError>(Arc::new(ids))
            })
            .await?;
        Ok(executed.contains(&proposal_id))
    }

    /// Status of `proposal` as of `current_block`.
    pub async fn proposal_status(
        &self,
        proposal: &Proposal,
        current_block: u64,
        voting_window_blocks: u64,
    ) -> Result<ProposalStatus, SharedError> {
        let (executed, tally) = futures::try_join!(
            self.is_executed(proposal.proposal_id),
            self.proposal_voting_power(proposal.proposal_id)
        )?;
        let open = is_voting_open(proposal, current_block, voting_window_blocks);
        Ok(derive_status(open, executed, &proposal.quorum, &tally).map_err(CouncilError::from)?)
    }
}
