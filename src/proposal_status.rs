//! # Proposal Status Derivation
//!
//! Pure functions turning on-chain proposal state into a [`ProposalStatus`].
//! List and detail consumers both go through [`derive_status`], so they never
//! disagree about a proposal.

use ethers::types::U256;
use log::warn;
use serde::Serialize;

use crate::types::conversions::{to_decimal, to_raw, ConversionError};
use crate::types::governance::VOTING_POWER_DECIMALS;
use crate::types::{Proposal, Tally};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Open,
    Passed,
    Failed,
    Executed,
}

impl ProposalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ProposalStatus::Open => "Open",
            ProposalStatus::Passed => "Passed",
            ProposalStatus::Failed => "Failed",
            ProposalStatus::Executed => "Executed",
        }
    }
}

/// Voting is open while `current_block < created + voting_window_blocks`.
pub fn is_voting_open(proposal: &Proposal, current_block: u64, voting_window_blocks: u64) -> bool {
    current_block < proposal.created.saturating_add(voting_window_blocks)
}

/// Status of a proposal.
///
/// Execution overrides everything, then an open vote, then the leading side of
/// the tally (the larger of yes/no, never their difference) against `quorum`,
/// given in whole voting-token units.
///
/// A zero quorum is always met; such a proposal passes as soon as voting
/// closes, which is logged because it usually means a misconfigured proposal.
pub fn derive_status(
    is_voting_open: bool,
    is_executed: bool,
    quorum: &str,
    tally: &Tally,
) -> Result<ProposalStatus, ConversionError> {
    if is_executed {
        return Ok(ProposalStatus::Executed);
    }
    if is_voting_open {
        return Ok(ProposalStatus::Open);
    }

    let quorum_raw = to_raw(quorum, VOTING_POWER_DECIMALS)?;
    if quorum_raw.is_zero() {
        warn!("Proposal has a zero quorum; treating it as met");
    }

    if tally.leading_side() >= quorum_raw {
        Ok(ProposalStatus::Passed)
    } else {
        Ok(ProposalStatus::Failed)
    }
}

/// Votes counted towards quorum, as a decimal string of whole tokens.
pub fn vote_count(tally: &Tally) -> Result<String, ConversionError> {
    to_decimal(tally.leading_side(), VOTING_POWER_DECIMALS)
}

/// Whole-percent progress of the leading side towards `quorum`, rounded down.
/// Not capped at 100. A zero quorum reports 100.
pub fn quorum_progress(tally: &Tally, quorum: &str) -> Result<u64, ConversionError> {
    let quorum_raw = to_raw(quorum, VOTING_POWER_DECIMALS)?;
    if quorum_raw.is_zero() {
        return Ok(100);
    }
    let percent = tally
        .leading_side()
        .checked_mul(U256::from(100u8))
        .ok_or(ConversionError::Overflow)?
        / quorum_raw;
    if percent > U256::from(u64::MAX) {
        return Err(ConversionError::Overflow);
    }
    Ok(percent.as_u64())
}
