use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

use crate::types::conversions::{to_raw, ConversionError};

/// Decimals used by the voting token and every voting-power figure.
pub const VOTING_POWER_DECIMALS: u8 = 18;

/// A voter's choice. Discriminants match the `uint8` the voting contract takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ballot {
    Yes = 0,
    No = 1,
    Maybe = 2,
}

impl TryFrom<u8> for Ballot {
    type Error = ConversionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Ballot::Yes),
            1 => Ok(Ballot::No),
            2 => Ok(Ballot::Maybe),
            other => Err(ConversionError::UnknownBallot(other.to_string())),
        }
    }
}

impl std::str::FromStr for Ballot {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yes" => Ok(Ballot::Yes),
            "no" => Ok(Ballot::No),
            "maybe" | "abstain" => Ok(Ballot::Maybe),
            other => Err(ConversionError::UnknownBallot(other.to_string())),
        }
    }
}

/// How an account voted on a proposal. Recasting overwrites the previous ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastBallot {
    /// Raw voting power (18 decimals).
    pub voting_power: U256,
    pub ballot: Ballot,
}

/// Locking-vault deposit of an account: who it delegates to and how much.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub delegate: Address,
    pub amount: U256,
}

/// Voting power accumulated by each side of a proposal, raw 18-decimal values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub yes: U256,
    pub no: U256,
    pub maybe: U256,
}

impl Tally {
    pub fn new(yes: U256, no: U256, maybe: U256) -> Self {
        Self { yes, no, maybe }
    }

    /// Builds a tally from decimal strings in whole voting-token units.
    pub fn from_decimals(yes: &str, no: &str, maybe: &str) -> Result<Self, ConversionError> {
        Ok(Self {
            yes: to_raw(yes, VOTING_POWER_DECIMALS)?,
            no: to_raw(no, VOTING_POWER_DECIMALS)?,
            maybe: to_raw(maybe, VOTING_POWER_DECIMALS)?,
        })
    }

    /// The side a proposal is judged by: whichever of yes/no accrued more power.
    pub fn leading_side(&self) -> U256 {
        self.yes.max(self.no)
    }
}

/// A governance proposal as indexed off chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub proposal_id: U256,
    /// Identifier of the off-chain snapshot proposal carrying title and body.
    pub snapshot_id: String,
    /// Quorum in whole voting-token units, e.g. `"50"` for 50 tokens.
    pub quorum: String,
    /// Block the proposal was created at.
    pub created: u64,
}

impl From<Ballot> for crate::types::CallArg {
    fn from(ballot: Ballot) -> Self {
        crate::types::CallArg::from(ballot as u8)
    }
}
