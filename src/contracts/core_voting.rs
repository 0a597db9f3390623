use ethers::abi::{parse_abi, Abi};
use once_cell::sync::Lazy;

pub static CORE_VOTING_ABI: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "event ProposalExecuted(uint256 proposalId)",
        "function votes(address voter, uint256 proposalId) external view returns (uint128 votingPower, uint8 castBallot)",
        "function getProposalVotingPower(uint256 proposalId) external view returns (uint128[3])",
        "function vote(address[] votingVaults, bytes[] extraVaultData, uint256 proposalId, uint8 ballot) external",
    ])
    .expect("core voting ABI is well-formed")
});
