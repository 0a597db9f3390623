use ethers::abi::{parse_abi, Abi};
use once_cell::sync::Lazy;

pub static LOCKING_VAULT_ABI: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "function deposits(address who) external view returns (address delegate, uint96 amount)",
        "function queryVotePowerView(address user, uint256 blockNumber) external view returns (uint256)",
        "function changeDelegation(address newDelegate) external",
    ])
    .expect("locking vault ABI is well-formed")
});
