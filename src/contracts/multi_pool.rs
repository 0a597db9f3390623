use ethers::abi::{parse_abi, Abi};
use once_cell::sync::Lazy;

/// Multi-pool (one contract, many term pools keyed by expiry).
pub static MULTI_POOL_ABI: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "event PoolRegistered(uint256 indexed poolId)",
        "function term() external view returns (address)",
        "function token() external view returns (address)",
        "function decimals() external view returns (uint8)",
        "function name(uint256 poolId) external view returns (string)",
        "function symbol(uint256 poolId) external view returns (string)",
        "function balanceOf(uint256 tokenId, address owner) external view returns (uint256)",
        "function reserves(uint256 poolId) external view returns (uint128 shares, uint128 bonds)",
        "function parameters(uint256 poolId) external view returns (uint32 timeStretch, uint224 mu)",
    ])
    .expect("multi-pool ABI is well-formed")
});
