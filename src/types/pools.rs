use serde::{Deserialize, Serialize};

/// Pool identifier as registered on the multi-pool contract (the pool expiry).
pub type PoolId = u64;

/// Pool reserves as decimal strings, scaled by the contract's `decimals()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolReserves {
    pub shares: String,
    pub bonds: String,
}

/// Pool pricing parameters as decimal strings.
///
/// `mu` is stored on chain with 18 decimals, `time_stretch` with 3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParameters {
    pub mu: String,
    pub time_stretch: String,
}
