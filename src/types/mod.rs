//! Common value types shared by the data sources and the mutation layer.

pub mod call_arg;
pub mod conversions;
pub mod governance;
pub mod pools;

pub use call_arg::CallArg;
pub use governance::{Ballot, CastBallot, Deposit, Proposal, Tally};
pub use pools::{PoolId, PoolParameters, PoolReserves};
