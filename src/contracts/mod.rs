// Contracts Module - human-readable ABIs of the governance contracts the SDK reads and writes

pub mod core_voting;
pub mod locking_vault;
pub mod multi_pool;

pub use core_voting::CORE_VOTING_ABI;
pub use locking_vault::LOCKING_VAULT_ABI;
pub use multi_pool::MULTI_POOL_ABI;

use ethers::abi::Token;
use ethers::types::{Address, U256};

use crate::error::CouncilError;

fn token_at<'a>(tokens: &'a [Token], index: usize, what: &str) -> Result<&'a Token, CouncilError> {
    tokens
        .get(index)
        .ok_or_else(|| CouncilError::Decode(format!("{}: missing output #{}", what, index)))
}

pub fn uint_at(tokens: &[Token], index: usize, what: &str) -> Result<U256, CouncilError> {
    token_at(tokens, index, what)?
        .clone()
        .into_uint()
        .ok_or_else(|| CouncilError::Decode(format!("{}: output #{} is not a uint", what, index)))
}

pub fn address_at(tokens: &[Token], index: usize, what: &str) -> Result<Address, CouncilError> {
    token_at(tokens, index, what)?
        .clone()
        .into_address()
        .ok_or_else(|| CouncilError::Decode(format!("{}: output #{} is not an address", what, index)))
}

pub fn string_at(tokens: &[Token], index: usize, what: &str) -> Result<String, CouncilError> {
    token_at(tokens, index, what)?
        .clone()
        .into_string()
        .ok_or_else(|| CouncilError::Decode(format!("{}: output #{} is not a string", what, index)))
}

/// Fixed or dynamic array of uints, e.g. `uint128[3]`.
pub fn uint_array_at(tokens: &[Token], index: usize, what: &str) -> Result<Vec<U256>, CouncilError> {
    let items = match token_at(tokens, index, what)?.clone() {
        Token::FixedArray(items) | Token::Array(items) => items,
        _ => {
            return Err(CouncilError::Decode(format!(
                "{}: output #{} is not an array",
                what, index
            )))
        }
    };
    items
        .into_iter()
        .map(|t| {
            t.into_uint()
                .ok_or_else(|| CouncilError::Decode(format!("{}: array item is not a uint", what)))
        })
        .collect()
}
