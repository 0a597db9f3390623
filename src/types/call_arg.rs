use ethers::abi::Token;
use ethers::types::{Address, U256};
use std::fmt;

use crate::error::CouncilError;

/// A call argument as it appears in a cache key and in contract calldata.
///
/// Unlike `ethers::abi::Token` this is `Hash + Eq`, so an argument list can be
/// part of a [`CacheKey`](crate::query_cache::CacheKey). `Unset` stands for an
/// omitted optional argument (e.g. an open block range) and only ever appears
/// in keys, never in calldata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallArg {
    Uint(U256),
    Address(Address),
    Bool(bool),
    Str(String),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    Array(Vec<CallArg>),
    Unset,
}

impl CallArg {
    pub fn to_token(&self) -> Result<Token, CouncilError> {
        Ok(match self {
            CallArg::Uint(v) => Token::Uint(*v),
            CallArg::Address(a) => Token::Address(*a),
            CallArg::Bool(b) => Token::Bool(*b),
            CallArg::Str(s) => Token::String(s.clone()),
            CallArg::FixedBytes(b) => Token::FixedBytes(b.clone()),
            CallArg::Bytes(b) => Token::Bytes(b.clone()),
            CallArg::Array(items) => Token::Array(
                items.iter().map(CallArg::to_token).collect::<Result<Vec<_>, _>>()?,
            ),
            CallArg::Unset => {
                return Err(CouncilError::Abi("unset argument cannot be encoded".to_string()))
            }
        })
    }

    pub fn tokens(args: &[CallArg]) -> Result<Vec<Token>, CouncilError> {
        args.iter().map(CallArg::to_token).collect()
    }
}

impl fmt::Display for CallArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallArg::Uint(v) => write!(f, "{}", v),
            CallArg::Address(a) => write!(f, "{:?}", a),
            CallArg::Bool(b) => write!(f, "{}", b),
            CallArg::Str(s) => write!(f, "{:?}", s),
            CallArg::FixedBytes(b) | CallArg::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            CallArg::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            CallArg::Unset => write!(f, "_"),
        }
    }
}

impl From<U256> for CallArg {
    fn from(v: U256) -> Self {
        CallArg::Uint(v)
    }
}

impl From<u64> for CallArg {
    fn from(v: u64) -> Self {
        CallArg::Uint(U256::from(v))
    }
}

impl From<u8> for CallArg {
    fn from(v: u8) -> Self {
        CallArg::Uint(U256::from(v))
    }
}

impl From<Address> for CallArg {
    fn from(a: Address) -> Self {
        CallArg::Address(a)
    }
}

impl From<bool> for CallArg {
    fn from(b: bool) -> Self {
        CallArg::Bool(b)
    }
}

impl From<&str> for CallArg {
    fn from(s: &str) -> Self {
        CallArg::Str(s.to_string())
    }
}

impl From<Option<u64>> for CallArg {
    fn from(v: Option<u64>) -> Self {
        v.map(CallArg::from).unwrap_or(CallArg::Unset)
    }
}

impl<T: Into<CallArg>> From<Vec<T>> for CallArg {
    fn from(items: Vec<T>) -> Self {
        CallArg::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_is_key_only() {
        assert_eq!(CallArg::from(None::<u64>), CallArg::Unset);
        assert!(CallArg::Unset.to_token().is_err());
        assert!(CallArg::from(vec![CallArg::Unset]).to_token().is_err());
    }

    #[test]
    fn display_is_stable() {
        let arg = CallArg::from(vec![CallArg::from(1u64), CallArg::Bytes(vec![0xab])]);
        assert_eq!(arg.to_string(), "[1,0xab]");
    }
}
