//! # Multi-Pool Data Source
//!
//! Domain reads over a single multi-pool contract: which pools exist, their
//! reserves and pricing parameters, balances and token metadata. All reads are
//! memoized through the underlying [`ContractDataSource`].
//!
//! ## Numeric formats
//!
//! | Read | On chain | Returned as |
//! |------|----------|-------------|
//! | reserves | integer scaled by `decimals()` | decimal string |
//! | `mu` | 18-decimal fixed point | decimal string |
//! | `timeStretch` | 3-decimal fixed point | decimal string |
//! | `balanceOf` | integer | raw integer string, unscaled |

use async_trait::async_trait;
use ethers::types::{Address, U256};
use log::debug;
use std::sync::Arc;

use crate::contract_binding::{ContractBinding, ReadableContract};
use crate::contract_data_source::ContractDataSource;
use crate::contracts::{address_at, string_at, uint_at};
use crate::error::{CouncilError, SharedError};
use crate::query_cache::QueryCache;
use crate::types::conversions::{time_stretch_to_decimal, to_decimal};
use crate::types::{CallArg, PoolId, PoolParameters, PoolReserves};

/// `mu` is an 18-decimal fixed point number.
const MU_DECIMALS: u8 = 18;

/// Read capability of a multi-pool deployment.
#[async_trait]
pub trait MultiPoolDataSource: Send + Sync {
    /// Pool ids registered in `[from_block, to_block]`; `None` bounds cover the
    /// whole history. Each range is cached on its own.
    async fn get_pool_ids(
        &self,
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> Result<Vec<PoolId>, SharedError>;

    async fn get_pool_reserves(&self, pool_id: PoolId) -> Result<PoolReserves, SharedError>;

    async fn get_pool_parameters(&self, pool_id: PoolId) -> Result<PoolParameters, SharedError>;

    /// Balance of `address` in `pool_id`, as the raw on-chain integer.
    async fn get_balance_of(&self, pool_id: PoolId, address: Address) -> Result<String, SharedError>;

    async fn get_multi_term(&self) -> Result<Address, SharedError>;

    async fn get_base_asset(&self) -> Result<Address, SharedError>;

    async fn get_symbol(&self, pool_id: PoolId) -> Result<String, SharedError>;

    async fn get_name(&self, pool_id: PoolId) -> Result<String, SharedError>;

    async fn get_decimals(&self) -> Result<u8, SharedError>;
}

pub struct MultiPoolContractDataSource<C = ContractBinding> {
    source: ContractDataSource<C>,
}

impl<C: ReadableContract + 'static> MultiPoolContractDataSource<C> {
    pub fn new(contract: C, cache: Arc<QueryCache>) -> Self {
        Self {
            source: ContractDataSource::new(contract, cache),
        }
    }

    pub fn data_source(&self) -> &ContractDataSource<C> {
        &self.source
    }
}

#[async_trait]
impl<C: ReadableContract + 'static> MultiPoolDataSource for MultiPoolContractDataSource<C> {
    async fn get_pool_ids(
        &self,
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> Result<Vec<PoolId>, SharedError> {
        let key_args = vec![CallArg::from(from_block), CallArg::from(to_block)];
        self.source
            .cached("getPoolIds", key_args, move |contract| async move {
                let events = contract
                    .query_events("PoolRegistered", from_block, to_block)
                    .await?;
                let mut ids: Vec<PoolId> = Vec::with_capacity(events.len());
                for event in events {
                    let raw = event
                        .param("poolId")
                        .and_then(|t| t.clone().into_uint())
                        .ok_or_else(|| CouncilError::Decode("PoolRegistered without poolId".into()))?;
                    let id = to_pool_id(raw)?;
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                debug!(
                    "MultiPool: {} pools registered in blocks {:?}..{:?}",
                    ids.len(),
                    from_block,
                    to_block
                );
                Ok::<_, CouncilError>(ids)
            })
            .await
    }

    async fn get_pool_reserves(&self, pool_id: PoolId) -> Result<PoolReserves, SharedError> {
        let reserves = self.source.call("reserves", vec![pool_id.into()]).await?;
        let decimals = self.get_decimals().await?;

        Ok(PoolReserves {
            shares: to_decimal(uint_at(&reserves, 0, "reserves")?, decimals)
                .map_err(CouncilError::from)?,
            bonds: to_decimal(uint_at(&reserves, 1, "reserves")?, decimals)
                .map_err(CouncilError::from)?,
        })
    }

    async fn get_pool_parameters(&self, pool_id: PoolId) -> Result<PoolParameters, SharedError> {
        let parameters = self.source.call("parameters", vec![pool_id.into()]).await?;
        let time_stretch = uint_at(&parameters, 0, "parameters")?;
        let mu = uint_at(&parameters, 1, "parameters")?;

        if time_stretch > U256::from(u64::MAX) {
            return Err(Arc::new(CouncilError::Decode(format!(
                "timeStretch {} out of range",
                time_stretch
            ))));
        }

        Ok(PoolParameters {
            mu: to_decimal(mu, MU_DECIMALS).map_err(CouncilError::from)?,
            time_stretch: time_stretch_to_decimal(time_stretch.as_u64()),
        })
    }

    async fn get_balance_of(&self, pool_id: PoolId, address: Address) -> Result<String, SharedError> {
        let balance = self
            .source
            .call("balanceOf", vec![pool_id.into(), address.into()])
            .await?;
        Ok(uint_at(&balance, 0, "balanceOf")?.to_string())
    }

    async fn get_multi_term(&self) -> Result<Address, SharedError> {
        let term = self.source.call("term", vec![]).await?;
        Ok(address_at(&term, 0, "term")?)
    }

    async fn get_base_asset(&self) -> Result<Address, SharedError> {
        let token = self.source.call("token", vec![]).await?;
        Ok(address_at(&token, 0, "token")?)
    }

    async fn get_symbol(&self, pool_id: PoolId) -> Result<String, SharedError> {
        let symbol = self.source.call("symbol", vec![pool_id.into()]).await?;
        Ok(string_at(&symbol, 0, "symbol")?)
    }

    async fn get_name(&self, pool_id: PoolId) -> Result<String, SharedError> {
        let name = self.source.call("name", vec![pool_id.into()]).await?;
        Ok(string_at(&name, 0, "name")?)
    }

    async fn get_decimals(&self) -> Result<u8, SharedError> {
        let decimals = self.source.call("decimals", vec![]).await?;
        let raw = uint_at(&decimals, 0, "decimals")?;
        if raw > U256::from(u8::MAX) {
            return Err(Arc::new(CouncilError::Decode(format!("decimals {} out of range", raw))));
        }
        Ok(raw.as_u32() as u8)
    }
}

fn to_pool_id(raw: U256) -> Result<PoolId, CouncilError> {
    if raw > U256::from(u64::MAX) {
        return Err(CouncilError::Decode(format!("pool id {} out of range", raw)));
    }
    Ok(raw.as_u64())
}
