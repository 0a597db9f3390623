//! Integration tests for the multi-pool data source

mod common;

use common::*;
use council_sync_sdk::multi_pool::{MultiPoolContractDataSource, MultiPoolDataSource};
use council_sync_sdk::query_cache::QueryCache;
use council_sync_sdk::ContractBinding;
use ethers::abi::Token;
use std::sync::Arc;

fn data_source(chain: &Arc<MockChain>) -> MultiPoolContractDataSource {
    let binding = ContractBinding::new(MULTI_POOL, multi_pool_abi(), chain.clone());
    MultiPoolContractDataSource::new(binding, Arc::new(QueryCache::new(None, 64)))
}

#[tokio::test]
async fn test_reserves_and_parameters_use_distinct_scales() {
    let chain = MockChain::new();
    let abi = multi_pool_abi();
    chain.respond(MULTI_POOL, abi, "decimals", &[], &[uint(18)]);
    chain.respond(
        MULTI_POOL,
        abi,
        "reserves",
        &[uint(7)],
        &[
            Token::Uint(ethers::types::U256::from(2_500_000_000_000_000_000u128)),
            scaled(1000, 18),
        ],
    );
    chain.respond(
        MULTI_POOL,
        abi,
        "parameters",
        &[uint(7)],
        &[uint(22_186), Token::Uint(ethers::types::U256::from(50_000_000_000_000_000u128))],
    );
    let pools = data_source(&chain);

    let reserves = pools.get_pool_reserves(7).await.unwrap();
    assert_eq!(reserves.shares, "2.5");
    assert_eq!(reserves.bonds, "1000");

    let parameters = pools.get_pool_parameters(7).await.unwrap();
    assert_eq!(parameters.time_stretch, "22.186");
    assert_eq!(parameters.mu, "0.05");
}

#[tokio::test]
async fn test_balance_is_raw_while_reserves_are_scaled() {
    let chain = MockChain::new();
    let abi = multi_pool_abi();
    let owner = addr(0xaa);
    let raw = Token::Uint(ethers::types::U256::from(2_500_000_000_000_000_000u128));
    chain.respond(MULTI_POOL, abi, "decimals", &[], &[uint(18)]);
    chain.respond(MULTI_POOL, abi, "reserves", &[uint(1)], &[raw.clone(), raw.clone()]);
    chain.respond(MULTI_POOL, abi, "balanceOf", &[uint(1), Token::Address(owner)], &[raw]);
    let pools = data_source(&chain);

    assert_eq!(pools.get_balance_of(1, owner).await.unwrap(), "2500000000000000000");
    assert_eq!(pools.get_pool_reserves(1).await.unwrap().shares, "2.5");
}

#[tokio::test]
async fn test_reserves_follow_token_decimals() {
    let chain = MockChain::new();
    let abi = multi_pool_abi();
    chain.respond(MULTI_POOL, abi, "decimals", &[], &[uint(6)]);
    chain.respond(MULTI_POOL, abi, "reserves", &[uint(2)], &[uint(1_500_000), uint(1)]);
    let pools = data_source(&chain);

    let reserves = pools.get_pool_reserves(2).await.unwrap();
    assert_eq!(reserves.shares, "1.5");
    assert_eq!(reserves.bonds, "0.000001");

    // decimals is read once and reused
    pools.get_pool_reserves(2).await.unwrap();
    assert_eq!(chain.calls(), 2);
}

#[tokio::test]
async fn test_pool_ids_are_deduplicated_and_cached_per_range() {
    let chain = MockChain::new();
    chain.push_log(pool_registered(1, 10));
    chain.push_log(pool_registered(2, 20));
    chain.push_log(pool_registered(2, 25));
    chain.push_log(pool_registered(3, 30));
    let pools = data_source(&chain);

    assert_eq!(pools.get_pool_ids(None, None).await.unwrap(), vec![1, 2, 3]);
    assert_eq!(pools.get_pool_ids(Some(15), Some(25)).await.unwrap(), vec![2]);
    assert_eq!(chain.log_queries(), 2);

    pools.get_pool_ids(None, None).await.unwrap();
    pools.get_pool_ids(Some(15), Some(25)).await.unwrap();
    assert_eq!(chain.log_queries(), 2, "each range is served from its own cache entry");

    assert_eq!(pools.get_pool_ids(Some(26), None).await.unwrap(), vec![3]);
    assert_eq!(chain.log_queries(), 3);
}

#[tokio::test]
async fn test_metadata_reads() {
    let chain = MockChain::new();
    let abi = multi_pool_abi();
    chain.respond(MULTI_POOL, abi, "term", &[], &[Token::Address(addr(0x51))]);
    chain.respond(MULTI_POOL, abi, "token", &[], &[Token::Address(addr(0x52))]);
    chain.respond(MULTI_POOL, abi, "name", &[uint(4)], &[Token::String("Element Yield".into())]);
    chain.respond(MULTI_POOL, abi, "symbol", &[uint(4)], &[Token::String("eY".into())]);
    chain.respond(MULTI_POOL, abi, "decimals", &[], &[uint(18)]);
    let pools = data_source(&chain);

    assert_eq!(pools.get_multi_term().await.unwrap(), addr(0x51));
    assert_eq!(pools.get_base_asset().await.unwrap(), addr(0x52));
    assert_eq!(pools.get_name(4).await.unwrap(), "Element Yield");
    assert_eq!(pools.get_symbol(4).await.unwrap(), "eY");
    assert_eq!(pools.get_decimals().await.unwrap(), 18);
}

#[tokio::test]
async fn test_unknown_pool_surfaces_transport_error() {
    let chain = MockChain::new();
    let pools = data_source(&chain);
    let err = pools.get_name(99).await.unwrap_err();
    assert_eq!(err.kind(), "transport");
}
