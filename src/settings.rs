use config::{Config, ConfigError, File};
use ethers::types::Address;
use serde::Deserialize;
use std::env;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Rpc {
    pub http_url: String,
    pub chain_id: u64,
    #[serde(default = "default_qps_limit")]
    pub qps_limit: u32,
    /// Attempts after the first for a failed read. Writes are never retried.
    #[serde(default = "default_read_retries")]
    pub read_retries: usize,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Blocks to wait for after inclusion before a transaction counts as mined.
    #[serde(default = "default_confirmations")]
    pub confirmations: usize,
}

fn default_qps_limit() -> u32 {
    25
}
fn default_read_retries() -> usize {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    200
}
fn default_confirmations() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct Contracts {
    pub multi_pool: Address,
    pub locking_vault: Address,
    pub core_voting: Address,
    /// Vaults whose voting power is counted when casting a ballot.
    #[serde(default)]
    pub voting_vaults: Vec<Address>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Governance {
    #[serde(default = "default_voting_window_blocks")]
    pub voting_window_blocks: u64,
}

fn default_voting_window_blocks() -> u64 {
    // ~3 days of 12s blocks
    21_600
}

impl Default for Governance {
    fn default() -> Self {
        Self {
            voting_window_blocks: default_voting_window_blocks(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Cache {
    /// Resolved entries older than this are refetched. Unset: fresh until invalidated.
    #[serde(default)]
    pub max_age_seconds: Option<u64>,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            max_age_seconds: None,
            event_capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlockNumber {
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
}

fn default_update_interval_ms() -> u64 {
    1000
}

impl Default for BlockNumber {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Explorer {
    #[serde(default = "default_tx_url_base")]
    pub tx_url_base: String,
}

fn default_tx_url_base() -> String {
    "https://etherscan.io/tx".to_string()
}

impl Default for Explorer {
    fn default() -> Self {
        Self {
            tx_url_base: default_tx_url_base(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Log {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub rpc: Rpc,
    pub contracts: Contracts,
    #[serde(default)]
    pub governance: Governance,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub block_number: BlockNumber,
    #[serde(default)]
    pub explorer: Explorer,
    #[serde(default)]
    pub log: Log,
}

impl Settings {
    /// Loads `Config.toml` from the working directory, then applies `SDK_*`
    /// environment overrides.
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("Config.toml"))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;
        settings.apply_overrides(|key| env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;
        settings.apply_overrides(|key| env::var(key).ok())?;
        Ok(settings)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = lookup("SDK_RPC_HTTP_URL") {
            self.rpc.http_url = url;
        }
        if let Some(addr) = lookup("SDK_CONTRACTS_MULTI_POOL") {
            self.contracts.multi_pool = parse_address("SDK_CONTRACTS_MULTI_POOL", &addr)?;
        }
        if let Some(addr) = lookup("SDK_CONTRACTS_LOCKING_VAULT") {
            self.contracts.locking_vault = parse_address("SDK_CONTRACTS_LOCKING_VAULT", &addr)?;
        }
        if let Some(addr) = lookup("SDK_CONTRACTS_CORE_VOTING") {
            self.contracts.core_voting = parse_address("SDK_CONTRACTS_CORE_VOTING", &addr)?;
        }
        if let Some(raw) = lookup("SDK_CONTRACTS_VOTING_VAULTS") {
            self.contracts.voting_vaults = parse_string_list(&raw)
                .iter()
                .map(|a| parse_address("SDK_CONTRACTS_VOTING_VAULTS", a))
                .collect::<Result<_, _>>()?;
        }
        Ok(())
    }

    /// Checks what deserialization alone does not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.rpc.http_url)
            .map_err(|e| ConfigError::Message(format!("rpc.http_url: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Message(format!(
                "rpc.http_url must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.rpc.qps_limit == 0 {
            return Err(ConfigError::Message("rpc.qps_limit must be non-zero".into()));
        }
        if self.cache.event_capacity == 0 {
            return Err(ConfigError::Message("cache.event_capacity must be non-zero".into()));
        }
        if self.block_number.update_interval_ms == 0 {
            return Err(ConfigError::Message(
                "block_number.update_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn parse_address(key: &str, raw: &str) -> Result<Address, ConfigError> {
    raw.parse()
        .map_err(|e| ConfigError::Message(format!("{}: invalid address {}: {}", key, raw, e)))
}

/// Accepts a JSON array (`["0x..","0x.."]`) or a comma separated list.
fn parse_string_list(input: &str) -> Vec<String> {
    let trimmed = input.trim();
    if trimmed.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
            return list;
        }
    }
    trimmed
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
