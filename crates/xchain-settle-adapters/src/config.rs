use std::path::PathBuf;

use alloy::primitives::{address, Address};
use thiserror::Error;

use xchain_settle_core::{ChainConfig, ChainRegistry, RegistryError, TransferPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeProfile {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name} is invalid: {reason}")]
    InvalidVar { name: &'static str, reason: String },
    #[error("failed to read chain registry {path}: {source}")]
    RegistryFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub runtime_profile: RuntimeProfile,
    pub wallet_proxy_url: Option<String>,
    pub verifier_base_url: String,
    pub record_store_url: Option<String>,
    pub http_timeout_ms: u64,
    pub registry_path: Option<PathBuf>,
    pub policy: TransferPolicy,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            runtime_profile: RuntimeProfile::Development,
            wallet_proxy_url: None,
            verifier_base_url: "https://iris-api-sandbox.circle.com/v2".to_owned(),
            record_store_url: None,
            http_timeout_ms: 15_000,
            registry_path: None,
            policy: TransferPolicy::default(),
        }
    }
}

impl AdapterConfig {
    /// Defaults overridden by any `XCS_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(profile) = get("XCS_RUNTIME_PROFILE") {
            cfg.runtime_profile = match profile.trim().to_ascii_lowercase().as_str() {
                "development" | "dev" => RuntimeProfile::Development,
                "production" | "prod" => RuntimeProfile::Production,
                other => {
                    return Err(ConfigError::InvalidVar {
                        name: "XCS_RUNTIME_PROFILE",
                        reason: format!("unknown profile {other:?}"),
                    })
                }
            };
        }
        if let Some(url) = get("XCS_WALLET_PROXY_URL") {
            cfg.wallet_proxy_url = Some(url);
        }
        if let Some(url) = get("XCS_VERIFIER_URL") {
            cfg.verifier_base_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(url) = get("XCS_RECORD_STORE_URL") {
            cfg.record_store_url = Some(url);
        }
        if let Some(path) = get("XCS_CHAIN_REGISTRY") {
            cfg.registry_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = get("XCS_HTTP_TIMEOUT_MS") {
            cfg.http_timeout_ms = parse_u64("XCS_HTTP_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = get("XCS_ATTESTATION_MAX_ATTEMPTS") {
            let attempts = parse_u64("XCS_ATTESTATION_MAX_ATTEMPTS", &raw)?;
            cfg.policy.attestation.max_attempts =
                u32::try_from(attempts).map_err(|e| ConfigError::InvalidVar {
                    name: "XCS_ATTESTATION_MAX_ATTEMPTS",
                    reason: e.to_string(),
                })?;
        }
        if let Some(raw) = get("XCS_CHAIN_SWITCH_ATTEMPTS") {
            let attempts = parse_u64("XCS_CHAIN_SWITCH_ATTEMPTS", &raw)?;
            cfg.policy.chain_switch.max_attempts =
                u32::try_from(attempts).map_err(|e| ConfigError::InvalidVar {
                    name: "XCS_CHAIN_SWITCH_ATTEMPTS",
                    reason: e.to_string(),
                })?;
        }
        if let Some(raw) = get("XCS_FALLBACK_FEE_BPS") {
            cfg.policy.fees.fallback_bps = parse_u64("XCS_FALLBACK_FEE_BPS", &raw)?;
        }
        if let Some(raw) = get("XCS_PERSIST_CHECKPOINT") {
            cfg.policy.persist_checkpoint = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(ConfigError::InvalidVar {
                        name: "XCS_PERSIST_CHECKPOINT",
                        reason: format!("expected a boolean, got {other:?}"),
                    })
                }
            };
        }
        Ok(cfg)
    }

    /// Production refuses to fall back to in-process stand-ins.
    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }

    /// The registry file when configured, else the built-in testnet set.
    pub fn load_registry(&self) -> Result<ChainRegistry, ConfigError> {
        match &self.registry_path {
            Some(path) => {
                let raw =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::RegistryFile {
                        path: path.clone(),
                        source,
                    })?;
                Ok(ChainRegistry::from_json(&raw)?)
            }
            None => Ok(testnet_registry()?),
        }
    }
}

fn parse_u64(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| ConfigError::InvalidVar {
            name,
            reason: e.to_string(),
        })
}

const TOKEN_MESSENGER_V2: Address = address!("8FE6B999Dc680CcFDD5Bf7EB0974218be2542DAA");
const MESSAGE_TRANSMITTER_V2: Address = address!("E737e5cEBEEBa77EFE34D4aa090756590b1CE275");

/// Sepolia, Base Sepolia and Arbitrum Sepolia, all routes between them.
pub fn testnet_registry() -> Result<ChainRegistry, RegistryError> {
    let chain = |chain_id: u64,
                 name: &str,
                 domain: u32,
                 token: Address,
                 rpc: &str,
                 explorer: &str| ChainConfig {
        chain_id,
        name: name.to_owned(),
        verifier_domain_id: domain,
        token_address: token,
        burn_contract_address: TOKEN_MESSENGER_V2,
        relay_contract_address: MESSAGE_TRANSMITTER_V2,
        node_endpoint: rpc.to_owned(),
        explorer_url: explorer.to_owned(),
    };
    ChainRegistry::fully_connected(vec![
        chain(
            11_155_111,
            "Ethereum Sepolia",
            0,
            address!("1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"),
            "https://ethereum-sepolia-rpc.publicnode.com",
            "https://sepolia.etherscan.io",
        ),
        chain(
            84_532,
            "Base Sepolia",
            6,
            address!("036CbD53842c5426634e7929541eC2318f3dCF7e"),
            "https://sepolia.base.org",
            "https://sepolia.basescan.org",
        ),
        chain(
            421_614,
            "Arbitrum Sepolia",
            3,
            address!("75faf114eafb1BDbe2F0316DF893fd58CE46AA4d"),
            "https://sepolia-rollup.arbitrum.io/rpc",
            "https://sepolia.arbiscan.io",
        ),
    ])
}
