use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ChainConfig;
use crate::error::TransferError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry json is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("chain id {0} is configured twice")]
    DuplicateChain(u64),
    #[error("chain id {chain_id} shares verifier domain {domain} with another chain")]
    DuplicateDomain { chain_id: u64, domain: u32 },
    #[error("route {0} -> {1} references an unconfigured chain")]
    UnknownRouteChain(u64, u64),
    #[error("route {0} -> {0} has the same source and destination")]
    SelfRoute(u64),
}

#[derive(Debug, Deserialize, Serialize)]
struct RegistryFile {
    chains: Vec<ChainConfig>,
    #[serde(default)]
    routes: Option<Vec<(u64, u64)>>,
}

/// Immutable per-chain configuration plus the set of allowed transfer routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRegistry {
    chains: BTreeMap<u64, ChainConfig>,
    routes: BTreeSet<(u64, u64)>,
}

impl ChainRegistry {
    pub fn new(
        chains: Vec<ChainConfig>,
        routes: impl IntoIterator<Item = (u64, u64)>,
    ) -> Result<Self, RegistryError> {
        let mut by_id = BTreeMap::new();
        let mut domains = BTreeSet::new();
        for chain in chains {
            if !domains.insert(chain.verifier_domain_id) {
                return Err(RegistryError::DuplicateDomain {
                    chain_id: chain.chain_id,
                    domain: chain.verifier_domain_id,
                });
            }
            let chain_id = chain.chain_id;
            if by_id.insert(chain_id, chain).is_some() {
                return Err(RegistryError::DuplicateChain(chain_id));
            }
        }
        let mut route_set = BTreeSet::new();
        for (source, destination) in routes {
            if source == destination {
                return Err(RegistryError::SelfRoute(source));
            }
            if !by_id.contains_key(&source) || !by_id.contains_key(&destination) {
                return Err(RegistryError::UnknownRouteChain(source, destination));
            }
            route_set.insert((source, destination));
        }
        Ok(Self {
            chains: by_id,
            routes: route_set,
        })
    }

    /// Every configured chain may transfer to every other one.
    pub fn fully_connected(chains: Vec<ChainConfig>) -> Result<Self, RegistryError> {
        let ids: Vec<u64> = chains.iter().map(|c| c.chain_id).collect();
        let routes: Vec<(u64, u64)> = ids
            .iter()
            .flat_map(|s| ids.iter().filter(move |d| *d != s).map(move |d| (*s, *d)))
            .collect();
        Self::new(chains, routes)
    }

    /// Load `{ "chains": [...], "routes": [[src, dst], ...] }`. Without a
    /// `routes` key the registry is fully connected.
    pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_json::from_str(raw)?;
        match file.routes {
            Some(routes) => Self::new(file.chains, routes),
            None => Self::fully_connected(file.chains),
        }
    }

    pub fn get(&self, chain_id: u64) -> Result<&ChainConfig, TransferError> {
        self.chains
            .get(&chain_id)
            .ok_or(TransferError::ChainNotFound { chain_id })
    }

    /// Resolve both ends of a transfer, refusing pairs outside the route set.
    pub fn route(
        &self,
        source_chain_id: u64,
        destination_chain_id: u64,
    ) -> Result<(&ChainConfig, &ChainConfig), TransferError> {
        let source = self.get(source_chain_id)?;
        let destination = self.get(destination_chain_id)?;
        if !self.routes.contains(&(source_chain_id, destination_chain_id)) {
            return Err(TransferError::UnsupportedRoute {
                source_chain_id,
                destination_chain_id,
            });
        }
        Ok((source, destination))
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values()
    }

    pub fn routes(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.routes.iter().copied()
    }

    pub fn by_domain(&self, domain: u32) -> Option<&ChainConfig> {
        self.chains.values().find(|c| c.verifier_domain_id == domain)
    }
}
