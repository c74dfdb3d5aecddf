use alloy::primitives::{Address, B256};
use serde_json::{json, Value};
use tracing::info;

use xchain_settle_core::{PortError, ProviderPort, TxRequest};

use crate::rpc::{quantity_u64, tx_json, JsonRpcClient};
use crate::AdapterConfig;

/// Wallet reached through a JSON-RPC proxy that forwards wallet requests
/// (`eth_requestAccounts`, `wallet_switchEthereumChain`, ...) to a signer.
#[derive(Debug, Clone)]
pub struct WalletProxyAdapter {
    mode: WalletMode,
}

#[derive(Debug, Clone)]
enum WalletMode {
    Disabled(String),
    Unconfigured,
    Proxy(JsonRpcClient),
}

impl WalletProxyAdapter {
    pub fn with_config(config: &AdapterConfig) -> Self {
        let mode = match &config.wallet_proxy_url {
            Some(url) => match JsonRpcClient::new(url.clone(), config.http_timeout_ms) {
                Ok(client) => WalletMode::Proxy(client),
                Err(e) if config.strict_runtime_required() => WalletMode::Disabled(format!(
                    "failed to initialize wallet proxy client in production profile: {e}"
                )),
                Err(_) => WalletMode::Unconfigured,
            },
            None if config.strict_runtime_required() => WalletMode::Disabled(
                "wallet proxy URL not configured in production runtime profile".to_owned(),
            ),
            None => WalletMode::Unconfigured,
        };
        Self { mode }
    }

    fn proxy_call(&self, method: &str, params: Value) -> Result<Value, PortError> {
        match &self.mode {
            WalletMode::Proxy(client) => client.call(method, params),
            WalletMode::Disabled(reason) => Err(PortError::Policy(reason.clone())),
            WalletMode::Unconfigured => Err(PortError::NotImplemented(
                "wallet proxy runtime not enabled",
            )),
        }
    }
}

impl ProviderPort for WalletProxyAdapter {
    fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        let result = self.proxy_call("eth_requestAccounts", json!([]))?;
        let arr = result
            .as_array()
            .ok_or_else(|| PortError::Transport("eth_requestAccounts: array expected".to_owned()))?;
        let mut accounts = Vec::with_capacity(arr.len());
        for item in arr {
            let raw = item.as_str().ok_or_else(|| {
                PortError::Transport("eth_requestAccounts: string expected".to_owned())
            })?;
            let parsed: Address = raw
                .parse()
                .map_err(|e| PortError::Validation(format!("invalid account address: {e}")))?;
            accounts.push(parsed);
        }
        Ok(accounts)
    }

    fn chain_id(&self) -> Result<u64, PortError> {
        let result = self.proxy_call("eth_chainId", json!([]))?;
        quantity_u64(&result, "eth_chainId")
    }

    fn switch_chain(&self, chain_id: u64) -> Result<(), PortError> {
        self.proxy_call(
            "wallet_switchEthereumChain",
            json!([{ "chainId": format!("0x{chain_id:x}") }]),
        )?;
        info!(chain_id, "wallet switch requested");
        Ok(())
    }

    fn send_transaction(&self, tx: &TxRequest) -> Result<B256, PortError> {
        let result = self.proxy_call("eth_sendTransaction", json!([tx_json(tx)]))?;
        let hash = result.as_str().ok_or_else(|| {
            PortError::Transport("eth_sendTransaction must return tx hash".to_owned())
        })?;
        hash.parse()
            .map_err(|e| PortError::Validation(format!("invalid tx hash: {e}")))
    }
}
