use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{Revert, SolError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use xchain_settle_core::{
    ChainReadPort, ChainRegistry, PortError, ReceiptLog, TxReceipt, TxRequest,
};

use crate::AdapterConfig;

/// Blocking JSON-RPC 2.0 client for a single endpoint.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    url: String,
    client: reqwest::blocking::Client,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Result<Self, PortError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| PortError::Transport(format!("json-rpc client init failed: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn call(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .map_err(|e| PortError::Transport(format!("{method} request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .map_err(|e| PortError::Transport(format!("{method} json decode failed: {e}")))?;
        if let Some(err) = body.get("error") {
            return Err(rpc_error(method, err));
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "{method} status {status}: {body}"
            )));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport(format!("{method} response missing result")))
    }
}

/// Map a JSON-RPC error object. Reverts keep their decoded reason; user
/// rejections become policy errors.
fn rpc_error(method: &str, err: &Value) -> PortError {
    let code = err.get("code").and_then(Value::as_i64).unwrap_or_default();
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_owned();
    let data = err.get("data").and_then(|d| match d {
        Value::String(s) => Some(s.as_str()),
        Value::Object(o) => o.get("data").and_then(Value::as_str),
        _ => None,
    });
    if code == 3 || message.to_ascii_lowercase().contains("revert") {
        let reason = data.and_then(decode_revert).unwrap_or(message);
        return PortError::Reverted(reason);
    }
    if code == 4001 {
        return PortError::Policy(format!("{method} rejected by user: {message}"));
    }
    if code == -32601 {
        return PortError::NotFound(format!("{method} not supported: {message}"));
    }
    PortError::Transport(format!("{method} returned error {code}: {message}"))
}

fn decode_revert(raw: &str) -> Option<String> {
    let bytes = alloy::hex::decode(raw).ok()?;
    if bytes.len() < 4 || bytes[..4] != Revert::SELECTOR {
        return None;
    }
    Revert::abi_decode(&bytes, true).ok().map(|r| r.reason)
}

pub(crate) fn quantity_u64(value: &Value, field: &str) -> Result<u64, PortError> {
    let raw = value
        .as_str()
        .ok_or_else(|| PortError::Validation(format!("{field}: hex string expected")))?;
    u64::from_str_radix(raw.trim_start_matches("0x"), 16)
        .map_err(|e| PortError::Validation(format!("{field}: invalid quantity {raw}: {e}")))
}

pub(crate) fn tx_json(tx: &TxRequest) -> Value {
    let mut obj = json!({
        "to": tx.to.to_string(),
        "data": tx.data.to_string(),
    });
    if let Some(from) = tx.from {
        obj["from"] = json!(from.to_string());
    }
    if let Some(value) = tx.value {
        obj["value"] = json!(format!("{value:#x}"));
    }
    obj
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

#[derive(Debug, Deserialize)]
struct RpcLog {
    address: Address,
    #[serde(default)]
    topics: Vec<B256>,
    #[serde(default)]
    data: Bytes,
}

impl RpcReceipt {
    fn into_receipt(self) -> Result<TxReceipt, PortError> {
        let success = match self.status.as_deref() {
            Some(status) => quantity_u64(&json!(status), "status")? == 1,
            None => {
                return Err(PortError::Validation(
                    "receipt without status field".to_owned(),
                ))
            }
        };
        let block_number = self
            .block_number
            .as_deref()
            .map(|n| quantity_u64(&json!(n), "blockNumber"))
            .transpose()?;
        Ok(TxReceipt {
            transaction_hash: self.transaction_hash,
            success,
            block_number,
            logs: self
                .logs
                .into_iter()
                .map(|log| ReceiptLog {
                    address: log.address,
                    topics: log.topics,
                    data: log.data,
                })
                .collect(),
        })
    }
}

/// Node reads routed to each chain's configured endpoint.
#[derive(Debug, Clone)]
pub struct JsonRpcReader {
    endpoints: HashMap<u64, JsonRpcClient>,
}

impl JsonRpcReader {
    pub fn new(registry: &ChainRegistry, config: &AdapterConfig) -> Result<Self, PortError> {
        let mut endpoints = HashMap::new();
        for chain in registry.chains() {
            endpoints.insert(
                chain.chain_id,
                JsonRpcClient::new(chain.node_endpoint.clone(), config.http_timeout_ms)?,
            );
        }
        Ok(Self { endpoints })
    }

    fn endpoint(&self, chain_id: u64) -> Result<&JsonRpcClient, PortError> {
        self.endpoints
            .get(&chain_id)
            .ok_or_else(|| PortError::NotFound(format!("no node endpoint for chain {chain_id}")))
    }
}

impl ChainReadPort for JsonRpcReader {
    fn native_balance(&self, chain_id: u64, address: Address) -> Result<U256, PortError> {
        let result = self
            .endpoint(chain_id)?
            .call("eth_getBalance", json!([address.to_string(), "latest"]))?;
        let raw = result
            .as_str()
            .ok_or_else(|| PortError::Validation("eth_getBalance: hex string expected".to_owned()))?;
        raw.parse()
            .map_err(|e| PortError::Validation(format!("eth_getBalance: invalid quantity {raw}: {e}")))
    }

    fn call(&self, chain_id: u64, tx: &TxRequest) -> Result<Bytes, PortError> {
        let result = self
            .endpoint(chain_id)?
            .call("eth_call", json!([tx_json(tx), "latest"]))?;
        let raw = result
            .as_str()
            .ok_or_else(|| PortError::Validation("eth_call: hex string expected".to_owned()))?;
        raw.parse()
            .map_err(|e| PortError::Validation(format!("eth_call: invalid hex: {e}")))
    }

    fn transaction_receipt(
        &self,
        chain_id: u64,
        tx_hash: B256,
    ) -> Result<Option<TxReceipt>, PortError> {
        let result = self
            .endpoint(chain_id)?
            .call("eth_getTransactionReceipt", json!([tx_hash.to_string()]))?;
        if result.is_null() {
            debug!(chain_id, %tx_hash, "receipt not mined yet");
            return Ok(None);
        }
        let receipt: RpcReceipt = serde_json::from_value(result)
            .map_err(|e| PortError::Validation(format!("malformed receipt: {e}")))?;
        receipt.into_receipt().map(Some)
    }
}
