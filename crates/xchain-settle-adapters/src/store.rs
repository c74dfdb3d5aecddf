use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use xchain_settle_core::{
    payment_supersedes, BurnCheckpoint, PaymentWriteBack, PortError, RecordStorePort,
    SettlementTarget, TargetStatus, WriteBackOutcome,
};

use crate::AdapterConfig;

/// Record store for settlement targets: an HTTP service in deployed
/// profiles, an in-process map otherwise.
#[derive(Debug, Clone)]
pub struct RecordStoreAdapter {
    mode: StoreMode,
}

#[derive(Debug, Clone)]
enum StoreMode {
    Disabled(String),
    InMemory(Arc<Mutex<StoreState>>),
    Http(HttpStore),
}

#[derive(Debug, Clone)]
struct HttpStore {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<String, StoredTarget>,
}

#[derive(Debug, Clone)]
struct StoredTarget {
    target: SettlementTarget,
    payment: Option<PaymentWriteBack>,
    checkpoint: Option<BurnCheckpoint>,
}

impl Default for RecordStoreAdapter {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl RecordStoreAdapter {
    pub fn in_memory() -> Self {
        Self {
            mode: StoreMode::InMemory(Arc::new(Mutex::new(StoreState::default()))),
        }
    }

    pub fn with_config(config: &AdapterConfig) -> Self {
        let mode = match &config.record_store_url {
            Some(url) => {
                let timeout = Duration::from_millis(config.http_timeout_ms);
                match reqwest::blocking::Client::builder().timeout(timeout).build() {
                    Ok(client) => StoreMode::Http(HttpStore {
                        base_url: url.trim_end_matches('/').to_owned(),
                        client,
                    }),
                    Err(e) => StoreMode::Disabled(format!(
                        "failed to initialize record store client: {e}"
                    )),
                }
            }
            None if config.strict_runtime_required() => StoreMode::Disabled(
                "record store URL not configured in production runtime profile".to_owned(),
            ),
            None => return Self::in_memory(),
        };
        Self { mode }
    }

    /// Create a target. A second insert for the same id is a duplicate key.
    pub fn insert_target(&self, target: SettlementTarget) -> Result<(), PortError> {
        let state = self.memory("insert_target")?;
        let mut g = lock(state)?;
        if g.records.contains_key(&target.id) {
            return Err(PortError::Conflict(format!(
                "duplicate target id: {}",
                target.id
            )));
        }
        g.records.insert(
            target.id.clone(),
            StoredTarget {
                target,
                payment: None,
                checkpoint: None,
            },
        );
        Ok(())
    }

    pub fn set_status(&self, target_id: &str, status: TargetStatus) -> Result<(), PortError> {
        let state = self.memory("set_status")?;
        let mut g = lock(state)?;
        let record = g
            .records
            .get_mut(target_id)
            .ok_or_else(|| PortError::NotFound(format!("target missing: {target_id}")))?;
        record.target.current_status = status;
        Ok(())
    }

    pub fn payment(&self, target_id: &str) -> Result<Option<PaymentWriteBack>, PortError> {
        let state = self.memory("payment")?;
        let g = lock(state)?;
        Ok(g.records.get(target_id).and_then(|r| r.payment.clone()))
    }

    pub fn checkpoint(&self, target_id: &str) -> Result<Option<BurnCheckpoint>, PortError> {
        let state = self.memory("checkpoint")?;
        let g = lock(state)?;
        Ok(g.records.get(target_id).and_then(|r| r.checkpoint.clone()))
    }

    fn memory(&self, op: &'static str) -> Result<&Arc<Mutex<StoreState>>, PortError> {
        match &self.mode {
            StoreMode::InMemory(state) => Ok(state),
            StoreMode::Disabled(reason) => Err(PortError::Policy(reason.clone())),
            StoreMode::Http(_) => Err(PortError::NotImplemented(op)),
        }
    }
}

fn lock(state: &Arc<Mutex<StoreState>>) -> Result<std::sync::MutexGuard<'_, StoreState>, PortError> {
    state
        .lock()
        .map_err(|e| PortError::Transport(format!("record store lock poisoned: {e}")))
}

impl RecordStorePort for RecordStoreAdapter {
    fn get_target(&self, target_id: &str) -> Result<Option<SettlementTarget>, PortError> {
        match &self.mode {
            StoreMode::InMemory(state) => {
                let g = lock(state)?;
                Ok(g.records.get(target_id).map(|r| r.target.clone()))
            }
            StoreMode::Http(http) => http.get(&format!("/targets/{target_id}")),
            StoreMode::Disabled(reason) => Err(PortError::Policy(reason.clone())),
        }
    }

    fn apply_payment(&self, write: &PaymentWriteBack) -> Result<WriteBackOutcome, PortError> {
        match &self.mode {
            StoreMode::InMemory(state) => {
                let mut g = lock(state)?;
                let record = g.records.get_mut(&write.target_id).ok_or_else(|| {
                    PortError::NotFound(format!("target missing: {}", write.target_id))
                })?;
                let existing = record.payment.as_ref().map(|p| p.source);
                if !payment_supersedes(write.source, existing) {
                    // supersedes only returns false when a payment exists
                    let existing = existing.unwrap_or(write.source);
                    return Ok(WriteBackOutcome::Skipped { existing });
                }
                record.payment = Some(write.clone());
                record.target.current_status = TargetStatus::Paid;
                Ok(WriteBackOutcome::Applied { replaced: existing })
            }
            StoreMode::Http(http) => {
                http.send_json(
                    reqwest::Method::POST,
                    &format!("/targets/{}/payment", write.target_id),
                    write,
                )
            }
            StoreMode::Disabled(reason) => Err(PortError::Policy(reason.clone())),
        }
    }

    fn save_checkpoint(&self, target_id: &str, checkpoint: &BurnCheckpoint) -> Result<(), PortError> {
        match &self.mode {
            StoreMode::InMemory(state) => {
                let mut g = lock(state)?;
                let record = g
                    .records
                    .get_mut(target_id)
                    .ok_or_else(|| PortError::NotFound(format!("target missing: {target_id}")))?;
                record.checkpoint = Some(checkpoint.clone());
                Ok(())
            }
            StoreMode::Http(http) => {
                let _: serde_json::Value = http.send_json(
                    reqwest::Method::PUT,
                    &format!("/targets/{target_id}/checkpoint"),
                    checkpoint,
                )?;
                Ok(())
            }
            StoreMode::Disabled(reason) => Err(PortError::Policy(reason.clone())),
        }
    }
}

impl HttpStore {
    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, PortError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .map_err(|e| PortError::Transport(format!("record store request failed: {e}")))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!("record store status {status}")));
        }
        response
            .json()
            .map(Some)
            .map_err(|e| PortError::Transport(format!("record store json decode failed: {e}")))
    }

    fn send_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<T, PortError> {
        let response = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .map_err(|e| PortError::Transport(format!("record store request failed: {e}")))?;
        let status = response.status();
        let text = response.text().unwrap_or_default();
        match status {
            StatusCode::CONFLICT => Err(PortError::Conflict(text)),
            StatusCode::NOT_FOUND => Err(PortError::NotFound(text)),
            s if !s.is_success() => Err(PortError::Transport(format!(
                "record store status {s}: {text}"
            ))),
            _ if text.trim().is_empty() => serde_json::from_str("null")
                .map_err(|e| PortError::Transport(format!("record store empty response: {e}"))),
            _ => serde_json::from_str(&text)
                .map_err(|e| PortError::Transport(format!("record store json decode failed: {e}"))),
        }
    }
}
