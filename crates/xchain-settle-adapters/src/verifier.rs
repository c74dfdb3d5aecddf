use std::time::Duration;

use alloy::primitives::B256;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use xchain_settle_core::{FeeQuote, PortError, VerifierMessage, VerifierPort};

use crate::AdapterConfig;

#[derive(Debug, Clone)]
pub struct VerifierHttpAdapter {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<VerifierMessage>,
}

impl VerifierHttpAdapter {
    pub fn with_config(config: &AdapterConfig) -> Result<Self, PortError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()
            .map_err(|e| PortError::Transport(format!("verifier client init failed: {e}")))?;
        Ok(Self {
            base_url: config.verifier_base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    fn get(&self, path: &str) -> Result<Option<reqwest::blocking::Response>, PortError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| PortError::Transport(format!("verifier request failed: {e}")))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PortError::Transport(format!(
                "verifier status {status}: {body}"
            )));
        }
        Ok(Some(response))
    }
}

impl VerifierPort for VerifierHttpAdapter {
    fn messages(&self, source_domain: u32, tx_hash: B256) -> Result<Vec<VerifierMessage>, PortError> {
        let Some(response) =
            self.get(&format!("/messages/{source_domain}?transactionHash={tx_hash}"))?
        else {
            debug!(%tx_hash, source_domain, "verifier has not indexed transaction");
            return Ok(Vec::new());
        };
        let body: MessagesResponse = response
            .json()
            .map_err(|e| PortError::Transport(format!("verifier json decode failed: {e}")))?;
        Ok(body.messages)
    }

    fn fee_quotes(
        &self,
        source_domain: u32,
        destination_domain: u32,
    ) -> Result<Vec<FeeQuote>, PortError> {
        let Some(response) = self.get(&format!("/fees/{source_domain}/{destination_domain}"))?
        else {
            return Err(PortError::NotFound(format!(
                "no fee quotes for route {source_domain} -> {destination_domain}"
            )));
        };
        response
            .json()
            .map_err(|e| PortError::Transport(format!("fee quote json decode failed: {e}")))
    }
}
