use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// Bounded polling with an increasing, capped delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Growth factor in percent applied after each attempt (150 = x1.5).
    pub growth_percent: u64,
}

impl PollPolicy {
    pub const fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            growth_percent: 100,
        }
    }

    /// Delay to wait after the zero-based `attempt` failed.
    pub fn delay_after(&self, attempt: u32) -> u64 {
        let mut delay = self.initial_delay_ms;
        for _ in 0..attempt {
            delay = delay.saturating_mul(self.growth_percent) / 100;
            if delay >= self.max_delay_ms {
                return self.max_delay_ms;
            }
        }
        delay.min(self.max_delay_ms)
    }

    /// Longer wait used while the verifier reports the message as pending.
    pub fn pending_delay_after(&self, attempt: u32) -> u64 {
        self.delay_after(attempt)
            .saturating_mul(2)
            .min(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeePolicy {
    pub min_finality_threshold: u32,
    pub fallback_bps: u64,
    pub min_fee_floor: U256,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            min_finality_threshold: 1_000,
            fallback_bps: 14,
            // 0.01 of a 6-decimal stablecoin
            min_fee_floor: U256::from(10_000u64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferPolicy {
    pub min_native_balance_wei: U256,
    pub attestation: PollPolicy,
    pub chain_switch: PollPolicy,
    pub receipt: PollPolicy,
    pub fees: FeePolicy,
    pub persist_checkpoint: bool,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            // 0.0001 ETH
            min_native_balance_wei: U256::from(100_000_000_000_000u64),
            attestation: PollPolicy {
                max_attempts: 20,
                initial_delay_ms: 2_000,
                max_delay_ms: 8_000,
                growth_percent: 150,
            },
            chain_switch: PollPolicy::fixed(60, 500),
            receipt: PollPolicy::fixed(120, 1_000),
            fees: FeePolicy::default(),
            persist_checkpoint: true,
        }
    }
}
