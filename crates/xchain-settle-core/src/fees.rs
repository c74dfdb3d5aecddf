use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::policy::FeePolicy;
use crate::ports::FeeQuote;

const BPS_DENOMINATOR: u64 = 10_000;
// quotes may carry fractional basis points; keep two decimals
const CENTI_BPS_DENOMINATOR: u64 = BPS_DENOMINATOR * 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FeeSource {
    Quoted { finality_threshold: u32 },
    Fallback,
}

impl FeeSource {
    pub fn is_fallback(self) -> bool {
        matches!(self, FeeSource::Fallback)
    }
}

impl std::fmt::Display for FeeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeeSource::Quoted { finality_threshold } => {
                write!(f, "quoted (finality threshold {finality_threshold})")
            }
            FeeSource::Fallback => f.write_str("fallback estimate, fee may be underpriced"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimate {
    pub max_fee: U256,
    pub source: FeeSource,
}

/// Pick the quote for the policy's finality threshold, or fall back to the
/// fixed basis-point estimate when the service gave nothing usable.
pub fn estimate_max_fee(
    amount: U256,
    quotes: &[FeeQuote],
    policy: &FeePolicy,
) -> Result<FeeEstimate, TransferError> {
    let quoted = quotes
        .iter()
        .filter(|quote| quote.finality_threshold == policy.min_finality_threshold)
        .find_map(|quote| centi_bps(quote.minimum_fee));

    let estimate = match quoted {
        Some(centi) => FeeEstimate {
            max_fee: ceil_div(amount.saturating_mul(U256::from(centi)), U256::from(CENTI_BPS_DENOMINATOR)),
            source: FeeSource::Quoted {
                finality_threshold: policy.min_finality_threshold,
            },
        },
        None => fallback_max_fee(amount, policy),
    };

    if estimate.max_fee >= amount {
        return Err(TransferError::invalid(format!(
            "max fee {} is not below the transfer amount {amount}",
            estimate.max_fee
        )));
    }
    Ok(estimate)
}

pub fn fallback_max_fee(amount: U256, policy: &FeePolicy) -> FeeEstimate {
    let by_bps = ceil_div(
        amount.saturating_mul(U256::from(policy.fallback_bps)),
        U256::from(BPS_DENOMINATOR),
    );
    FeeEstimate {
        max_fee: by_bps.max(policy.min_fee_floor),
        source: FeeSource::Fallback,
    }
}

fn centi_bps(minimum_fee: f64) -> Option<u64> {
    if !minimum_fee.is_finite() || minimum_fee < 0.0 {
        return None;
    }
    // absorb float noise such as 1.1 * 100.0 = 110.00000000000001
    let centi = (minimum_fee * 100.0 - 1e-9).ceil().max(0.0);
    if centi > CENTI_BPS_DENOMINATOR as f64 {
        return None;
    }
    Some(centi as u64)
}

fn ceil_div(numerator: U256, denominator: U256) -> U256 {
    let (quotient, remainder) = numerator.div_rem(denominator);
    if remainder.is_zero() {
        quotient
    } else {
        quotient + U256::from(1u8)
    }
}
