//! Provider wire models: brands, regions and issued rewards

use serde::{Deserialize, Serialize};

/// Gift card brand mirrored from the provider catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Brand {
    pub brand_code: String,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub min_price_in_cents: Option<i64>,
    #[serde(default)]
    pub max_price_in_cents: Option<i64>,
    /// Non-empty for fixed-denomination brands
    #[serde(default)]
    pub fixed_price_values_in_cents: Vec<i64>,
}

impl Brand {
    /// Whether the brand can be issued for `amount_cents`.
    pub fn accepts(&self, amount_cents: i64) -> bool {
        if !self.fixed_price_values_in_cents.is_empty() {
            return self.fixed_price_values_in_cents.contains(&amount_cents);
        }
        self.min_price_in_cents.map_or(true, |min| amount_cents >= min)
            && self.max_price_in_cents.map_or(true, |max| amount_cents <= max)
    }

    pub fn is_fixed_value(&self) -> bool {
        !self.fixed_price_values_in_cents.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    #[serde(default)]
    pub id: Option<i64>,
    pub code: String,
    pub name: String,
}

/// Provider-side status of an issued reward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RewardStatus {
    Redeemed,
    Cancelled,
    Other(String),
}

impl RewardStatus {
    /// Redeemed and cancelled rewards can no longer be voided.
    pub fn is_final(&self) -> bool {
        matches!(self, RewardStatus::Redeemed | RewardStatus::Cancelled)
    }
}

impl std::fmt::Display for RewardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewardStatus::Redeemed => f.write_str("REDEEMED"),
            RewardStatus::Cancelled => f.write_str("CANCELLED"),
            RewardStatus::Other(s) => f.write_str(s),
        }
    }
}

impl From<String> for RewardStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "REDEEMED" => RewardStatus::Redeemed,
            "CANCELLED" | "CANCELED" => RewardStatus::Cancelled,
            _ => RewardStatus::Other(value),
        }
    }
}

impl From<RewardStatus> for String {
    fn from(status: RewardStatus) -> Self {
        status.to_string()
    }
}

/// Reward as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reward {
    /// Our gift id, echoed back by the provider
    pub id: String,
    pub status: RewardStatus,
    #[serde(default)]
    pub price_in_cents: Option<i64>,
    #[serde(default)]
    pub brand_code: Option<String>,
}
