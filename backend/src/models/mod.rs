//! Shared data models: agents, open houses, leads and the API envelope

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Agent account; owns the prepaid balance gifts are paid from
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub brokerage: Option<String>,
    pub available_balance_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            phone: None,
            brokerage: None,
            available_balance_cents: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Open house listing with its gift-automation settings
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct OpenHouse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address: String,
    pub is_gift_enabled: bool,
    pub gift_brand_code: Option<String>,
    pub gift_brand_name: Option<String>,
    pub gift_amount_in_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl OpenHouse {
    /// Brand code and amount when automation is on and fully configured.
    pub fn gift_settings(&self) -> Option<(&str, i64)> {
        if !self.is_gift_enabled {
            return None;
        }
        match (self.gift_brand_code.as_deref(), self.gift_amount_in_cents) {
            (Some(code), Some(amount)) if !code.trim().is_empty() && amount > 0 => {
                Some((code, amount))
            }
            _ => None,
        }
    }
}

/// Visitor contact captured through the open-house form
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Lead {
    pub id: Uuid,
    pub open_house_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub feedback: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Lead ready to be persisted
#[derive(Debug, Clone)]
pub struct NewLead {
    pub id: Uuid,
    pub open_house_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub feedback: serde_json::Value,
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Pagination parameters
#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PaginationParams {
    /// Returns `(limit, offset)` clamped to sane bounds.
    pub fn limit_offset(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        (limit, (page - 1) * limit)
    }
}

/// Render integer cents as dollars, e.g. `2500` -> `$25.00`
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(2500), "$25.00");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(-1050), "-$10.50");
    }

    #[test]
    fn test_pagination_bounds() {
        assert_eq!(PaginationParams::default().limit_offset(), (20, 0));
        let p = PaginationParams {
            page: Some(3),
            limit: Some(500),
        };
        assert_eq!(p.limit_offset(), (100, 200));
    }

    #[test]
    fn test_gift_settings_require_brand_and_amount() {
        let mut house = OpenHouse {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            address: "12 Elm St".into(),
            is_gift_enabled: true,
            gift_brand_code: Some("starbucksUS".into()),
            gift_brand_name: None,
            gift_amount_in_cents: Some(1000),
            created_at: Utc::now(),
        };
        assert_eq!(house.gift_settings(), Some(("starbucksUS", 1000)));

        house.gift_amount_in_cents = None;
        assert_eq!(house.gift_settings(), None);

        house.gift_amount_in_cents = Some(1000);
        house.is_gift_enabled = false;
        assert_eq!(house.gift_settings(), None);
    }
}
