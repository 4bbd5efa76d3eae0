//! Ledger models: balance transactions and balance changes

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Direction of a balance movement
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
}

/// Immutable audit entry explaining one balance change
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount_cents: i64,
    pub description: String,
    /// Gift this entry pays for or refunds
    pub gift_id: Option<Uuid>,
    pub created_by_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Signed effect on the balance
    pub fn signed_amount(&self) -> i64 {
        match self.transaction_type {
            TransactionType::Credit => self.amount_cents,
            TransactionType::Debit => -self.amount_cents,
        }
    }
}

/// Ledger entry to be written alongside a balance change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub description: String,
    pub gift_id: Option<Uuid>,
    pub created_by_id: Uuid,
}

impl LedgerEntry {
    pub fn into_transaction(self, transaction_type: TransactionType) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            transaction_type,
            amount_cents: self.amount_cents,
            description: self.description,
            gift_id: self.gift_id,
            created_by_id: self.created_by_id,
            created_at: Utc::now(),
        }
    }
}

/// Committed balance movement
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct BalanceChange {
    pub user_id: Uuid,
    pub balance_before: i64,
    pub balance_after: i64,
    pub transaction: Transaction,
}

/// Request DTO for an admin balance top-up
#[derive(Debug, Deserialize, validator::Validate)]
pub struct CreditRequest {
    #[validate(range(
        min = 1,
        max = 100_000_000,
        message = "amount must be between 1 and 100000000 cents"
    ))]
    pub amount_cents: i64,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    pub created_by_id: Uuid,
}

/// Balance snapshot returned to dashboards
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct BalanceSummary {
    pub user_id: Uuid,
    pub available_balance_cents: i64,
    pub low_balance: bool,
    pub low_balance_threshold_cents: i64,
}
