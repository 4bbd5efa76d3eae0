//! Persistence interfaces for agents, the balance ledger and gifts
//!
//! Every operation that moves money is a single trait method so the
//! implementation can make it one atomic unit: the balance change, its
//! ledger entry and the gift write commit together or not at all.
//!
//! Implementations:
//! - `PgStore`: PostgreSQL storage
//! - `MemoryStore`: in-memory storage for tests and local runs

use async_trait::async_trait;
use sqlx::types::chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::gifts::{ClaimLink, Gift, GiftState, GiftStatus, NewGift};
use crate::ledger::{BalanceChange, LedgerEntry, Transaction};
use crate::models::{Agent, Lead, NewLead, OpenHouse};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: i64, requested: i64 },

    /// The record changed since it was read (compare-and-swap failed)
    #[error("conflicting update: {0}")]
    Conflict(String),

    #[error("balance out of range: {0}")]
    BalanceOutOfRange(String),

    #[error("stored record is inconsistent: {0}")]
    InvalidRecord(String),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Balance reads and every balance-mutating write
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn balance(&self, user_id: Uuid) -> Result<i64>;

    /// Increment the balance and append a Credit entry.
    async fn credit(&self, entry: LedgerEntry) -> Result<BalanceChange>;

    /// Ledger history, newest first.
    async fn transactions(&self, user_id: Uuid, limit: i64, offset: i64)
        -> Result<Vec<Transaction>>;

    /// Debit the balance, append a Debit entry and insert `gift` as
    /// `Created` without a claim link. Fails with `InsufficientFunds`
    /// without writing anything when the balance does not cover the entry.
    async fn debit_and_create_gift(
        &self,
        entry: LedgerEntry,
        gift: NewGift,
    ) -> Result<(Gift, BalanceChange)>;

    /// Move a `Pending` gift to `Sent` with `claim`, debiting the balance in
    /// the same unit. Fails with `Conflict` if the gift is no longer Pending.
    async fn debit_and_settle_gift(
        &self,
        entry: LedgerEntry,
        gift_id: Uuid,
        claim: ClaimLink,
        sent_at: DateTime<Utc>,
    ) -> Result<(Gift, BalanceChange)>;

    /// Credit the balance back and move the gift from `expected` to `next`
    /// in the same unit. Fails with `Conflict` if the status moved.
    async fn credit_and_close_gift(
        &self,
        entry: LedgerEntry,
        gift_id: Uuid,
        expected: GiftStatus,
        next: GiftState,
    ) -> Result<(Gift, BalanceChange)>;
}

/// Gift records
#[async_trait]
pub trait GiftStore: Send + Sync {
    async fn insert_pending_gift(&self, gift: NewGift) -> Result<Gift>;

    async fn gift(&self, id: Uuid) -> Result<Option<Gift>>;

    /// Gifts of one agent, newest first.
    async fn gifts_for_user(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Gift>>;

    /// Gifts in `status`, oldest first.
    async fn gifts_with_status(&self, status: GiftStatus, limit: i64) -> Result<Vec<Gift>>;

    /// Debited gifts without a claim link created before `created_before`.
    async fn unlinked_gifts(&self, created_before: DateTime<Utc>) -> Result<Vec<Gift>>;

    /// Replace the state of a gift currently in `expected`. Amount, recipient
    /// and brand never change. Fails with `Conflict` if the status moved.
    async fn transition_gift(&self, id: Uuid, expected: GiftStatus, next: GiftState)
        -> Result<Gift>;
}

/// Agents, open houses, leads and admin settings
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn agent(&self, user_id: Uuid) -> Result<Option<Agent>>;

    async fn open_house(&self, id: Uuid) -> Result<Option<OpenHouse>>;

    async fn insert_lead(&self, lead: NewLead) -> Result<Lead>;

    /// Admin-enabled brand codes for `region`, falling back to the global
    /// defaults. Empty means no restriction.
    async fn enabled_brand_codes(&self, region: Option<&str>) -> Result<Vec<String>>;
}

/// Everything the services need from persistence
pub trait Store: LedgerStore + GiftStore + DirectoryStore {}

impl<T: LedgerStore + GiftStore + DirectoryStore> Store for T {}

/// Settings key holding the global brand allow-list
pub const APP_DEFAULTS_KEY: &str = "appDefaults";

pub(crate) fn status_conflict(id: Uuid, expected: GiftStatus, actual: GiftStatus) -> StoreError {
    StoreError::Conflict(format!(
        "gift {} is {} (expected {})",
        id, actual, expected
    ))
}
