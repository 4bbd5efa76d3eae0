//! Gift-card provider integration
//!
//! [`GiftProvider`] is the seam the issuance workflow talks to. The HTTP
//! implementation is [`GiftbitClient`]; [`BrandCatalog`] caches the brand list.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::gifts::ClaimLink;

pub mod catalog;
pub mod client;
pub mod model;

pub use catalog::BrandCatalog;
pub use client::GiftbitClient;
pub use model::{Brand, Region, Reward, RewardStatus};

/// Provider call failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("gift provider API key is not configured")]
    NotConfigured,

    /// Network error, timeout, or a listing endpoint that did not answer 2xx
    #[error("gift provider unavailable: {0}")]
    Unavailable(String),

    #[error("gift provider request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("gift provider returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("gift provider has no record of {0}")]
    NotFound(String),
}

/// External gift-card API
///
/// Calls are never retried here. Callers that retry reuse the gift id so the
/// provider can deduplicate.
#[async_trait]
pub trait GiftProvider: Send + Sync {
    /// Whether credentials are present. Paid calls fail with `NotConfigured`
    /// otherwise.
    fn is_configured(&self) -> bool;

    async fn list_brands(&self, region_code: Option<&str>) -> Result<Vec<Brand>, ProviderError>;

    async fn list_regions(&self) -> Result<Vec<Region>, ProviderError>;

    /// Mint one claim link, using `id` as the idempotency key.
    async fn create_claim_link(
        &self,
        id: Uuid,
        brand_code: &str,
        amount_cents: i64,
    ) -> Result<ClaimLink, ProviderError>;

    /// Void an unclaimed reward.
    async fn cancel(&self, id: Uuid) -> Result<(), ProviderError>;

    /// Provider view of one reward; `None` if it never issued one for `id`.
    async fn reward(&self, id: Uuid) -> Result<Option<Reward>, ProviderError>;

    /// Recently issued rewards, newest first.
    async fn list_rewards(&self, limit: u32) -> Result<Vec<Reward>, ProviderError>;

    /// Remaining account funds; `None` when unknown.
    async fn account_balance(&self) -> Option<i64>;
}
