//! Gift models and data structures
//!
//! A gift's status-specific fields live inside [`GiftState`], so a `Sent`
//! gift always has a claim link and a `Failed` gift always has a reason.

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Flat status tag, as stored and queried
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "gift_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GiftStatus {
    Pending,
    Created,
    Sent,
    Failed,
    Cancelled,
}

impl GiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GiftStatus::Pending => "pending",
            GiftStatus::Created => "created",
            GiftStatus::Sent => "sent",
            GiftStatus::Failed => "failed",
            GiftStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for GiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Redeemable link minted by the provider
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ClaimLink {
    pub claim_url: String,
    pub short_id: String,
}

/// Lifecycle state of a gift
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GiftState {
    /// Queued by lead capture; not debited, no claim link yet
    Pending,
    /// Debited by interactive issuance; `claim` is `None` until the provider answers
    Created {
        claim: Option<ClaimLink>,
        last_error: Option<String>,
    },
    Sent {
        claim: ClaimLink,
        sent_at: DateTime<Utc>,
    },
    Failed {
        error_message: String,
        /// Link the provider minted although the local debit did not commit
        orphaned_claim: Option<ClaimLink>,
        refunded: bool,
    },
    Cancelled {
        cancelled_at: DateTime<Utc>,
        refunded: bool,
    },
}

impl GiftState {
    pub fn status(&self) -> GiftStatus {
        match self {
            GiftState::Pending => GiftStatus::Pending,
            GiftState::Created { .. } => GiftStatus::Created,
            GiftState::Sent { .. } => GiftStatus::Sent,
            GiftState::Failed { .. } => GiftStatus::Failed,
            GiftState::Cancelled { .. } => GiftStatus::Cancelled,
        }
    }

    pub fn claim(&self) -> Option<&ClaimLink> {
        match self {
            GiftState::Created { claim, .. } => claim.as_ref(),
            GiftState::Sent { claim, .. } => Some(claim),
            GiftState::Failed { orphaned_claim, .. } => orphaned_claim.as_ref(),
            _ => None,
        }
    }

    /// Whether the agent's balance currently carries this gift's debit.
    pub fn is_debited(&self) -> bool {
        matches!(self, GiftState::Created { .. } | GiftState::Sent { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GiftState::Failed { .. } | GiftState::Cancelled { .. })
    }
}

/// A gift sent from an agent to a recipient
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Gift {
    /// Also the idempotency key sent to the provider
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipient_name: String,
    pub recipient_email: String,
    pub brand_code: String,
    pub brand_name: String,
    pub amount_in_cents: i64,
    pub message: Option<String>,
    pub lead_id: Option<Uuid>,
    pub open_house_id: Option<Uuid>,
    #[serde(flatten)]
    pub state: GiftState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Gift {
    pub fn status(&self) -> GiftStatus {
        self.state.status()
    }

    /// Debited by interactive issuance but still without a claim link.
    pub fn is_unlinked(&self) -> bool {
        matches!(self.state, GiftState::Created { claim: None, .. })
    }
}

/// Gift fields fixed at creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGift {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipient_name: String,
    pub recipient_email: String,
    pub brand_code: String,
    pub brand_name: String,
    pub amount_in_cents: i64,
    pub message: Option<String>,
    pub lead_id: Option<Uuid>,
    pub open_house_id: Option<Uuid>,
}

impl NewGift {
    pub fn into_gift(self, state: GiftState) -> Gift {
        let now = Utc::now();
        Gift {
            id: self.id,
            user_id: self.user_id,
            recipient_name: self.recipient_name,
            recipient_email: self.recipient_email,
            brand_code: self.brand_code,
            brand_name: self.brand_name,
            amount_in_cents: self.amount_in_cents,
            message: self.message,
            lead_id: self.lead_id,
            open_house_id: self.open_house_id,
            state,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request DTO for interactive issuance
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct CreateGiftRequest {
    #[validate(length(min = 1, max = 200, message = "recipient name is required"))]
    pub recipient_name: String,
    #[validate(email(message = "recipient email is invalid"))]
    pub recipient_email: String,
    pub brand_code: String,
    pub brand_name: Option<String>,
    pub amount_in_cents: i64,
    #[validate(length(max = 2000))]
    pub message: Option<String>,
}

/// Request DTO for operator actions
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorRequest {
    pub actor_id: Uuid,
}

/// Query parameters for the unlinked-gift report
#[derive(Debug, Deserialize)]
pub struct UnlinkedGiftsQuery {
    /// Only gifts older than this many minutes (default 5)
    pub older_than_minutes: Option<i64>,
}

/// Result of one deferred settlement attempt
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// Gift was not Pending; nothing happened
    Skipped { status: GiftStatus },
    Sent { gift: Gift, balance_after: i64 },
    Failed { reason: String },
}
