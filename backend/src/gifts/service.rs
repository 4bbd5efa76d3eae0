//! Gift issuance orchestrator
//!
//! Two issuance flows share this service:
//!
//! - Interactive (`create_gift_link`): debit first, then ask the provider for
//!   a claim link. A provider failure leaves the gift `Created` without a
//!   link; operators resolve it with `retry_claim_link` or
//!   `refund_unlinked_gift`.
//! - Deferred (`process_gift`): a `Pending` gift gets its claim link first
//!   and is debited only after the provider succeeds.
//!
//! Provider calls never run inside a store transaction. Every gift status
//! change is a compare-and-swap on the status the gift was read in.

use std::sync::Arc;
use std::time::Duration;

use sqlx::types::chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::model::{
    ClaimLink, CreateGiftRequest, Gift, GiftState, GiftStatus, NewGift, SettlementOutcome,
};
use super::GiftPolicy;
use crate::error::GiftError;
use crate::ledger::Ledger;
use crate::models::PaginationParams;
use crate::notifications::{DynNotificationSink, Notification, SenderSignature};
use crate::provider::{BrandCatalog, GiftProvider};
use crate::store::Store;

/// Gift issuance, settlement and cancellation
#[derive(Clone)]
pub struct GiftService {
    pub(super) store: Arc<dyn Store>,
    pub(super) provider: Arc<dyn GiftProvider>,
    ledger: Ledger,
    catalog: BrandCatalog,
    notifier: DynNotificationSink,
    policy: GiftPolicy,
}

impl GiftService {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn GiftProvider>,
        catalog: BrandCatalog,
        notifier: DynNotificationSink,
        policy: GiftPolicy,
    ) -> Self {
        Self {
            ledger: Ledger::new(store.clone(), policy.low_balance_threshold_cents),
            store,
            provider,
            catalog,
            notifier,
            policy,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn policy(&self) -> GiftPolicy {
        self.policy
    }

    /// Interactive issuance: reserve funds, then mint the claim link.
    pub async fn create_gift_link(
        &self,
        user_id: Uuid,
        request: CreateGiftRequest,
    ) -> Result<Gift, GiftError> {
        request.validate()?;
        let brand_code = request.brand_code.trim().to_string();
        if brand_code.is_empty() {
            return Err(GiftError::Validation("brand code is required".to_string()));
        }
        if request.amount_in_cents < self.policy.min_amount_cents {
            return Err(GiftError::Validation(format!(
                "amount must be at least {} cents",
                self.policy.min_amount_cents
            )));
        }

        let cached = self.catalog.cached_brand(&brand_code).await;
        if let Some(brand) = &cached {
            if !brand.accepts(request.amount_in_cents) {
                let offered = if brand.is_fixed_value() {
                    format!("cards of {:?} cents", brand.fixed_price_values_in_cents)
                } else {
                    format!(
                        "cards between {} and {} cents",
                        brand.min_price_in_cents.unwrap_or(0),
                        brand.max_price_in_cents.map_or("any".to_string(), |m| m.to_string())
                    )
                };
                return Err(GiftError::Validation(format!(
                    "{} does not offer a {} cent card; it offers {}",
                    brand.name, request.amount_in_cents, offered
                )));
            }
        }

        // Paid operation: refuse before touching the balance.
        if !self.provider.is_configured() {
            return Err(GiftError::Configuration(
                "gift provider API key is not set".to_string(),
            ));
        }

        let brand_name = request
            .brand_name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| cached.map(|b| b.name))
            .unwrap_or_else(|| brand_code.clone());

        let new_gift = NewGift {
            id: Uuid::new_v4(),
            user_id,
            recipient_name: request.recipient_name.trim().to_string(),
            recipient_email: request.recipient_email.trim().to_string(),
            brand_code,
            brand_name,
            amount_in_cents: request.amount_in_cents,
            message: request.message.filter(|m| !m.trim().is_empty()),
            lead_id: None,
            open_house_id: None,
        };

        let (gift, change) = self.ledger.debit_for_new_gift(new_gift, user_id).await?;
        self.notify_if_low_balance(user_id, change.balance_after)
            .await;

        self.link_created_gift(gift).await
    }

    /// Ask the provider for a claim link for a debited, unlinked gift and
    /// record the outcome on the gift.
    async fn link_created_gift(&self, gift: Gift) -> Result<Gift, GiftError> {
        match self
            .provider
            .create_claim_link(gift.id, &gift.brand_code, gift.amount_in_cents)
            .await
        {
            Ok(claim) => {
                let linked = self
                    .store
                    .transition_gift(
                        gift.id,
                        GiftStatus::Created,
                        GiftState::Created {
                            claim: Some(claim.clone()),
                            last_error: None,
                        },
                    )
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            gift_id = %gift.id,
                            claim_url = %claim.claim_url,
                            error = %e,
                            "Claim link minted but not saved; gift stays unlinked"
                        );
                        GiftError::from(e)
                    })?;
                tracing::info!(gift_id = %linked.id, "Gift linked");
                Ok(linked)
            }
            Err(e) => {
                tracing::error!(
                    gift_id = %gift.id,
                    user_id = %gift.user_id,
                    amount_cents = gift.amount_in_cents,
                    error = %e,
                    "Provider failed after debit; gift is debited but unlinked"
                );
                let unlinked = GiftState::Created {
                    claim: None,
                    last_error: Some(e.to_string()),
                };
                if let Err(store_err) = self
                    .store
                    .transition_gift(gift.id, GiftStatus::Created, unlinked)
                    .await
                {
                    tracing::warn!(gift_id = %gift.id, error = %store_err, "Could not record provider error on gift");
                }
                Err(e.into())
            }
        }
    }

    /// "Send now": mark a linked gift Sent and email the recipient.
    pub async fn send_gift(&self, gift_id: Uuid) -> Result<Gift, GiftError> {
        let gift = self.load(gift_id).await?;
        let claim = match &gift.state {
            GiftState::Created {
                claim: Some(claim), ..
            } => claim.clone(),
            GiftState::Created { claim: None, .. } => {
                return Err(GiftError::Conflict(format!(
                    "gift {} has no claim link yet",
                    gift_id
                )))
            }
            other => {
                return Err(GiftError::Conflict(format!(
                    "gift {} is {}",
                    gift_id,
                    other.status()
                )))
            }
        };

        let sent = self
            .store
            .transition_gift(
                gift_id,
                GiftStatus::Created,
                GiftState::Sent {
                    claim,
                    sent_at: Utc::now(),
                },
            )
            .await?;
        tracing::info!(gift_id = %sent.id, "Gift sent");

        self.notify_recipient(&sent).await;
        Ok(sent)
    }

    /// Operator retry for a debited-but-unlinked gift. Reuses the gift id as
    /// the provider idempotency key and never debits again.
    pub async fn retry_claim_link(&self, gift_id: Uuid) -> Result<Gift, GiftError> {
        let gift = self.load(gift_id).await?;
        if !gift.is_unlinked() {
            return Err(GiftError::Conflict(format!(
                "gift {} is not awaiting a claim link",
                gift_id
            )));
        }
        if !self.provider.is_configured() {
            return Err(GiftError::Configuration(
                "gift provider API key is not set".to_string(),
            ));
        }

        tracing::info!(gift_id = %gift_id, "Retrying claim link");
        self.link_created_gift(gift).await
    }

    /// Deferred settlement of a Pending gift.
    ///
    /// A gift that is not Pending is left alone. Any failure after the gift
    /// was loaded ends with the gift `Failed`; the outcome is returned rather
    /// than raised because no caller is waiting on it.
    pub async fn process_gift(&self, gift_id: Uuid) -> Result<SettlementOutcome, GiftError> {
        let gift = self.load(gift_id).await?;
        if gift.status() != GiftStatus::Pending {
            tracing::debug!(gift_id = %gift_id, status = %gift.status(), "Settlement skipped");
            return Ok(SettlementOutcome::Skipped {
                status: gift.status(),
            });
        }

        match self.settle(&gift).await {
            Ok((sent, balance_after)) => {
                self.notify_recipient(&sent).await;
                self.notify_if_low_balance(sent.user_id, balance_after)
                    .await;
                Ok(SettlementOutcome::Sent {
                    gift: sent,
                    balance_after,
                })
            }
            Err(Settlement::Failed(err)) => {
                let reason = err.to_string();
                self.mark_failed(&gift, &reason, None).await;
                Ok(SettlementOutcome::Failed { reason })
            }
            Err(Settlement::Orphaned {
                claim,
                err: GiftError::Conflict(msg),
            }) => {
                // Someone else moved the gift while the provider call was in flight.
                let current = self.load(gift_id).await?;
                if current.status() == GiftStatus::Sent {
                    tracing::info!(gift_id = %gift_id, "Gift settled concurrently");
                } else {
                    tracing::warn!(
                        gift_id = %gift_id,
                        status = %current.status(),
                        claim_url = %claim.claim_url,
                        conflict = %msg,
                        "Claim link minted for a gift that left Pending; voiding reward"
                    );
                    self.void_undebited_reward(gift_id).await;
                }
                Ok(SettlementOutcome::Skipped {
                    status: current.status(),
                })
            }
            Err(Settlement::Orphaned { claim, err }) => {
                tracing::error!(
                    gift_id = %gift.id,
                    user_id = %gift.user_id,
                    claim_url = %claim.claim_url,
                    short_id = %claim.short_id,
                    error = %err,
                    "Claim link minted but debit failed; reward must be cancelled at the provider"
                );
                let reason = format!("debit failed after claim link was issued: {}", err);
                self.mark_failed(&gift, &reason, Some(claim)).await;
                Ok(SettlementOutcome::Failed { reason })
            }
        }
    }

    async fn settle(&self, gift: &Gift) -> Result<(Gift, i64), Settlement> {
        let balance = self
            .ledger
            .balance(gift.user_id)
            .await
            .map_err(Settlement::Failed)?;
        if balance < gift.amount_in_cents {
            return Err(Settlement::Failed(GiftError::InsufficientFunds {
                available: balance,
                requested: gift.amount_in_cents,
            }));
        }

        let claim = self
            .provider
            .create_claim_link(gift.id, &gift.brand_code, gift.amount_in_cents)
            .await
            .map_err(|e| Settlement::Failed(e.into()))?;

        match self
            .ledger
            .settle_pending_gift(gift, claim.clone(), Utc::now())
            .await
        {
            Ok((sent, change)) => {
                tracing::info!(gift_id = %sent.id, "Pending gift settled");
                Ok((sent, change.balance_after))
            }
            Err(err) => Err(Settlement::Orphaned { claim, err }),
        }
    }

    async fn mark_failed(&self, gift: &Gift, reason: &str, orphaned_claim: Option<ClaimLink>) {
        let failed = GiftState::Failed {
            error_message: reason.to_string(),
            orphaned_claim,
            refunded: false,
        };
        match self
            .store
            .transition_gift(gift.id, GiftStatus::Pending, failed)
            .await
        {
            Ok(_) => tracing::info!(gift_id = %gift.id, reason, "Pending gift failed"),
            Err(e) => tracing::error!(
                gift_id = %gift.id,
                reason,
                error = %e,
                "Could not mark pending gift as failed"
            ),
        }
    }

    /// Best-effort cancel of a provider reward whose gift was never debited.
    /// A failure leaves it for reconciliation.
    async fn void_undebited_reward(&self, gift_id: Uuid) {
        match self.provider.cancel(gift_id).await {
            Ok(()) => tracing::info!(gift_id = %gift_id, "Undebited reward cancelled at provider"),
            Err(e) => tracing::error!(
                gift_id = %gift_id,
                error = %e,
                "Could not cancel undebited reward; reconciliation will report it"
            ),
        }
    }

    /// Cancel a gift. Debited gifts are voided at the provider first and,
    /// under the refund policy, credited back in the same unit as the
    /// `Cancelled` transition.
    pub async fn cancel_gift(&self, gift_id: Uuid, actor_id: Uuid) -> Result<Gift, GiftError> {
        let gift = self.load(gift_id).await?;

        if gift.state.is_terminal() {
            return Err(GiftError::CancellationRejected(format!(
                "gift {} is already {}",
                gift_id,
                gift.status()
            )));
        }

        if gift.status() == GiftStatus::Pending {
            // A settlement may have minted a link already.
            if self.provider.is_configured() {
                if let Some(reward) = self.provider.reward(gift_id).await? {
                    if !reward.status.is_final() {
                        self.provider.cancel(gift_id).await?;
                    }
                }
            }
            let cancelled = self
                .store
                .transition_gift(
                    gift_id,
                    GiftStatus::Pending,
                    GiftState::Cancelled {
                        cancelled_at: Utc::now(),
                        refunded: false,
                    },
                )
                .await?;
            tracing::info!(gift_id = %gift_id, actor_id = %actor_id, "Pending gift cancelled");
            return Ok(cancelled);
        }

        // Local `Sent` says nothing about whether the recipient claimed it.
        match self.provider.reward(gift_id).await? {
            Some(reward) if reward.status.is_final() => {
                tracing::info!(
                    gift_id = %gift_id,
                    provider_status = %reward.status,
                    "Cancellation rejected by provider status"
                );
                return Err(GiftError::CancellationRejected(format!(
                    "provider reports gift {} as {}",
                    gift_id, reward.status
                )));
            }
            Some(_) => self.provider.cancel(gift_id).await?,
            None => {
                tracing::debug!(gift_id = %gift_id, "Provider holds no reward; cancelling locally")
            }
        }

        let cancelled = if self.policy.refund_on_cancel {
            let (cancelled, _) = self
                .ledger
                .refund_gift(
                    &gift,
                    actor_id,
                    GiftState::Cancelled {
                        cancelled_at: Utc::now(),
                        refunded: true,
                    },
                )
                .await?;
            cancelled
        } else {
            self.store
                .transition_gift(
                    gift_id,
                    gift.status(),
                    GiftState::Cancelled {
                        cancelled_at: Utc::now(),
                        refunded: false,
                    },
                )
                .await?
        };

        tracing::info!(
            gift_id = %gift_id,
            actor_id = %actor_id,
            refunded = self.policy.refund_on_cancel,
            "Gift cancelled"
        );
        Ok(cancelled)
    }

    /// Operator refund of a debited-but-unlinked gift, allowed only when the
    /// provider confirms it holds no reward for the gift id.
    pub async fn refund_unlinked_gift(
        &self,
        gift_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Gift, GiftError> {
        let gift = self.load(gift_id).await?;
        let last_error = match &gift.state {
            GiftState::Created {
                claim: None,
                last_error,
            } => last_error.clone(),
            _ => {
                return Err(GiftError::Conflict(format!(
                    "gift {} is not debited-and-unlinked",
                    gift_id
                )))
            }
        };

        if self.provider.reward(gift_id).await?.is_some() {
            return Err(GiftError::Conflict(format!(
                "provider holds a reward for gift {}; retry the claim link instead",
                gift_id
            )));
        }

        let reason = match last_error {
            Some(err) => format!("refunded after provider failure: {}", err),
            None => "refunded by operator".to_string(),
        };
        let (refunded, _) = self
            .ledger
            .refund_gift(
                &gift,
                actor_id,
                GiftState::Failed {
                    error_message: reason,
                    orphaned_claim: None,
                    refunded: true,
                },
            )
            .await?;

        tracing::info!(gift_id = %gift_id, actor_id = %actor_id, "Unlinked gift refunded");
        Ok(refunded)
    }

    /// Store a Pending gift for later settlement. Nothing is debited.
    pub async fn queue_pending_gift(&self, gift: NewGift) -> Result<Gift, GiftError> {
        if gift.brand_code.trim().is_empty() {
            return Err(GiftError::Validation("brand code is required".to_string()));
        }
        if gift.amount_in_cents <= 0 {
            return Err(GiftError::Validation("amount must be positive".to_string()));
        }

        let pending = self.store.insert_pending_gift(gift).await?;
        tracing::info!(
            gift_id = %pending.id,
            user_id = %pending.user_id,
            amount_cents = pending.amount_in_cents,
            "Pending gift queued"
        );
        Ok(pending)
    }

    pub async fn get_gift(&self, gift_id: Uuid) -> Result<Gift, GiftError> {
        self.load(gift_id).await
    }

    /// Gifts of one agent, newest first.
    pub async fn list_gifts(
        &self,
        user_id: Uuid,
        page: PaginationParams,
    ) -> Result<Vec<Gift>, GiftError> {
        let (limit, offset) = page.limit_offset();
        Ok(self.store.gifts_for_user(user_id, limit, offset).await?)
    }

    /// Debited gifts still without a claim link after `older_than`.
    pub async fn unlinked_gifts(&self, older_than: Duration) -> Result<Vec<Gift>, GiftError> {
        let age = chrono::Duration::from_std(older_than)
            .map_err(|e| GiftError::Validation(e.to_string()))?;
        let gifts = self.store.unlinked_gifts(Utc::now() - age).await?;
        if !gifts.is_empty() {
            tracing::warn!(count = gifts.len(), "Debited gifts without claim link");
        }
        Ok(gifts)
    }

    pub async fn provider_funds(&self) -> Option<i64> {
        self.provider.account_balance().await
    }

    async fn load(&self, gift_id: Uuid) -> Result<Gift, GiftError> {
        self.store
            .gift(gift_id)
            .await?
            .ok_or_else(|| GiftError::gift_not_found(gift_id))
    }

    async fn notify_recipient(&self, gift: &Gift) {
        match self.store.agent(gift.user_id).await {
            Ok(Some(agent)) => self.notifier.submit(Notification::GiftReceived {
                gift: gift.clone(),
                sender: SenderSignature::from(&agent),
            }),
            Ok(None) => tracing::warn!(gift_id = %gift.id, "Gift email skipped: sender not found"),
            Err(e) => tracing::warn!(gift_id = %gift.id, error = %e, "Gift email skipped"),
        }
    }

    async fn notify_if_low_balance(&self, user_id: Uuid, balance_after: i64) {
        if !self.ledger.is_low(balance_after) {
            return;
        }
        match self.store.agent(user_id).await {
            Ok(Some(agent)) => self.notifier.submit(Notification::LowBalance {
                agent,
                balance_cents: balance_after,
                threshold_cents: self.ledger.low_balance_threshold_cents(),
            }),
            Ok(None) => {}
            Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Low-balance email skipped"),
        }
    }
}

/// Why a deferred settlement did not complete
enum Settlement {
    /// Nothing was debited and no claim link exists
    Failed(GiftError),
    /// The provider minted a link but the debit did not commit
    Orphaned { claim: ClaimLink, err: GiftError },
}
