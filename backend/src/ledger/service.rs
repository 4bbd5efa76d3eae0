//! Ledger service
//!
//! Every write to `available_balance_cents` goes through [`Ledger`], and every
//! write is paired with a ledger entry in the same atomic store operation.

use std::sync::Arc;

use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::error::GiftError;
use crate::gifts::{ClaimLink, Gift, GiftState, NewGift};
use crate::ledger::model::{BalanceChange, BalanceSummary, CreditRequest, LedgerEntry, Transaction};
use crate::models::PaginationParams;
use crate::store::Store;

/// Whether a post-debit balance should trigger the low-balance notice.
pub fn is_low_balance(balance_cents: i64, threshold_cents: i64) -> bool {
    balance_cents < threshold_cents
}

/// Authoritative owner of agent balances
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
    low_balance_threshold_cents: i64,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>, low_balance_threshold_cents: i64) -> Self {
        Self {
            store,
            low_balance_threshold_cents,
        }
    }

    pub fn low_balance_threshold_cents(&self) -> i64 {
        self.low_balance_threshold_cents
    }

    pub fn is_low(&self, balance_cents: i64) -> bool {
        is_low_balance(balance_cents, self.low_balance_threshold_cents)
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<i64, GiftError> {
        Ok(self.store.balance(user_id).await?)
    }

    pub async fn summary(&self, user_id: Uuid) -> Result<BalanceSummary, GiftError> {
        let balance = self.balance(user_id).await?;
        Ok(BalanceSummary {
            user_id,
            available_balance_cents: balance,
            low_balance: self.is_low(balance),
            low_balance_threshold_cents: self.low_balance_threshold_cents,
        })
    }

    /// Ledger history, newest first.
    pub async fn history(
        &self,
        user_id: Uuid,
        page: PaginationParams,
    ) -> Result<Vec<Transaction>, GiftError> {
        let (limit, offset) = page.limit_offset();
        Ok(self.store.transactions(user_id, limit, offset).await?)
    }

    /// Admin top-up of an agent's prepaid balance.
    pub async fn credit(
        &self,
        user_id: Uuid,
        request: CreditRequest,
    ) -> Result<BalanceChange, GiftError> {
        request.validate()?;

        let change = self
            .store
            .credit(LedgerEntry {
                user_id,
                amount_cents: request.amount_cents,
                description: request.description,
                gift_id: None,
                created_by_id: request.created_by_id,
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            amount_cents = change.transaction.amount_cents,
            balance_after = change.balance_after,
            "Balance credited"
        );
        Ok(change)
    }

    /// Reserve funds for a new interactive gift: debit, ledger entry and the
    /// `Created` gift record commit together.
    pub async fn debit_for_new_gift(
        &self,
        gift: NewGift,
        created_by_id: Uuid,
    ) -> Result<(Gift, BalanceChange), GiftError> {
        let entry = LedgerEntry {
            user_id: gift.user_id,
            amount_cents: gift.amount_in_cents,
            description: gift_description("Gift", &gift.brand_name, &gift.recipient_name),
            gift_id: Some(gift.id),
            created_by_id,
        };
        let (gift, change) = self.store.debit_and_create_gift(entry, gift).await?;

        tracing::info!(
            gift_id = %gift.id,
            user_id = %gift.user_id,
            amount_cents = gift.amount_in_cents,
            balance_after = change.balance_after,
            "Balance debited for gift"
        );
        Ok((gift, change))
    }

    /// Debit for a Pending gift whose claim link was just minted, moving it
    /// to `Sent` in the same unit.
    pub async fn settle_pending_gift(
        &self,
        gift: &Gift,
        claim: ClaimLink,
        sent_at: DateTime<Utc>,
    ) -> Result<(Gift, BalanceChange), GiftError> {
        let entry = LedgerEntry {
            user_id: gift.user_id,
            amount_cents: gift.amount_in_cents,
            description: gift_description("Gift", &gift.brand_name, &gift.recipient_name),
            gift_id: Some(gift.id),
            created_by_id: gift.user_id,
        };
        let (settled, change) = self
            .store
            .debit_and_settle_gift(entry, gift.id, claim, sent_at)
            .await?;

        tracing::info!(
            gift_id = %settled.id,
            user_id = %settled.user_id,
            amount_cents = settled.amount_in_cents,
            balance_after = change.balance_after,
            "Balance debited for pending gift"
        );
        Ok((settled, change))
    }

    /// Credit a debited gift back to its agent while closing it.
    pub async fn refund_gift(
        &self,
        gift: &Gift,
        actor_id: Uuid,
        next: GiftState,
    ) -> Result<(Gift, BalanceChange), GiftError> {
        let expected = gift.status();
        if !gift.state.is_debited() {
            return Err(GiftError::Conflict(format!(
                "gift {} is {} and carries no debit",
                gift.id, expected
            )));
        }

        let entry = LedgerEntry {
            user_id: gift.user_id,
            amount_cents: gift.amount_in_cents,
            description: gift_description("Refund", &gift.brand_name, &gift.recipient_name),
            gift_id: Some(gift.id),
            created_by_id: actor_id,
        };
        let (closed, change) = self
            .store
            .credit_and_close_gift(entry, gift.id, expected, next)
            .await?;

        tracing::info!(
            gift_id = %closed.id,
            user_id = %closed.user_id,
            amount_cents = closed.amount_in_cents,
            balance_after = change.balance_after,
            status = %closed.status(),
            "Gift refunded to balance"
        );
        Ok((closed, change))
    }
}

fn gift_description(kind: &str, brand_name: &str, recipient_name: &str) -> String {
    format!("{}: {} for {}", kind, brand_name, recipient_name)
}
