//! Provider vs. local reconciliation
//!
//! Surfaces every window where local records and the provider disagree so an
//! operator can retry, refund or cancel.

use serde::Serialize;
use sqlx::types::chrono::Utc;
use uuid::Uuid;

use super::model::{Gift, GiftState, GiftStatus};
use super::service::GiftService;
use crate::error::GiftError;
use crate::provider::{Reward, RewardStatus};

#[derive(Debug, Serialize, Clone, Default)]
pub struct ReconciliationReport {
    /// Rewards inspected at the provider
    pub rewards_checked: usize,
    /// Debited locally, no claim link
    pub unlinked_gifts: Vec<Gift>,
    /// Failed locally although the provider minted a link
    pub orphaned_claims: Vec<Gift>,
    /// Provider rewards with no local gift
    pub unknown_rewards: Vec<Reward>,
    /// Sent locally, cancelled at the provider
    pub cancelled_at_provider: Vec<Gift>,
    /// Never debited locally (failed, cancelled or pending), live reward at the provider
    pub live_rewards_for_undebited_gifts: Vec<Gift>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.unlinked_gifts.is_empty()
            && self.orphaned_claims.is_empty()
            && self.unknown_rewards.is_empty()
            && self.cancelled_at_provider.is_empty()
            && self.live_rewards_for_undebited_gifts.is_empty()
    }
}

impl GiftService {
    /// Compare the provider's most recent `limit` rewards with local gifts.
    pub async fn reconcile(&self, limit: u32) -> Result<ReconciliationReport, GiftError> {
        let rewards = self.provider.list_rewards(limit).await?;

        let mut report = ReconciliationReport {
            rewards_checked: rewards.len(),
            unlinked_gifts: self.store.unlinked_gifts(Utc::now()).await?,
            ..Default::default()
        };

        let failed = self
            .store
            .gifts_with_status(GiftStatus::Failed, i64::from(limit))
            .await?;
        report.orphaned_claims = failed
            .into_iter()
            .filter(|g| {
                matches!(
                    g.state,
                    GiftState::Failed {
                        orphaned_claim: Some(_),
                        ..
                    }
                )
            })
            .collect();

        for reward in rewards {
            let local = match Uuid::parse_str(&reward.id) {
                Ok(id) => self.store.gift(id).await?,
                Err(_) => None,
            };
            let Some(gift) = local else {
                report.unknown_rewards.push(reward);
                continue;
            };

            match gift.status() {
                GiftStatus::Sent if reward.status == RewardStatus::Cancelled => {
                    report.cancelled_at_provider.push(gift)
                }
                GiftStatus::Failed if !reward.status.is_final() => {
                    if !report.orphaned_claims.iter().any(|g| g.id == gift.id) {
                        report.live_rewards_for_undebited_gifts.push(gift)
                    }
                }
                GiftStatus::Cancelled | GiftStatus::Pending if !reward.status.is_final() => {
                    report.live_rewards_for_undebited_gifts.push(gift)
                }
                _ => {}
            }
        }

        if report.is_clean() {
            tracing::info!(rewards_checked = report.rewards_checked, "Reconciliation clean");
        } else {
            tracing::warn!(
                rewards_checked = report.rewards_checked,
                unlinked = report.unlinked_gifts.len(),
                orphaned = report.orphaned_claims.len(),
                unknown = report.unknown_rewards.len(),
                cancelled_at_provider = report.cancelled_at_provider.len(),
                live_for_undebited = report.live_rewards_for_undebited_gifts.len(),
                "Reconciliation found discrepancies"
            );
        }
        Ok(report)
    }
}
