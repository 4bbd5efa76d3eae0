use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use super::model::{CaptureLeadRequest, LeadCaptureResult};
use crate::error::GiftError;
use crate::gifts::{Gift, GiftService, NewGift, SettlementOutcome};
use crate::models::{Lead, NewLead, OpenHouse};
use crate::notifications::{DynNotificationSink, Notification};
use crate::store::Store;

/// Records visitor leads and queues their thank-you gifts
#[derive(Clone)]
pub struct LeadService {
    store: Arc<dyn Store>,
    gifts: GiftService,
    notifier: DynNotificationSink,
    auto_settle: bool,
}

impl LeadService {
    pub fn new(
        store: Arc<dyn Store>,
        gifts: GiftService,
        notifier: DynNotificationSink,
        auto_settle: bool,
    ) -> Self {
        Self {
            store,
            gifts,
            notifier,
            auto_settle,
        }
    }

    /// Persist a visitor lead. When the property has gift automation on and
    /// the visitor left an email, a Pending gift is queued without any debit.
    pub async fn capture_lead(
        &self,
        open_house_id: Uuid,
        request: CaptureLeadRequest,
    ) -> Result<LeadCaptureResult, GiftError> {
        request.validate()?;

        let open_house = self
            .store
            .open_house(open_house_id)
            .await?
            .ok_or_else(|| GiftError::NotFound(format!("open house {}", open_house_id)))?;

        let lead = self
            .store
            .insert_lead(NewLead {
                id: Uuid::new_v4(),
                open_house_id,
                user_id: open_house.user_id,
                name: request.name.trim().to_string(),
                email: request
                    .email
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty()),
                phone: request.phone.filter(|p| !p.trim().is_empty()),
                feedback: request
                    .feedback
                    .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            })
            .await?;
        tracing::info!(lead_id = %lead.id, open_house_id = %open_house_id, "Lead captured");

        let pending_gift = self.queue_gift(&open_house, &lead).await;
        self.notify_agent(&open_house, &lead, pending_gift.is_some())
            .await;

        if self.auto_settle {
            if let Some(gift) = &pending_gift {
                self.spawn_settlement(gift.id);
            }
        }

        Ok(LeadCaptureResult { lead, pending_gift })
    }

    async fn queue_gift(&self, open_house: &OpenHouse, lead: &Lead) -> Option<Gift> {
        let (brand_code, amount) = open_house.gift_settings()?;
        let Some(email) = lead.email.clone() else {
            tracing::debug!(lead_id = %lead.id, "No email on lead; gift not queued");
            return None;
        };

        let new_gift = NewGift {
            id: Uuid::new_v4(),
            user_id: open_house.user_id,
            recipient_name: lead.name.clone(),
            recipient_email: email,
            brand_code: brand_code.to_string(),
            brand_name: open_house
                .gift_brand_name
                .clone()
                .unwrap_or_else(|| brand_code.to_string()),
            amount_in_cents: amount,
            message: None,
            lead_id: Some(lead.id),
            open_house_id: Some(open_house.id),
        };

        // The lead is already saved; a queuing failure must not fail the sign-in.
        match self.gifts.queue_pending_gift(new_gift).await {
            Ok(gift) => Some(gift),
            Err(e) => {
                tracing::error!(lead_id = %lead.id, error = %e, "Could not queue gift for lead");
                None
            }
        }
    }

    async fn notify_agent(&self, open_house: &OpenHouse, lead: &Lead, gift_queued: bool) {
        match self.store.agent(open_house.user_id).await {
            Ok(Some(agent)) => self.notifier.submit(Notification::NewLead {
                agent,
                open_house: open_house.clone(),
                lead: lead.clone(),
                gift_queued,
            }),
            Ok(None) => tracing::warn!(lead_id = %lead.id, "New-lead email skipped: agent not found"),
            Err(e) => tracing::warn!(lead_id = %lead.id, error = %e, "New-lead email skipped"),
        }
    }

    fn spawn_settlement(&self, gift_id: Uuid) {
        let gifts = self.gifts.clone();
        tokio::spawn(async move {
            match gifts.process_gift(gift_id).await {
                Ok(SettlementOutcome::Failed { reason }) => {
                    tracing::warn!(gift_id = %gift_id, reason = %reason, "Automatic settlement failed")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(gift_id = %gift_id, error = %e, "Automatic settlement errored"),
            }
        });
    }
}
