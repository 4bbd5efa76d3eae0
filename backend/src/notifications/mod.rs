//! Best-effort email notifications
//!
//! Callers hand a [`Notification`] to a [`NotificationSink`] and move on.
//! Delivery happens on a background worker; failures are logged and never
//! reach the caller, and a missing mail transport turns every send into a
//! logged no-op.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::gifts::Gift;
use crate::models::{Agent, Lead, OpenHouse};

pub mod mailer;
pub mod templates;

pub use mailer::{DynMailClient, EmailMessage, MailClient, MailError, SmtpMailClient};
pub use templates::SenderSignature;

impl From<&Agent> for SenderSignature {
    fn from(agent: &Agent) -> Self {
        Self {
            name: agent.name.clone(),
            email: agent.email.clone(),
            phone: agent.phone.clone(),
            brokerage: agent.brokerage.clone(),
        }
    }
}

/// One email to be delivered
#[derive(Debug, Clone)]
pub enum Notification {
    GiftReceived {
        gift: Gift,
        sender: SenderSignature,
    },
    NewLead {
        agent: Agent,
        open_house: OpenHouse,
        lead: Lead,
        gift_queued: bool,
    },
    LowBalance {
        agent: Agent,
        balance_cents: i64,
        threshold_cents: i64,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::GiftReceived { .. } => "gift_received",
            Notification::NewLead { .. } => "new_lead",
            Notification::LowBalance { .. } => "low_balance",
        }
    }
}

/// Fire-and-forget submission point. `submit` never blocks and never fails.
pub trait NotificationSink: Send + Sync {
    fn submit(&self, notification: Notification);
}

/// Renders notifications and hands them to the mail transport
#[derive(Clone)]
pub struct Dispatcher {
    mailer: Option<DynMailClient>,
    app_base_url: String,
}

impl Dispatcher {
    pub fn new(mailer: Option<DynMailClient>, app_base_url: impl Into<String>) -> Self {
        Self {
            mailer,
            app_base_url: app_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn dispatch(&self, notification: Notification) {
        match notification {
            Notification::GiftReceived { gift, sender } => {
                self.send_gift_email(&gift, &sender).await
            }
            Notification::NewLead {
                agent,
                open_house,
                lead,
                gift_queued,
            } => {
                self.send_new_lead_email(&agent, &open_house, &lead, gift_queued)
                    .await
            }
            Notification::LowBalance {
                agent,
                balance_cents,
                threshold_cents,
            } => {
                self.send_low_balance_email(&agent, balance_cents, threshold_cents)
                    .await
            }
        }
    }

    pub async fn send_gift_email(&self, gift: &Gift, sender: &SenderSignature) {
        let Some(claim) = gift.state.claim() else {
            tracing::warn!(gift_id = %gift.id, "Gift email skipped: gift has no claim link");
            return;
        };
        let email = templates::gift_received(
            &gift.recipient_name,
            &gift.brand_name,
            gift.amount_in_cents,
            &claim.claim_url,
            gift.message.as_deref(),
            sender,
        );
        self.deliver("gift_received", &gift.recipient_email, email)
            .await;
    }

    pub async fn send_new_lead_email(
        &self,
        agent: &Agent,
        open_house: &OpenHouse,
        lead: &Lead,
        gift_queued: bool,
    ) {
        let email = templates::new_lead(
            &agent.name,
            &lead.name,
            lead.email.as_deref(),
            lead.phone.as_deref(),
            &open_house.address,
            gift_queued,
            &format!("{}/open-houses/{}", self.app_base_url, open_house.id),
        );
        self.deliver("new_lead", &agent.email, email).await;
    }

    pub async fn send_low_balance_email(
        &self,
        agent: &Agent,
        balance_cents: i64,
        threshold_cents: i64,
    ) {
        let email = templates::low_balance(
            &agent.name,
            balance_cents,
            threshold_cents,
            &format!("{}/billing", self.app_base_url),
        );
        self.deliver("low_balance", &agent.email, email).await;
    }

    async fn deliver(&self, kind: &str, to: &str, email: templates::RenderedEmail) {
        let Some(mailer) = &self.mailer else {
            tracing::info!(kind, to, "Mail transport not configured; skipping email");
            return;
        };

        let message = EmailMessage {
            to: to.to_string(),
            subject: email.subject,
            body_html: email.html,
            body_text: email.text,
        };
        match mailer.send(message).await {
            Ok(()) => tracing::info!(kind, to, "Email sent"),
            Err(e) => tracing::warn!(kind, to, error = %e, "Email delivery failed"),
        }
    }
}

/// Queue-backed sink; a single worker task drains it through a [`Dispatcher`]
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Start the delivery worker. It stops once every `Notifier` clone is dropped.
    pub fn spawn(dispatcher: Dispatcher) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
        let handle = tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                dispatcher.dispatch(notification).await;
            }
            tracing::debug!("Notification worker stopped");
        });
        (Self { tx }, handle)
    }
}

impl NotificationSink for Notifier {
    fn submit(&self, notification: Notification) {
        let kind = notification.kind();
        if self.tx.send(notification).is_err() {
            tracing::warn!(kind, "Notification worker is gone; dropping email");
        }
    }
}

pub type DynNotificationSink = Arc<dyn NotificationSink>;

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use sqlx::types::chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::gifts::{ClaimLink, GiftState, NewGift};

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl MailClient for RecordingMailer {
        async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Transport("connection refused".into()));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn sent_gift() -> Gift {
        NewGift {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            recipient_name: "Dana".into(),
            recipient_email: "dana@example.com".into(),
            brand_code: "amazonUS".into(),
            brand_name: "Amazon".into(),
            amount_in_cents: 2500,
            message: None,
            lead_id: None,
            open_house_id: None,
        }
        .into_gift(GiftState::Sent {
            claim: ClaimLink {
                claim_url: "https://claim.example/abc".into(),
                short_id: "abc".into(),
            },
            sent_at: Utc::now(),
        })
    }

    fn sender() -> SenderSignature {
        SenderSignature::from(&Agent::new("Pat", "pat@example.com"))
    }

    #[tokio::test]
    async fn test_gift_email_goes_to_recipient() {
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = Dispatcher::new(Some(mailer.clone()), "https://app.example");

        dispatcher.send_gift_email(&sent_gift(), &sender()).await;

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "dana@example.com");
        assert!(sent[0].body_html.contains("https://claim.example/abc"));
    }

    #[tokio::test]
    async fn test_failures_and_missing_transport_are_swallowed() {
        let failing = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        Dispatcher::new(Some(failing), "https://app.example")
            .send_gift_email(&sent_gift(), &sender())
            .await;
        Dispatcher::new(None, "https://app.example")
            .send_low_balance_email(&Agent::new("Pat", "pat@example.com"), 100, 2500)
            .await;
    }

    #[tokio::test]
    async fn test_notifier_delivers_in_background() {
        let mailer = Arc::new(RecordingMailer::default());
        let (notifier, handle) =
            Notifier::spawn(Dispatcher::new(Some(mailer.clone()), "https://app.example"));

        notifier.submit(Notification::LowBalance {
            agent: Agent::new("Pat", "pat@example.com"),
            balance_cents: 1000,
            threshold_cents: 2500,
        });
        drop(notifier);
        handle.await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "pat@example.com");
    }
}
