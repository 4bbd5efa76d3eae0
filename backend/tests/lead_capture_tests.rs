//! Lead capture and the gifts it queues

mod common;

use uuid::Uuid;

use common::Harness;
use openhouse_rewards::error::GiftError;
use openhouse_rewards::gifts::{GiftStatus, SettlementOutcome};
use openhouse_rewards::leads::CaptureLeadRequest;
use openhouse_rewards::notifications::Notification;

fn sign_in(email: Option<&str>) -> CaptureLeadRequest {
    CaptureLeadRequest {
        name: "Dana Visitor".into(),
        email: email.map(str::to_string),
        phone: Some("555-0199".into()),
        feedback: Some(serde_json::json!({ "rating": 4, "buying_timeline": "3 months" })),
    }
}

#[tokio::test]
async fn test_lead_on_gift_enabled_house_queues_pending_gift() {
    let h = Harness::new(500).await;
    let house = h.gift_enabled_house("starbucksUS", 1000).await;

    let result = h
        .leads
        .capture_lead(house.id, sign_in(Some("dana@example.com")))
        .await
        .unwrap();

    let gift = result.pending_gift.expect("gift should be queued");
    assert_eq!(gift.status(), GiftStatus::Pending);
    assert_eq!(gift.amount_in_cents, 1000);
    assert_eq!(gift.lead_id, Some(result.lead.id));
    assert_eq!(gift.open_house_id, Some(house.id));
    // Queuing never debits.
    assert_eq!(h.balance().await, 500);
    assert!(h.provider.link_calls().is_empty());

    // Settlement later fails for lack of funds and leaves the balance alone.
    let outcome = h.gifts.process_gift(gift.id).await.unwrap();
    assert!(matches!(outcome, SettlementOutcome::Failed { .. }));
    assert_eq!(
        h.gifts.get_gift(gift.id).await.unwrap().status(),
        GiftStatus::Failed
    );
    assert_eq!(h.balance().await, 500);
}

#[tokio::test]
async fn test_agent_is_notified_of_every_lead() {
    let h = Harness::new(5000).await;
    let house = h.gift_enabled_house("starbucksUS", 1000).await;

    h.leads
        .capture_lead(house.id, sign_in(Some("dana@example.com")))
        .await
        .unwrap();

    let notifications = h.sink.all();
    assert_eq!(notifications.len(), 1);
    match &notifications[0] {
        Notification::NewLead {
            agent, gift_queued, ..
        } => {
            assert_eq!(agent.id, h.agent.id);
            assert!(*gift_queued);
        }
        other => panic!("unexpected notification {:?}", other.kind()),
    }
}

#[tokio::test]
async fn test_lead_without_email_gets_no_gift() {
    let h = Harness::new(5000).await;
    let house = h.gift_enabled_house("starbucksUS", 1000).await;

    let result = h.leads.capture_lead(house.id, sign_in(None)).await.unwrap();

    assert!(result.pending_gift.is_none());
    assert_eq!(h.store.gift_count().await, 0);
    assert_eq!(h.store.leads().await.len(), 1);
    assert_eq!(h.sink.count("new_lead"), 1);
}

#[tokio::test]
async fn test_lead_on_house_without_automation() {
    let h = Harness::new(5000).await;
    let mut house = h.gift_enabled_house("starbucksUS", 1000).await;
    house.id = Uuid::new_v4();
    house.is_gift_enabled = false;
    h.store.insert_open_house(house.clone()).await;

    let result = h
        .leads
        .capture_lead(house.id, sign_in(Some("dana@example.com")))
        .await
        .unwrap();

    assert!(result.pending_gift.is_none());
    assert_eq!(h.store.gift_count().await, 0);
}

#[tokio::test]
async fn test_unknown_house_and_invalid_input_are_rejected() {
    let h = Harness::new(5000).await;

    assert!(matches!(
        h.leads
            .capture_lead(Uuid::new_v4(), sign_in(Some("dana@example.com")))
            .await,
        Err(GiftError::NotFound(_))
    ));

    let house = h.gift_enabled_house("starbucksUS", 1000).await;
    assert!(matches!(
        h.leads
            .capture_lead(house.id, sign_in(Some("not-an-email")))
            .await,
        Err(GiftError::Validation(_))
    ));
    assert!(h.store.leads().await.is_empty());
}

#[tokio::test]
async fn test_storage_outage_fails_capture_without_email() {
    let h = Harness::new(5000).await;
    let house = h.gift_enabled_house("starbucksUS", 1000).await;
    h.store.set_fail_writes(true).await;

    let err = h
        .leads
        .capture_lead(house.id, sign_in(Some("dana@example.com")))
        .await
        .unwrap_err();

    assert!(matches!(err, GiftError::Storage(_)));
    assert!(h.sink.all().is_empty());
}
