//! Shared fixtures: a scripted provider, a recording notification sink and
//! a funded in-memory store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use openhouse_rewards::gifts::{ClaimLink, GiftPolicy, GiftService};
use openhouse_rewards::leads::LeadService;
use openhouse_rewards::ledger::{CreditRequest, Ledger};
use openhouse_rewards::middleware::RateLimiter;
use openhouse_rewards::models::{Agent, OpenHouse};
use openhouse_rewards::notifications::{DynNotificationSink, Notification, NotificationSink};
use openhouse_rewards::provider::{
    Brand, BrandCatalog, GiftProvider, ProviderError, Region, Reward, RewardStatus,
};
use openhouse_rewards::state::AppState;
use openhouse_rewards::store::{MemoryStore, Store};

/// Provider double with call counters and scripted failures
pub struct FakeProvider {
    configured: AtomicBool,
    link_failure: Mutex<Option<ProviderError>>,
    link_calls: Mutex<Vec<Uuid>>,
    cancel_calls: Mutex<Vec<Uuid>>,
    rewards: Mutex<HashMap<Uuid, Reward>>,
    foreign_rewards: Mutex<Vec<Reward>>,
    brands: Vec<Brand>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            configured: AtomicBool::new(true),
            link_failure: Mutex::new(None),
            link_calls: Mutex::new(Vec::new()),
            cancel_calls: Mutex::new(Vec::new()),
            rewards: Mutex::new(HashMap::new()),
            foreign_rewards: Mutex::new(Vec::new()),
            brands: vec![
                brand("amazonUS", "Amazon", None),
                brand("starbucksUS", "Starbucks", None),
                brand("targetUS", "Target", Some(vec![2500, 5000])),
            ],
        }
    }

    pub fn set_configured(&self, configured: bool) {
        self.configured.store(configured, Ordering::SeqCst);
    }

    /// Every following `create_claim_link` fails with `err` (or succeeds on `None`).
    pub fn fail_links_with(&self, err: Option<ProviderError>) {
        *self.link_failure.lock().unwrap() = err;
    }

    pub fn link_calls(&self) -> Vec<Uuid> {
        self.link_calls.lock().unwrap().clone()
    }

    pub fn link_calls_for(&self, id: Uuid) -> usize {
        self.link_calls().iter().filter(|c| **c == id).count()
    }

    pub fn cancel_calls(&self) -> Vec<Uuid> {
        self.cancel_calls.lock().unwrap().clone()
    }

    pub fn set_reward_status(&self, id: Uuid, status: RewardStatus) {
        let mut rewards = self.rewards.lock().unwrap();
        let reward = rewards.entry(id).or_insert_with(|| Reward {
            id: id.to_string(),
            status: RewardStatus::Other("DELIVERED".into()),
            price_in_cents: None,
            brand_code: None,
        });
        reward.status = status;
    }

    pub fn add_foreign_reward(&self, id: &str) {
        self.foreign_rewards.lock().unwrap().push(Reward {
            id: id.to_string(),
            status: RewardStatus::Other("DELIVERED".into()),
            price_in_cents: Some(1000),
            brand_code: Some("amazonUS".into()),
        });
    }
}

pub fn brand(code: &str, name: &str, fixed: Option<Vec<i64>>) -> Brand {
    Brand {
        brand_code: code.to_string(),
        name: name.to_string(),
        image_url: None,
        min_price_in_cents: Some(500),
        max_price_in_cents: Some(50000),
        fixed_price_values_in_cents: fixed.unwrap_or_default(),
    }
}

#[async_trait]
impl GiftProvider for FakeProvider {
    fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    async fn list_brands(&self, _region_code: Option<&str>) -> Result<Vec<Brand>, ProviderError> {
        Ok(self.brands.clone())
    }

    async fn list_regions(&self) -> Result<Vec<Region>, ProviderError> {
        Ok(vec![Region {
            id: Some(1),
            code: "us".into(),
            name: "United States".into(),
        }])
    }

    async fn create_claim_link(
        &self,
        id: Uuid,
        brand_code: &str,
        amount_cents: i64,
    ) -> Result<ClaimLink, ProviderError> {
        self.link_calls.lock().unwrap().push(id);
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured);
        }
        if let Some(err) = self.link_failure.lock().unwrap().clone() {
            return Err(err);
        }

        self.rewards.lock().unwrap().insert(
            id,
            Reward {
                id: id.to_string(),
                status: RewardStatus::Other("DELIVERED".into()),
                price_in_cents: Some(amount_cents),
                brand_code: Some(brand_code.to_string()),
            },
        );
        let short_id = id.simple().to_string()[..8].to_string();
        Ok(ClaimLink {
            claim_url: format!("https://gift.example/c/{}", short_id),
            short_id,
        })
    }

    async fn cancel(&self, id: Uuid) -> Result<(), ProviderError> {
        self.cancel_calls.lock().unwrap().push(id);
        match self.rewards.lock().unwrap().get_mut(&id) {
            Some(reward) => {
                reward.status = RewardStatus::Cancelled;
                Ok(())
            }
            None => Err(ProviderError::NotFound(format!("reward {}", id))),
        }
    }

    async fn reward(&self, id: Uuid) -> Result<Option<Reward>, ProviderError> {
        Ok(self.rewards.lock().unwrap().get(&id).cloned())
    }

    async fn list_rewards(&self, limit: u32) -> Result<Vec<Reward>, ProviderError> {
        let mut all: Vec<Reward> = self.rewards.lock().unwrap().values().cloned().collect();
        all.extend(self.foreign_rewards.lock().unwrap().iter().cloned());
        all.truncate(limit as usize);
        Ok(all)
    }

    async fn account_balance(&self) -> Option<i64> {
        Some(1_000_000)
    }
}

/// Sink that keeps every submitted notification
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent.lock().unwrap().iter().map(|n| n.kind()).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn submit(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub provider: Arc<FakeProvider>,
    pub sink: Arc<RecordingSink>,
    pub catalog: BrandCatalog,
    pub gifts: GiftService,
    pub leads: LeadService,
    pub agent: Agent,
}

impl Harness {
    pub async fn new(balance_cents: i64) -> Self {
        Self::with_policy(balance_cents, GiftPolicy::default()).await
    }

    pub async fn with_policy(balance_cents: i64, policy: GiftPolicy) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        let sink = Arc::new(RecordingSink::default());

        let mut agent = Agent::new("Pat Realtor", "pat@homes.example");
        agent.phone = Some("555-0100".into());
        store.insert_agent(agent.clone()).await;

        let dyn_store: Arc<dyn Store> = store.clone();
        let dyn_provider: Arc<dyn GiftProvider> = provider.clone();
        let notifier: DynNotificationSink = sink.clone();

        let catalog = BrandCatalog::new(
            dyn_provider.clone(),
            dyn_store.clone(),
            Duration::from_secs(300),
        );
        let gifts = GiftService::new(
            dyn_store.clone(),
            dyn_provider,
            catalog.clone(),
            notifier.clone(),
            policy,
        );
        let leads = LeadService::new(dyn_store, gifts.clone(), notifier, false);

        let harness = Self {
            store,
            provider,
            sink,
            catalog,
            gifts,
            leads,
            agent,
        };
        if balance_cents > 0 {
            harness.fund(balance_cents).await;
        }
        harness
    }

    pub fn ledger(&self) -> &Ledger {
        self.gifts.ledger()
    }

    pub async fn fund(&self, amount_cents: i64) {
        self.ledger()
            .credit(
                self.agent.id,
                CreditRequest {
                    amount_cents,
                    description: "Prepaid top-up".into(),
                    created_by_id: self.agent.id,
                },
            )
            .await
            .unwrap();
    }

    pub async fn balance(&self) -> i64 {
        self.ledger().balance(self.agent.id).await.unwrap()
    }

    /// Open house owned by the harness agent with gift automation on.
    pub async fn gift_enabled_house(&self, brand_code: &str, amount_cents: i64) -> OpenHouse {
        let house = OpenHouse {
            id: Uuid::new_v4(),
            user_id: self.agent.id,
            address: "12 Elm St".into(),
            is_gift_enabled: true,
            gift_brand_code: Some(brand_code.to_string()),
            gift_brand_name: None,
            gift_amount_in_cents: Some(amount_cents),
            created_at: sqlx::types::chrono::Utc::now(),
        };
        self.store.insert_open_house(house.clone()).await;
        house
    }

    pub fn app_state(&self, per_minute: u32) -> AppState {
        AppState::new(
            self.gifts.clone(),
            self.leads.clone(),
            self.catalog.clone(),
            RateLimiter::per_minute(per_minute),
            None,
        )
    }
}
