//! In-memory store
//!
//! All collections sit behind one mutex, so each trait method observes and
//! mutates a consistent snapshot, which gives the same all-or-nothing
//! behaviour as a database transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::types::chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    status_conflict, DirectoryStore, GiftStore, LedgerStore, Result, StoreError, APP_DEFAULTS_KEY,
};
use crate::gifts::{ClaimLink, Gift, GiftState, GiftStatus, NewGift};
use crate::ledger::{BalanceChange, LedgerEntry, Transaction, TransactionType};
use crate::models::{Agent, Lead, NewLead, OpenHouse};

#[derive(Default)]
struct State {
    agents: HashMap<Uuid, Agent>,
    gifts: HashMap<Uuid, Gift>,
    transactions: Vec<Transaction>,
    open_houses: HashMap<Uuid, OpenHouse>,
    leads: Vec<Lead>,
    brand_codes: HashMap<String, Vec<String>>,
    fail_writes: bool,
}

impl State {
    fn check_writable(&self) -> Result<()> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    fn agent_mut(&mut self, user_id: Uuid) -> Result<&mut Agent> {
        self.agents
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("agent {}", user_id)))
    }

    fn check_debit(&self, entry: &LedgerEntry) -> Result<i64> {
        let agent = self
            .agents
            .get(&entry.user_id)
            .ok_or_else(|| StoreError::NotFound(format!("agent {}", entry.user_id)))?;
        if agent.available_balance_cents < entry.amount_cents {
            return Err(StoreError::InsufficientFunds {
                available: agent.available_balance_cents,
                requested: entry.amount_cents,
            });
        }
        Ok(agent.available_balance_cents)
    }

    fn check_gift_status(&self, id: Uuid, expected: GiftStatus) -> Result<()> {
        let gift = self
            .gifts
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("gift {}", id)))?;
        if gift.status() != expected {
            return Err(status_conflict(id, expected, gift.status()));
        }
        Ok(())
    }

    /// Apply a balance movement that has already been validated.
    fn apply(&mut self, entry: LedgerEntry, kind: TransactionType) -> Result<BalanceChange> {
        let delta = match kind {
            TransactionType::Credit => entry.amount_cents,
            TransactionType::Debit => -entry.amount_cents,
        };
        let agent = self.agent_mut(entry.user_id)?;
        let balance_before = agent.available_balance_cents;
        agent.available_balance_cents = balance_before.checked_add(delta).ok_or_else(|| {
            StoreError::BalanceOutOfRange(format!(
                "{:?} of {} cents on a balance of {}",
                kind, entry.amount_cents, balance_before
            ))
        })?;
        agent.updated_at = Utc::now();
        let balance_after = agent.available_balance_cents;

        let transaction = entry.into_transaction(kind);
        self.transactions.push(transaction.clone());

        Ok(BalanceChange {
            user_id: transaction.user_id,
            balance_before,
            balance_after,
            transaction,
        })
    }

    fn set_state(&mut self, id: Uuid, next: GiftState) -> Result<Gift> {
        let gift = self
            .gifts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("gift {}", id)))?;
        gift.state = next;
        gift.updated_at = Utc::now();
        Ok(gift.clone())
    }
}

/// Store backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_agent(&self, agent: Agent) {
        self.state.lock().await.agents.insert(agent.id, agent);
    }

    pub async fn insert_open_house(&self, house: OpenHouse) {
        self.state.lock().await.open_houses.insert(house.id, house);
    }

    /// Set the brand allow-list for a region key (`appDefaults` for global).
    pub async fn set_enabled_brand_codes(&self, key: &str, codes: Vec<String>) {
        self.state
            .lock()
            .await
            .brand_codes
            .insert(key.to_string(), codes);
    }

    /// Make every subsequent write fail, to exercise storage outages.
    pub async fn set_fail_writes(&self, fail: bool) {
        self.state.lock().await.fail_writes = fail;
    }

    pub async fn leads(&self) -> Vec<Lead> {
        self.state.lock().await.leads.clone()
    }

    pub async fn gift_count(&self) -> usize {
        self.state.lock().await.gifts.len()
    }

    /// Sum of signed ledger entries for an agent.
    pub async fn ledger_total(&self, user_id: Uuid) -> i64 {
        self.state
            .lock()
            .await
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(Transaction::signed_amount)
            .sum()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn balance(&self, user_id: Uuid) -> Result<i64> {
        let state = self.state.lock().await;
        state
            .agents
            .get(&user_id)
            .map(|a| a.available_balance_cents)
            .ok_or_else(|| StoreError::NotFound(format!("agent {}", user_id)))
    }

    async fn credit(&self, entry: LedgerEntry) -> Result<BalanceChange> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.apply(entry, TransactionType::Credit)
    }

    async fn transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn debit_and_create_gift(
        &self,
        entry: LedgerEntry,
        gift: NewGift,
    ) -> Result<(Gift, BalanceChange)> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        if state.gifts.contains_key(&gift.id) {
            return Err(StoreError::Conflict(format!("gift {} already exists", gift.id)));
        }
        state.check_debit(&entry)?;

        let change = state.apply(entry, TransactionType::Debit)?;
        let gift = gift.into_gift(GiftState::Created {
            claim: None,
            last_error: None,
        });
        state.gifts.insert(gift.id, gift.clone());
        Ok((gift, change))
    }

    async fn debit_and_settle_gift(
        &self,
        entry: LedgerEntry,
        gift_id: Uuid,
        claim: ClaimLink,
        sent_at: DateTime<Utc>,
    ) -> Result<(Gift, BalanceChange)> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.check_gift_status(gift_id, GiftStatus::Pending)?;
        state.check_debit(&entry)?;

        let change = state.apply(entry, TransactionType::Debit)?;
        let gift = state.set_state(gift_id, GiftState::Sent { claim, sent_at })?;
        Ok((gift, change))
    }

    async fn credit_and_close_gift(
        &self,
        entry: LedgerEntry,
        gift_id: Uuid,
        expected: GiftStatus,
        next: GiftState,
    ) -> Result<(Gift, BalanceChange)> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.check_gift_status(gift_id, expected)?;
        state.agent_mut(entry.user_id)?;

        let change = state.apply(entry, TransactionType::Credit)?;
        let gift = state.set_state(gift_id, next)?;
        Ok((gift, change))
    }
}

#[async_trait]
impl GiftStore for MemoryStore {
    async fn insert_pending_gift(&self, gift: NewGift) -> Result<Gift> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        if state.gifts.contains_key(&gift.id) {
            return Err(StoreError::Conflict(format!("gift {} already exists", gift.id)));
        }
        let gift = gift.into_gift(GiftState::Pending);
        state.gifts.insert(gift.id, gift.clone());
        Ok(gift)
    }

    async fn gift(&self, id: Uuid) -> Result<Option<Gift>> {
        Ok(self.state.lock().await.gifts.get(&id).cloned())
    }

    async fn gifts_for_user(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Gift>> {
        let state = self.state.lock().await;
        let mut gifts: Vec<Gift> = state
            .gifts
            .values()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect();
        gifts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(gifts
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn gifts_with_status(&self, status: GiftStatus, limit: i64) -> Result<Vec<Gift>> {
        let state = self.state.lock().await;
        let mut gifts: Vec<Gift> = state
            .gifts
            .values()
            .filter(|g| g.status() == status)
            .cloned()
            .collect();
        gifts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        gifts.truncate(limit.max(0) as usize);
        Ok(gifts)
    }

    async fn unlinked_gifts(&self, created_before: DateTime<Utc>) -> Result<Vec<Gift>> {
        let state = self.state.lock().await;
        let mut gifts: Vec<Gift> = state
            .gifts
            .values()
            .filter(|g| g.is_unlinked() && g.created_at < created_before)
            .cloned()
            .collect();
        gifts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(gifts)
    }

    async fn transition_gift(
        &self,
        id: Uuid,
        expected: GiftStatus,
        next: GiftState,
    ) -> Result<Gift> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.check_gift_status(id, expected)?;
        state.set_state(id, next)
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn agent(&self, user_id: Uuid) -> Result<Option<Agent>> {
        Ok(self.state.lock().await.agents.get(&user_id).cloned())
    }

    async fn open_house(&self, id: Uuid) -> Result<Option<OpenHouse>> {
        Ok(self.state.lock().await.open_houses.get(&id).cloned())
    }

    async fn insert_lead(&self, lead: NewLead) -> Result<Lead> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let lead = Lead {
            id: lead.id,
            open_house_id: lead.open_house_id,
            user_id: lead.user_id,
            name: lead.name,
            email: lead.email,
            phone: lead.phone,
            feedback: lead.feedback,
            created_at: Utc::now(),
        };
        state.leads.push(lead.clone());
        Ok(lead)
    }

    async fn enabled_brand_codes(&self, region: Option<&str>) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        let regional = region.and_then(|r| state.brand_codes.get(r)).filter(|c| !c.is_empty());
        Ok(regional
            .or_else(|| state.brand_codes.get(APP_DEFAULTS_KEY))
            .cloned()
            .unwrap_or_default())
    }
}
