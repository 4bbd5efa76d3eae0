//! PostgreSQL store
//!
//! Money-moving operations run inside one SQL transaction. The debit is a
//! guarded `UPDATE ... WHERE available_balance_cents >= $amount`, so two
//! concurrent issuances can never both pass the funds check.

use async_trait::async_trait;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{
    status_conflict, DirectoryStore, GiftStore, LedgerStore, Result, StoreError, APP_DEFAULTS_KEY,
};
use crate::gifts::{ClaimLink, Gift, GiftState, GiftStatus, NewGift};
use crate::ledger::{BalanceChange, LedgerEntry, Transaction, TransactionType};
use crate::models::{Agent, Lead, NewLead, OpenHouse};

const GIFT_COLUMNS: &str = "id, user_id, lead_id, open_house_id, recipient_name, recipient_email, \
     brand_code, brand_name, amount_in_cents, message, status, claim_url, short_id, sent_at, \
     cancelled_at, error_message, refunded, created_at, updated_at";

/// Flat row of the `gifts` table
#[derive(Debug, sqlx::FromRow)]
struct GiftRow {
    id: Uuid,
    user_id: Uuid,
    lead_id: Option<Uuid>,
    open_house_id: Option<Uuid>,
    recipient_name: String,
    recipient_email: String,
    brand_code: String,
    brand_name: String,
    amount_in_cents: i64,
    message: Option<String>,
    status: GiftStatus,
    claim_url: Option<String>,
    short_id: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    refunded: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GiftRow> for Gift {
    type Error = StoreError;

    fn try_from(row: GiftRow) -> Result<Self> {
        let claim = match (row.claim_url, row.short_id) {
            (Some(claim_url), Some(short_id)) => Some(ClaimLink {
                claim_url,
                short_id,
            }),
            _ => None,
        };
        let missing = |field: &str| {
            StoreError::InvalidRecord(format!("gift {} is {} without {}", row.id, row.status, field))
        };

        let state = match row.status {
            GiftStatus::Pending => GiftState::Pending,
            GiftStatus::Created => GiftState::Created {
                claim,
                last_error: row.error_message,
            },
            GiftStatus::Sent => GiftState::Sent {
                claim: claim.ok_or_else(|| missing("claim link"))?,
                sent_at: row.sent_at.ok_or_else(|| missing("sent_at"))?,
            },
            GiftStatus::Failed => GiftState::Failed {
                error_message: row.error_message.unwrap_or_default(),
                orphaned_claim: claim,
                refunded: row.refunded,
            },
            GiftStatus::Cancelled => GiftState::Cancelled {
                cancelled_at: row.cancelled_at.ok_or_else(|| missing("cancelled_at"))?,
                refunded: row.refunded,
            },
        };

        Ok(Gift {
            id: row.id,
            user_id: row.user_id,
            recipient_name: row.recipient_name,
            recipient_email: row.recipient_email,
            brand_code: row.brand_code,
            brand_name: row.brand_name,
            amount_in_cents: row.amount_in_cents,
            message: row.message,
            lead_id: row.lead_id,
            open_house_id: row.open_house_id,
            state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// State-dependent columns of a gift row
struct StateColumns {
    status: GiftStatus,
    claim_url: Option<String>,
    short_id: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    refunded: bool,
}

impl From<&GiftState> for StateColumns {
    fn from(state: &GiftState) -> Self {
        let claim = state.claim();
        let mut cols = StateColumns {
            status: state.status(),
            claim_url: claim.map(|c| c.claim_url.clone()),
            short_id: claim.map(|c| c.short_id.clone()),
            sent_at: None,
            cancelled_at: None,
            error_message: None,
            refunded: false,
        };
        match state {
            GiftState::Pending | GiftState::Created { last_error: None, .. } => {}
            GiftState::Created {
                last_error: Some(err),
                ..
            } => cols.error_message = Some(err.clone()),
            GiftState::Sent { sent_at, .. } => cols.sent_at = Some(*sent_at),
            GiftState::Failed {
                error_message,
                refunded,
                ..
            } => {
                cols.error_message = Some(error_message.clone());
                cols.refunded = *refunded;
            }
            GiftState::Cancelled {
                cancelled_at,
                refunded,
            } => {
                cols.cancelled_at = Some(*cancelled_at);
                cols.refunded = *refunded;
            }
        }
        cols
    }
}

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Apply a balance movement. Debits only succeed when the balance covers
/// them; the row is left untouched otherwise.
async fn apply_balance(
    conn: &mut PgConnection,
    entry: &LedgerEntry,
    kind: TransactionType,
) -> Result<(i64, i64)> {
    let updated = match kind {
        TransactionType::Debit => {
            sqlx::query_as::<_, (i64,)>(
                r#"
                UPDATE users
                SET available_balance_cents = available_balance_cents - $2, updated_at = NOW()
                WHERE id = $1 AND available_balance_cents >= $2
                RETURNING available_balance_cents
                "#,
            )
            .bind(entry.user_id)
            .bind(entry.amount_cents)
            .fetch_optional(&mut *conn)
            .await?
        }
        TransactionType::Credit => {
            sqlx::query_as::<_, (i64,)>(
                r#"
                UPDATE users
                SET available_balance_cents = available_balance_cents + $2, updated_at = NOW()
                WHERE id = $1
                RETURNING available_balance_cents
                "#,
            )
            .bind(entry.user_id)
            .bind(entry.amount_cents)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| match &e {
                // numeric_value_out_of_range
                sqlx::Error::Database(db) if db.code().as_deref() == Some("22003") => {
                    StoreError::BalanceOutOfRange(format!(
                        "credit of {} cents for {}",
                        entry.amount_cents, entry.user_id
                    ))
                }
                _ => StoreError::Database(e),
            })?
        }
    };

    match (updated, kind) {
        (Some((after,)), TransactionType::Debit) => Ok((after + entry.amount_cents, after)),
        (Some((after,)), TransactionType::Credit) => Ok((after - entry.amount_cents, after)),
        (None, TransactionType::Debit) => {
            let current = sqlx::query_as::<_, (i64,)>(
                "SELECT available_balance_cents FROM users WHERE id = $1",
            )
            .bind(entry.user_id)
            .fetch_optional(&mut *conn)
            .await?;
            match current {
                Some((available,)) => Err(StoreError::InsufficientFunds {
                    available,
                    requested: entry.amount_cents,
                }),
                None => Err(StoreError::NotFound(format!("agent {}", entry.user_id))),
            }
        }
        (None, TransactionType::Credit) => {
            Err(StoreError::NotFound(format!("agent {}", entry.user_id)))
        }
    }
}

async fn insert_transaction(
    conn: &mut PgConnection,
    entry: LedgerEntry,
    kind: TransactionType,
) -> Result<Transaction> {
    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (id, user_id, transaction_type, amount_cents, description, gift_id, created_by_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.user_id)
    .bind(kind)
    .bind(entry.amount_cents)
    .bind(entry.description)
    .bind(entry.gift_id)
    .bind(entry.created_by_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(transaction)
}

/// Balance update plus its ledger row.
async fn record_movement(
    conn: &mut PgConnection,
    entry: LedgerEntry,
    kind: TransactionType,
) -> Result<BalanceChange> {
    let (balance_before, balance_after) = apply_balance(conn, &entry, kind).await?;
    let transaction = insert_transaction(conn, entry, kind).await?;
    Ok(BalanceChange {
        user_id: transaction.user_id,
        balance_before,
        balance_after,
        transaction,
    })
}

async fn insert_gift(conn: &mut PgConnection, gift: NewGift, state: GiftState) -> Result<Gift> {
    let id = gift.id;
    let cols = StateColumns::from(&state);
    let row = sqlx::query_as::<_, GiftRow>(&format!(
        r#"
        INSERT INTO gifts (id, user_id, lead_id, open_house_id, recipient_name, recipient_email,
            brand_code, brand_name, amount_in_cents, message, status, claim_url, short_id,
            sent_at, cancelled_at, error_message, refunded, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, NOW(), NOW())
        RETURNING {}
        "#,
        GIFT_COLUMNS
    ))
    .bind(gift.id)
    .bind(gift.user_id)
    .bind(gift.lead_id)
    .bind(gift.open_house_id)
    .bind(gift.recipient_name)
    .bind(gift.recipient_email)
    .bind(gift.brand_code)
    .bind(gift.brand_name)
    .bind(gift.amount_in_cents)
    .bind(gift.message)
    .bind(cols.status)
    .bind(cols.claim_url)
    .bind(cols.short_id)
    .bind(cols.sent_at)
    .bind(cols.cancelled_at)
    .bind(cols.error_message)
    .bind(cols.refunded)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(format!("gift {} already exists", id))
        }
        other => StoreError::Database(other),
    })?;
    row.try_into()
}

/// Compare-and-swap on the gift status.
async fn update_gift_state(
    conn: &mut PgConnection,
    id: Uuid,
    expected: GiftStatus,
    next: &GiftState,
) -> Result<Gift> {
    let cols = StateColumns::from(next);
    let row = sqlx::query_as::<_, GiftRow>(&format!(
        r#"
        UPDATE gifts
        SET status = $3, claim_url = $4, short_id = $5, sent_at = $6, cancelled_at = $7,
            error_message = $8, refunded = $9, updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING {}
        "#,
        GIFT_COLUMNS
    ))
    .bind(id)
    .bind(expected)
    .bind(cols.status)
    .bind(cols.claim_url)
    .bind(cols.short_id)
    .bind(cols.sent_at)
    .bind(cols.cancelled_at)
    .bind(cols.error_message)
    .bind(cols.refunded)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => row.try_into(),
        None => {
            let actual = sqlx::query_as::<_, (GiftStatus,)>("SELECT status FROM gifts WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
            match actual {
                Some((actual,)) => Err(status_conflict(id, expected, actual)),
                None => Err(StoreError::NotFound(format!("gift {}", id))),
            }
        }
    }
}

fn into_gifts(rows: Vec<GiftRow>) -> Result<Vec<Gift>> {
    rows.into_iter().map(Gift::try_from).collect()
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn balance(&self, user_id: Uuid) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT available_balance_cents FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(balance,)| balance)
            .ok_or_else(|| StoreError::NotFound(format!("agent {}", user_id)))
    }

    async fn credit(&self, entry: LedgerEntry) -> Result<BalanceChange> {
        let mut tx = self.pool.begin().await?;
        let change = record_movement(&mut *tx, entry, TransactionType::Credit).await?;
        tx.commit().await?;
        Ok(change)
    }

    async fn transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn debit_and_create_gift(
        &self,
        entry: LedgerEntry,
        gift: NewGift,
    ) -> Result<(Gift, BalanceChange)> {
        let mut tx = self.pool.begin().await?;

        // The ledger row references the gift, so the gift goes in first.
        let gift = insert_gift(
            &mut tx,
            gift,
            GiftState::Created {
                claim: None,
                last_error: None,
            },
        )
        .await?;
        let change = record_movement(&mut *tx, entry, TransactionType::Debit).await?;

        tx.commit().await?;
        Ok((gift, change))
    }

    async fn debit_and_settle_gift(
        &self,
        entry: LedgerEntry,
        gift_id: Uuid,
        claim: ClaimLink,
        sent_at: DateTime<Utc>,
    ) -> Result<(Gift, BalanceChange)> {
        let mut tx = self.pool.begin().await?;

        let gift = update_gift_state(
            &mut tx,
            gift_id,
            GiftStatus::Pending,
            &GiftState::Sent { claim, sent_at },
        )
        .await?;
        let change = record_movement(&mut *tx, entry, TransactionType::Debit).await?;

        tx.commit().await?;
        Ok((gift, change))
    }

    async fn credit_and_close_gift(
        &self,
        entry: LedgerEntry,
        gift_id: Uuid,
        expected: GiftStatus,
        next: GiftState,
    ) -> Result<(Gift, BalanceChange)> {
        let mut tx = self.pool.begin().await?;

        let gift = update_gift_state(&mut *tx, gift_id, expected, &next).await?;
        let change = record_movement(&mut *tx, entry, TransactionType::Credit).await?;

        tx.commit().await?;
        Ok((gift, change))
    }
}

#[async_trait]
impl GiftStore for PgStore {
    async fn insert_pending_gift(&self, gift: NewGift) -> Result<Gift> {
        let mut conn = self.pool.acquire().await?;
        insert_gift(&mut *conn, gift, GiftState::Pending).await
    }

    async fn gift(&self, id: Uuid) -> Result<Option<Gift>> {
        let row = sqlx::query_as::<_, GiftRow>(&format!(
            "SELECT {} FROM gifts WHERE id = $1",
            GIFT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Gift::try_from).transpose()
    }

    async fn gifts_for_user(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Gift>> {
        let rows = sqlx::query_as::<_, GiftRow>(&format!(
            "SELECT {} FROM gifts WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            GIFT_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        into_gifts(rows)
    }

    async fn gifts_with_status(&self, status: GiftStatus, limit: i64) -> Result<Vec<Gift>> {
        let rows = sqlx::query_as::<_, GiftRow>(&format!(
            "SELECT {} FROM gifts WHERE status = $1 ORDER BY created_at ASC LIMIT $2",
            GIFT_COLUMNS
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        into_gifts(rows)
    }

    async fn unlinked_gifts(&self, created_before: DateTime<Utc>) -> Result<Vec<Gift>> {
        let rows = sqlx::query_as::<_, GiftRow>(&format!(
            r#"
            SELECT {} FROM gifts
            WHERE status = 'created' AND claim_url IS NULL AND created_at < $1
            ORDER BY created_at ASC
            "#,
            GIFT_COLUMNS
        ))
        .bind(created_before)
        .fetch_all(&self.pool)
        .await?;
        into_gifts(rows)
    }

    async fn transition_gift(
        &self,
        id: Uuid,
        expected: GiftStatus,
        next: GiftState,
    ) -> Result<Gift> {
        let mut conn = self.pool.acquire().await?;
        update_gift_state(&mut *conn, id, expected, &next).await
    }
}

#[async_trait]
impl DirectoryStore for PgStore {
    async fn agent(&self, user_id: Uuid) -> Result<Option<Agent>> {
        let agent = sqlx::query_as::<_, Agent>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(agent)
    }

    async fn open_house(&self, id: Uuid) -> Result<Option<OpenHouse>> {
        let house = sqlx::query_as::<_, OpenHouse>("SELECT * FROM open_houses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(house)
    }

    async fn insert_lead(&self, lead: NewLead) -> Result<Lead> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (id, open_house_id, user_id, name, email, phone, feedback, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING *
            "#,
        )
        .bind(lead.id)
        .bind(lead.open_house_id)
        .bind(lead.user_id)
        .bind(lead.name)
        .bind(lead.email)
        .bind(lead.phone)
        .bind(lead.feedback)
        .fetch_one(&self.pool)
        .await?;
        Ok(lead)
    }

    async fn enabled_brand_codes(&self, region: Option<&str>) -> Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String, Vec<String>)>(
            "SELECT key, enabled_brand_codes FROM app_settings WHERE key = $1 OR key = $2",
        )
        .bind(region.unwrap_or(APP_DEFAULTS_KEY))
        .bind(APP_DEFAULTS_KEY)
        .fetch_all(&self.pool)
        .await?;

        let regional = region.and_then(|r| {
            rows.iter()
                .find(|(key, codes)| key == r && !codes.is_empty())
                .map(|(_, codes)| codes.clone())
        });
        Ok(regional
            .or_else(|| {
                rows.iter()
                    .find(|(key, _)| key == APP_DEFAULTS_KEY)
                    .map(|(_, codes)| codes.clone())
            })
            .unwrap_or_default())
    }
}
