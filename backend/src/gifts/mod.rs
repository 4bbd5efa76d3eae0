//! Gift issuance and settlement
//!
//! - `service`: the issuance state machine (interactive and deferred flows,
//!   cancellation, operator repair paths)
//! - `reconcile`: provider vs. local comparison for operators
//! - `sweeper`: scheduled settlement of Pending gifts

pub mod model;
pub mod reconcile;
pub mod service;
pub mod sweeper;

pub use model::*;
pub use reconcile::ReconciliationReport;
pub use service::GiftService;
pub use sweeper::{settle_pending_gifts, start_pending_sweep, SweepSummary};

/// Business rules applied by the issuance workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GiftPolicy {
    /// Smallest gift an agent may send interactively
    pub min_amount_cents: i64,
    /// Post-debit balances under this trigger the low-balance email
    pub low_balance_threshold_cents: i64,
    /// Credit the agent back when a debited gift is cancelled
    pub refund_on_cancel: bool,
}

impl Default for GiftPolicy {
    fn default() -> Self {
        Self {
            min_amount_cents: 500,
            low_balance_threshold_cents: 2500,
            refund_on_cancel: true,
        }
    }
}
