use axum::extract::FromRef;

use crate::db::Database;
use crate::gifts::GiftService;
use crate::leads::LeadService;
use crate::ledger::Ledger;
use crate::middleware::RateLimiter;
use crate::provider::BrandCatalog;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub gift_service: GiftService,
    pub lead_service: LeadService,
    pub ledger: Ledger,
    pub brand_catalog: BrandCatalog,
    /// Per-agent limiter for interactive issuance
    pub issuance_limiter: RateLimiter,
    /// `None` when running on the in-memory store
    pub database: Option<Database>,
}

impl AppState {
    pub fn new(
        gift_service: GiftService,
        lead_service: LeadService,
        brand_catalog: BrandCatalog,
        issuance_limiter: RateLimiter,
        database: Option<Database>,
    ) -> Self {
        Self {
            ledger: gift_service.ledger().clone(),
            gift_service,
            lead_service,
            brand_catalog,
            issuance_limiter,
            database,
        }
    }
}

impl FromRef<AppState> for GiftService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.gift_service.clone()
    }
}

impl FromRef<AppState> for LeadService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.lead_service.clone()
    }
}

impl FromRef<AppState> for Ledger {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ledger.clone()
    }
}

impl FromRef<AppState> for BrandCatalog {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.brand_catalog.clone()
    }
}
