//! Open-house rewards backend
//!
//! Agents prepay a balance; visitors who sign in at an open house receive a
//! gift card funded from it. The library exposes the ledger, the gift
//! issuance workflow and the HTTP surface so the binary and the integration
//! tests share one wiring.

pub mod config;
pub mod db;
pub mod error;
pub mod gifts;
pub mod handlers;
pub mod leads;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod notifications;
pub mod provider;
pub mod routes;
pub mod state;
pub mod store;
