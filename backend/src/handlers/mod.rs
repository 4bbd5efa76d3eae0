//! HTTP handlers; each delegates to a service and wraps the result in
//! `ApiResponse`

pub mod admin;
pub mod catalog;
pub mod gifts;
pub mod health;
pub mod leads;
pub mod ledger;

pub use health::health_check;
