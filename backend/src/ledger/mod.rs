//! Balance ledger: the single code path for agent balance reads and writes

pub mod model;
pub mod service;

pub use model::*;
pub use service::{is_low_balance, Ledger};
