//! Lead capture: the producer of Pending gifts

pub mod model;
pub mod service;

pub use model::*;
pub use service::LeadService;
