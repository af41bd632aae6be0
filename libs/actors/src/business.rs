//! Business service collaborator
//!
//! Side-effecting action the workers call for every message they accept.
//! Shared by all workers, so implementations must be thread-safe.

use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Registry name of the shared business service
pub const BUSINESS_SERVICE: &str = "businessService";

/// Action performed on every observation a worker makes
pub trait BusinessAction: Send + Sync {
    fn perform(&self, observation: &dyn fmt::Display);
}

pub type SharedBusinessAction = Arc<dyn BusinessAction>;

/// Logs each observation
#[derive(Debug, Default, Clone, Copy)]
pub struct BusinessService;

impl BusinessService {
    pub fn shared() -> SharedBusinessAction {
        Arc::new(Self)
    }
}

impl BusinessAction for BusinessService {
    fn perform(&self, observation: &dyn fmt::Display) {
        info!("Perform: {}", observation);
    }
}
