//! Built-in workers
//!
//! Two worker behaviours, both driven by [`WorkerMessage`](crate::messages::WorkerMessage):
//! - [`CompletionWorker`]: one-shot, completes a promise and stops
//! - [`CountingWorker`]: long-lived, counts requests and reports the count
//!
//! [`register_workers`] puts both into a registry alongside the shared
//! business service they depend on.

pub mod completion;
pub mod counting;

pub use completion::CompletionWorker;
pub use counting::CountingWorker;

use crate::business::{SharedBusinessAction, BUSINESS_SERVICE};
use crate::components::{ComponentDefinition, InMemoryRegistry};
use crate::error::Result;
use deferred_config::defaults;

/// Registry name of the one-shot completion worker
pub const COMPLETION_WORKER: &str = defaults::bridge::WORKER_COMPONENT;

/// Registry name of the counting worker
pub const COUNTING_WORKER: &str = "countingWorker";

/// Register `business` as the shared business service, plus both workers
/// under their default names.
pub fn register_workers(registry: &InMemoryRegistry, business: SharedBusinessAction) -> Result<()> {
    registry.register(
        ComponentDefinition::<SharedBusinessAction>::singleton(BUSINESS_SERVICE)
            .constructor(move |_| Ok(business.clone())),
    )?;
    registry.register(CompletionWorker::definition(COMPLETION_WORKER))?;
    registry.register(CountingWorker::definition(COUNTING_WORKER))?;
    Ok(())
}
