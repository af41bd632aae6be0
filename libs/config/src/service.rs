//! Service configuration defaults
//!
//! Default values and constants used across the runtime, the bridge and
//! the demo service for consistency.

/// Actor runtime defaults
pub mod runtime {
    /// Name given to the actor system when none is configured
    pub const SYSTEM_NAME: &str = "demo-actor-system";

    /// Capacity of the per-actor control lane (stop signals)
    pub const CONTROL_CAPACITY: usize = 16;

    /// How long `stop` waits for a worker to finish its current message (milliseconds)
    pub const STOP_GRACE_MS: u64 = 500;
}

/// Completion bridge defaults
pub mod bridge {
    /// Deadline for a deferred result (milliseconds)
    pub const DEFERRED_TIMEOUT_MS: u64 = 1_000;

    /// Component name of the one-shot completion worker
    pub const WORKER_COMPONENT: &str = "workerActor";

    /// Payload used by the inbound demo endpoint
    pub const PAYLOAD: &str = "async-non-blocking";
}

/// Logging defaults
pub mod logging {
    /// Level used when neither `RUST_LOG` nor the config file sets one
    pub const LOG_LEVEL: &str = "info";
}
