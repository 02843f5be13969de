//! Background mipmap production.
//!
//! A fixed pool of worker threads produces mipmap levels off the render
//! thread. The [`WorkerCoordinator`] routes requests per channel, keeps at
//! most one request per channel in flight, and drops results that no longer
//! match what the channel wants.

pub mod coordinator;
pub mod ledger;

pub use coordinator::{
    default_worker_count, CoordinatorConfig, CoordinatorError, CoordinatorEvent, RequestStatus,
    WorkerCoordinator,
};
pub use ledger::{Completion, PendingLedger, PendingState, RequestAction};
