//! Step execution and per-ticket coordination.

pub mod coordinator;
pub mod executor;
pub mod log;

pub use coordinator::{Coordinator, PlannedStep, SharedCoordinator, STEP_PLAN};
pub use executor::StepExecutor;
pub use log::{
    ProcessingLog, StepOutcome, StepPayload, StepRecord, StepSummary, TicketStatus,
};
