//! Pipeline plumbing around the request envelope.
//!
//! - [`stage`] - Queue hand-off between stages and the stage driver loop
//! - [`admission`] - Large-request accounting and outstanding-request limits

pub mod admission;
pub mod stage;

pub use admission::{LargeRequestGate, OutstandingLimiter};
pub use stage::{run_stage, spawn_stage, RequestProcessor, StageHandle, StageSpec, StageSummary};
