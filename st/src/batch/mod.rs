//! Batch coordination
//!
//! Stories are fed one at a time through the orchestrator address, strictly
//! in input order. Each item ends as a plan or a failure record; the batch
//! itself always completes.

mod coordinator;
mod input;
mod report;
mod service;

pub use coordinator::BatchCoordinator;
pub use input::BatchInput;
pub use report::{BatchReport, BatchTotals};
pub use service::BatchService;

use thiserror::Error;

/// Errors that reject a batch before anything is dispatched
#[derive(Debug, Error, PartialEq)]
pub enum BatchError {
    #[error("Malformed batch input: {0}")]
    MalformedInput(String),
}
