//! Runtime error types

use thiserror::Error;

use crate::pipeline::Stage;

/// A stage failure, carrying the stage that failed
#[derive(Error, Debug)]
#[error("pipeline failed in {stage} stage: {source}")]
pub struct PipelineError {
    /// Stage that was running
    pub stage: Stage,
    /// Underlying error
    #[source]
    pub source: salespipe_core::Error,
}

impl PipelineError {
    /// Wrap `source` as a failure of `stage`
    pub fn new(stage: Stage, source: salespipe_core::Error) -> Self {
        Self { stage, source }
    }
}
