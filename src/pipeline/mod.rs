//! In-process batch pipeline driver.
//!
//! A pipeline is an ordered list of named steps executed strictly
//! sequentially: each step either fully succeeds (all its writes are
//! visible) or fails and halts the run. There is no automatic retry and no
//! rollback of earlier steps; a failure surfaces the step's name and the
//! underlying cause, and downstream steps never run.

pub mod etl;
pub mod featurize;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::types::RagError;

pub use etl::{ExtractStep, LoadSink, LoadStage, TransformRule, TransformStage, etl_pipeline};
pub use featurize::{FeaturizationJob, FeaturizationReport, FeaturizeOptions};

/// One unit of pipeline work.
#[async_trait]
pub trait Step: Send + Sync {
    /// Step name used in reports and error messages.
    fn name(&self) -> &str;

    /// Execute the step to completion.
    async fn run(&self) -> Result<StepOutcome, RagError>;
}

/// What a completed step reports back to the driver.
#[derive(Clone, Debug, Default)]
pub struct StepOutcome {
    /// Number of records the step touched.
    pub count: usize,
}

impl StepOutcome {
    pub fn records(count: usize) -> Self {
        Self { count }
    }
}

/// Per-step entry in a [`PipelineReport`].
#[derive(Clone, Debug)]
pub struct StepReport {
    pub name: String,
    pub count: usize,
    pub duration: Duration,
}

/// Summary of a full pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub steps: Vec<StepReport>,
}

impl PipelineReport {
    /// Total records touched across all steps.
    pub fn total_records(&self) -> usize {
        self.steps.iter().map(|step| step.count).sum()
    }
}

/// A pipeline failure, carrying the failing step's name and cause.
///
/// Data written by prior, already-committed steps remains in the stores.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: RagError,
    },
}

/// Ordered, named steps executed by a small in-process driver.
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn Step>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step; steps run in registration order.
    #[must_use]
    pub fn step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Names of the registered steps, in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Run every step in order, halting at the first failure.
    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, steps = self.steps.len(), "pipeline starting");

        let mut reports = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let started = Instant::now();
            match step.run().await {
                Ok(outcome) => {
                    let duration = started.elapsed();
                    info!(
                        step = step.name(),
                        count = outcome.count,
                        elapsed_ms = duration.as_millis() as u64,
                        "step completed"
                    );
                    reports.push(StepReport {
                        name: step.name().to_string(),
                        count: outcome.count,
                        duration,
                    });
                }
                Err(source) => {
                    error!(step = step.name(), %source, "step failed; halting pipeline");
                    return Err(PipelineError::Step {
                        step: step.name().to_string(),
                        source,
                    });
                }
            }
        }

        info!(%run_id, total = reports.iter().map(|r| r.count).sum::<usize>(), "pipeline finished");
        Ok(PipelineReport {
            run_id,
            steps: reports,
        })
    }
}
