//! Pipeline execution engine.
//!
//! Runs stages strictly in declared order against a run-scoped binding
//! table. A stage whose checkpoint already exists is skipped: the
//! checkpoint is loaded, parsed, and bound as that stage's output, which
//! is how an interrupted run resumes without recomputation. Stages
//! upstream of the last existing checkpoint are skipped entirely when
//! every remaining stage can still resolve its inputs.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use super::checkpoint::CheckpointStore;
use super::error::PipelineError;
use super::expand::RenderWarning;
use super::pipeline::{BindingValue, Bindings, Pipeline, Stage, StageOutcome};

/// Status of a single stage within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    /// Not executed: either restored from a checkpoint or upstream of the
    /// resume point
    Skipped,
    Done,
    Failed,
}

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    Running,
    Completed,
    Failed { stage: String, error: String },
}

/// Per-stage record in the run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub status: StageStatus,
    pub duration_ms: Option<u64>,
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub id: Uuid,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageRecord>,
    /// Render failures recorded by the expansion stage; the run still
    /// completes, with the failing blocks left as literal source
    pub warnings: Vec<RenderWarning>,
    /// Path of the final delivery artifact, when the run completed
    pub artifact: Option<PathBuf>,
}

impl RunReport {
    fn new(id: Uuid, pipeline: &Pipeline) -> Self {
        Self {
            id,
            state: RunState::Running,
            started_at: Utc::now(),
            completed_at: None,
            stages: pipeline
                .stages()
                .iter()
                .map(|s| StageRecord {
                    name: s.name().to_string(),
                    status: StageStatus::Pending,
                    duration_ms: None,
                })
                .collect(),
            warnings: Vec::new(),
            artifact: None,
        }
    }

    fn record(&mut self, index: usize, status: StageStatus, duration_ms: Option<u64>) {
        if let Some(record) = self.stages.get_mut(index) {
            record.status = status;
            record.duration_ms = duration_ms;
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, RunState::Completed)
    }
}

/// How a single stage resolved during the run loop
enum StageRun {
    /// Checkpoint existed; its parsed content is the stage output
    Restored(BindingValue),
    /// Upstream of the resume point; nothing bound
    Elided,
    /// Executed to completion
    Completed(StageOutcome),
}

/// Executes a pipeline against a checkpoint store
pub struct Orchestrator {
    store: CheckpointStore,
}

impl Orchestrator {
    pub fn new(store: CheckpointStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Execute the pipeline, returning a report of what ran, what was
    /// skipped, and what the run produced. Stage failures terminate the
    /// run and are reported in the returned state rather than as an `Err`.
    #[instrument(skip_all)]
    pub async fn run(&self, pipeline: &Pipeline) -> RunReport {
        let run_id = Uuid::new_v4();
        info!(%run_id, "Starting pipeline run");

        let mut report = RunReport::new(run_id, pipeline);
        let mut bindings = Bindings::default();

        let resume_from = self.resume_index(pipeline);
        if resume_from > 0 {
            info!(resume_from, "Existing checkpoints found, resuming");
        }

        for (index, stage) in pipeline.stages().iter().enumerate() {
            report.record(index, StageStatus::Running, None);
            let started = Instant::now();

            match self.run_stage(index, stage.as_ref(), resume_from, &bindings).await {
                Ok(StageRun::Restored(value)) => {
                    info!(stage = stage.name(), "Checkpoint present, skipping stage");
                    bindings.bind(stage.output(), value);
                    report.record(index, StageStatus::Skipped, None);
                }
                Ok(StageRun::Elided) => {
                    debug!(stage = stage.name(), "Upstream of resume point, skipping");
                    report.record(index, StageStatus::Skipped, None);
                }
                Ok(StageRun::Completed(outcome)) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    info!(stage = stage.name(), duration_ms, "Stage completed");
                    report.warnings.extend(outcome.warnings.iter().cloned());
                    bindings.bind(stage.output(), outcome.value);
                    report.record(index, StageStatus::Done, Some(duration_ms));
                }
                Err(e) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    error!(stage = stage.name(), error = %e, "Stage failed");
                    report.record(index, StageStatus::Failed, Some(duration_ms));
                    report.state = RunState::Failed {
                        stage: stage.name().to_string(),
                        error: e.to_string(),
                    };
                    report.completed_at = Some(Utc::now());
                    return report;
                }
            }
        }

        if let Ok(BindingValue::Artifact(path)) = bindings.get(pipeline.final_output()) {
            report.artifact = Some(path.clone());
        }
        report.state = RunState::Completed;
        report.completed_at = Some(Utc::now());
        info!(warnings = report.warnings.len(), "Run completed");
        report
    }

    async fn run_stage(
        &self,
        index: usize,
        stage: &dyn Stage,
        resume_from: usize,
        bindings: &Bindings,
    ) -> Result<StageRun, PipelineError> {
        if let Some(file) = stage.checkpoint_file() {
            if let Some(content) = self.store.load(&file).await? {
                let value = stage.restore(&content)?;
                return Ok(StageRun::Restored(value));
            }
        }

        if index < resume_from {
            return Ok(StageRun::Elided);
        }

        let outcome = stage.run(bindings).await?;

        if let Some(file) = stage.checkpoint_file() {
            self.store.save(&file, &outcome.value.encode()).await?;
        }

        Ok(StageRun::Completed(outcome))
    }

    /// Index of the first stage that must execute.
    ///
    /// Stages up to and including the last one whose checkpoint is on disk
    /// are skipped, provided every later stage can still resolve its
    /// declared inputs from the checkpointed bindings. Otherwise the whole
    /// pipeline runs.
    fn resume_index(&self, pipeline: &Pipeline) -> usize {
        let stages = pipeline.stages();

        let last_checkpointed = stages.iter().enumerate().rev().find_map(|(i, s)| {
            s.checkpoint_file()
                .filter(|file| self.store.has(file))
                .map(|_| i)
        });
        let Some(last) = last_checkpointed else {
            return 0;
        };

        // Names that restored checkpoints will bind in the skipped prefix.
        let mut bound: Vec<&str> = stages[..=last]
            .iter()
            .filter(|s| s.checkpoint_file().is_some_and(|f| self.store.has(&f)))
            .map(|s| s.output())
            .collect();

        for stage in &stages[last + 1..] {
            if !stage.inputs().iter().all(|input| bound.contains(input)) {
                debug!(
                    stage = stage.name(),
                    "Inputs not satisfiable from checkpoints, running full pipeline"
                );
                return 0;
            }
            bound.push(stage.output());
        }

        last + 1
    }
}
