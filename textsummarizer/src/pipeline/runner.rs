//! Sequential pipeline execution.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ConfigurationManager;
use crate::core::{PipelineState, StageKind};
use crate::errors::{Result, SummarizerError};
use crate::events::{EventSink, EventType, PipelineEvent};
use crate::stages::{Stage, StageContext, StageResult};

/// A validated, ordered list of stages.
///
/// Built with [`PipelineBuilder`](super::PipelineBuilder).
pub struct Pipeline {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    sink: Arc<dyn EventSink>,
    config: Arc<ConfigurationManager>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_kinds())
            .finish_non_exhaustive()
    }
}

/// Record of one pipeline run.
#[derive(Debug)]
pub struct PipelineRun {
    /// Run identifier carried by every event.
    pub run_id: Uuid,
    /// Terminal state: `Completed` or `Failed`.
    pub state: PipelineState,
    /// Every state the run passed through, in order.
    pub transitions: Vec<PipelineState>,
    /// One entry per executed stage.
    pub results: Vec<StageResult>,
    /// The failure, wrapped with the failing stage's name.
    pub error: Option<SummarizerError>,
}

impl PipelineRun {
    /// Returns the run, or its error if a stage failed.
    pub fn into_result(mut self) -> Result<Self> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Result of one stage, if it ran.
    #[must_use]
    pub fn result(&self, kind: StageKind) -> Option<&StageResult> {
        self.results.iter().find(|r| r.stage == kind)
    }

    fn enter(&mut self, state: PipelineState) {
        self.state = state;
        self.transitions.push(state);
    }
}

impl Pipeline {
    pub(super) fn new(
        name: String,
        stages: Vec<Arc<dyn Stage>>,
        sink: Arc<dyn EventSink>,
        config: Arc<ConfigurationManager>,
    ) -> Self {
        Self {
            name,
            stages,
            sink,
            config,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stages in execution order.
    #[must_use]
    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    /// Runs every stage and fails with the first stage error.
    pub async fn run(&self) -> Result<PipelineRun> {
        self.execute().await.into_result()
    }

    /// Runs stages in order until one fails.
    ///
    /// Stages after a failure never start. The returned record always
    /// carries the terminal state.
    pub async fn execute(&self) -> PipelineRun {
        let mut run = PipelineRun {
            run_id: Uuid::new_v4(),
            state: PipelineState::Pending,
            transitions: vec![PipelineState::Pending],
            results: Vec::with_capacity(self.stages.len()),
            error: None,
        };
        let started = Utc::now();
        tracing::info!(
            pipeline = %self.name,
            run_id = %run.run_id,
            stages = self.stages.len(),
            "Pipeline started"
        );
        self.sink
            .emit(
                &PipelineEvent::pipeline(EventType::PipelineStarted, run.run_id).with_data(json!({
                    "pipeline": self.name,
                    "stages": self.stage_kinds(),
                })),
            )
            .await;

        for stage in &self.stages {
            let kind = stage.kind();
            let name = stage.name();
            run.enter(kind.running_state());

            tracing::info!(">>>>>> stage {name} started <<<<<<");
            self.sink
                .emit(&PipelineEvent::stage(EventType::StageStarted, run.run_id, kind))
                .await;

            let ctx = StageContext::new(run.run_id, kind, Arc::clone(&self.config));
            let span = tracing::info_span!("stage", stage = ctx.stage().slug(), run_id = %ctx.run_id());
            let stage_started = Utc::now();
            match stage.execute(&ctx).instrument(span).await {
                Ok(output) => {
                    let result = StageResult::completed(kind, stage_started, output);
                    self.sink
                        .emit(
                            &PipelineEvent::stage(EventType::StageCompleted, run.run_id, kind)
                                .with_data(json!({
                                    "duration_ms": result.duration_ms(),
                                    "artifacts": result.artifacts.iter().map(|a| &a.path).collect::<Vec<_>>(),
                                    "data": result.data,
                                })),
                        )
                        .await;
                    tracing::info!(">>>>>> stage {name} completed <<<<<<\n\nx==========x");
                    run.results.push(result);
                }
                Err(err) => {
                    tracing::error!(
                        stage = kind.slug(),
                        error_kind = err.kind(),
                        error = %err,
                        "Stage failed"
                    );
                    let result = StageResult::failed(kind, stage_started, err.to_string());
                    self.sink
                        .emit(
                            &PipelineEvent::stage(EventType::StageFailed, run.run_id, kind).with_data(
                                json!({
                                    "duration_ms": result.duration_ms(),
                                    "error": err.to_string(),
                                    "error_kind": err.kind(),
                                }),
                            ),
                        )
                        .await;
                    run.results.push(result);
                    run.error = Some(err.in_stage(name));
                    run.enter(PipelineState::Failed);

                    self.sink
                        .emit(
                            &PipelineEvent::pipeline(EventType::PipelineFailed, run.run_id)
                                .with_data(json!({ "failed_stage": kind })),
                        )
                        .await;
                    return run;
                }
            }
        }

        run.enter(PipelineState::Completed);
        let duration_ms = (Utc::now() - started).num_milliseconds();
        tracing::info!(pipeline = %self.name, run_id = %run.run_id, duration_ms, "Pipeline completed");
        self.sink
            .emit(
                &PipelineEvent::pipeline(EventType::PipelineCompleted, run.run_id)
                    .with_data(json!({ "duration_ms": duration_ms })),
            )
            .await;
        run
    }
}
