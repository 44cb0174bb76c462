//! Per-stage execution context.

use std::sync::Arc;
use uuid::Uuid;

use crate::config::ConfigurationManager;
use crate::core::StageKind;

/// What a stage can see while it runs.
///
/// Cheap to clone: the configuration is shared, never copied.
#[derive(Debug, Clone)]
pub struct StageContext {
    run_id: Uuid,
    stage: StageKind,
    config: Arc<ConfigurationManager>,
}

impl StageContext {
    /// Creates a context for one stage of a run.
    #[must_use]
    pub fn new(run_id: Uuid, stage: StageKind, config: Arc<ConfigurationManager>) -> Self {
        Self {
            run_id,
            stage,
            config,
        }
    }

    /// The run this stage belongs to.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The stage being executed.
    #[must_use]
    pub fn stage(&self) -> StageKind {
        self.stage
    }

    /// Shared configuration.
    #[must_use]
    pub fn config(&self) -> &ConfigurationManager {
        &self.config
    }
}
