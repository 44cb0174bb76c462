//! Stage trait and execution context.
//!
//! A stage is one sequential unit of pipeline work. It reads its typed
//! configuration from the [`StageContext`], performs its side effects on
//! disk and reports what it wrote through a [`StageOutput`].

mod context;
mod result;

pub use context::StageContext;
pub use result::StageResult;

use crate::core::{StageKind, StageOutput};
use crate::errors::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Which pipeline step this stage performs.
    fn kind(&self) -> StageKind;

    /// Human-readable stage name used in logs.
    fn name(&self) -> String {
        self.kind().to_string()
    }

    /// Executes the stage.
    ///
    /// Returns the artifacts written, or the first error encountered.
    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput>;
}
