//! Core domain types shared by the stages and the orchestrator:
//! stage identities, run states, artifacts and stage outputs.

mod artifact;
mod output;
mod status;

pub use artifact::{ArtifactKind, StageArtifact};
pub use output::StageOutput;
pub use status::{PipelineState, StageKind, StageStatus};
