//! Stage workers. Each component owns one configuration record and does
//! the actual work of its stage; the pipeline stages wrap them.

pub mod evaluation;
pub mod ingestion;
pub mod trainer;
pub mod transformation;
pub mod validation;

pub use evaluation::{ModelEvaluation, SummaryGenerator};
pub use ingestion::{ArchiveFetcher, DataIngestion, FetchReport, HttpFetcher};
pub use trainer::{LinearSchedule, ModelTrainer, TrainerState};
pub use transformation::DataTransformation;
pub use validation::{DataValidation, ValidationStatus};
