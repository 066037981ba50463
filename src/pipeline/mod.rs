pub mod config;
pub mod deadline;
pub mod orchestrator;

pub use config::PipelineConfig;
pub use deadline::Deadline;
pub use orchestrator::{Detection, Pipeline};
