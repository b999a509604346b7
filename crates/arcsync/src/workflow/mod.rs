pub mod context;
pub mod engine;
pub mod error;
pub mod steps;

pub use context::WorkflowContext;
pub use engine::{Outcome, WorkflowEngine};
pub use error::StepError;
pub use steps::{step_names, WorkflowStep};
