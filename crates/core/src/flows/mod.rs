pub mod engine;
pub mod states;

pub use engine::{ApprovalEngine, EngineConfig};
pub use states::{TransitionOutcome, WorkflowAction};
