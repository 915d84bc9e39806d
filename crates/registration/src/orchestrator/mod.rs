pub mod attempt_engine;

pub use attempt_engine::{AttemptOrchestrator, AttemptReport};
