//! Analysis pipeline: the single-photo engine and the batch orchestrator.

mod batch;
mod engine;

pub use batch::{BatchConfig, BatchOrchestrator};
pub use engine::{EngineConfig, QualityEngine};
