//! The Sentra decision core: rule engine, scorer, pipeline, and case
//! coordination.
//!
//! - [`RuleEngine`] loads active rules through a TTL cache and evaluates the
//!   six rule families against an enrichment context
//! - [`MlPredictor`] is the optional model scorer (disabled by default)
//! - [`DecisionPipeline`] orchestrates enrichment, evaluation, aggregation,
//!   persistence, case handling, and detached state recording
//! - [`CaseCoordinator`] owns fraud-case lifecycle and user risk profiles

pub mod cases;
pub mod engine;
pub mod error;
pub mod ml;
pub mod pipeline;
pub mod rules;

pub use cases::{CaseCoordinator, UserRiskProfile};
pub use engine::RuleEngine;
pub use error::{EngineError, EngineResult};
pub use ml::{FeatureExtractor, Features, MlPredictor, Prediction};
pub use pipeline::{
    AnalyzeInput, AnalyzeOutput, BatchOutput, BatchSummary, DecisionPipeline, PipelineConfig,
    ProfileSource,
};
