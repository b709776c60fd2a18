//! The domain data model: bibliographic records and the research artifacts
//! built from them.

pub mod checkpoint;
pub mod citation;
pub mod paper;
pub mod plan;
pub mod quality;
pub mod round;
pub mod stats;
pub mod timeline;
pub mod topic;

pub use checkpoint::{Checkpoint, CheckpointAction, CheckpointKind, CheckpointOption, CheckpointResolution, CheckpointVariant};
pub use citation::Citation;
pub use paper::{DataAvailability, Paper, SourceId};
pub use plan::{ResearchPlan, SearchStrategy};
pub use quality::{CriticAnalysis, QualityDecision, QualityGateConfig, QualityMetrics};
pub use round::SearchRound;
pub use stats::MemoryStats;
pub use timeline::{AgentEvent, AgentEventStatus, Stage};
pub use topic::{GapStatus, ProcessedTopic, TrackedGap};
