//! Sport analysis core.
//!
//! Everything in this crate is synchronous and backend-agnostic:
//!
//! - [`prompts`]: deterministic prompt compiler and the shared response contract
//! - [`extractor`]: total, line-oriented response extractor
//! - [`vocabulary`]: per-sport keyword tags and tag suggestions
//! - [`enrich`]: post-extraction tags, suggestions and auto categories
//! - [`aggregate`]: axis mean and weighted composite scoring
//! - [`tracker`]: per-sport accuracy/latency records and learning history
//!
//! The async orchestration layer (backends, timeouts, fan-out) lives in the
//! `sport-analyst` crate.
//!
//! ```text
//! AnalysisRequest ─► prompts::compile ─► (backend) ─► extractor::extract_for
//!                                                        │
//!                      tracker::record ◄─ aggregate ◄─ enrich
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod aggregate;
pub mod enrich;
pub mod extractor;
pub mod prompts;
pub mod tracker;
pub mod types;
pub mod vocabulary;

pub use aggregate::{
    axis_mean, category_score, composite, AggregationError, CategoryScore, CompositeScore,
    CompositeWeights, SubAnalysis,
};
pub use extractor::{extract, extract_for};
pub use prompts::{compile, AnalysisKind, FALLBACK_RESPONSE};
pub use tracker::{accuracy_estimate, PerformanceTracker, SportTrend};
pub use types::{
    AnalysisContext, AnalysisRequest, ContentAnalysisResult, ContentTag, LearningEntry,
    MediaKind, ModelPerformanceRecord, PerformanceScore, ResultSource, Setting,
    SkillAssessment, TagCategory,
};
