//! Sport analyst: backend orchestration for AI sport performance analysis.
//!
//! Wraps the synchronous `analysis-core` pipeline with:
//! - a [`backend::ModelBackend`] trait plus local and cloud HTTP backends
//! - a timeout/fallback [`backend::BackendAdapter`]
//! - a per-request [`state_machine::RequestStateMachine`]
//! - the [`Analyzer`] entry point (single, comprehensive and bulk analysis)
//!
//! # Usage
//!
//! ```bash
//! sport-analyst analyze --subject game_vs_tigers.mp4 --media video --sport football
//! sport-analyst analyze --subject serve.mp4 --media video --sport tennis --comprehensive
//! sport-analyst suggest --query dribbl --sport basketball
//! sport-analyst --config analyst.toml health
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod backend;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod state_machine;

pub use backend::{
    BackendAdapter, BackendHealth, BackendKind, CloudBackend, InvocationContext, Invocation,
    LocalBackend, ModelBackend, ModelBackendDescriptor,
};
pub use config::{AnalystConfig, BackendConfig};
pub use errors::{AnalysisError, BackendError};
pub use orchestrator::{Analyzer, BulkItem, ComprehensiveAnalysis, PerformanceReport};
