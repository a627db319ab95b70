//! Analysis orchestrator.
//!
//! Sequences one request through compile → invoke → extract → aggregate, and
//! fans comprehensive requests out to five independent sub-pipelines:
//!
//! ```text
//!                 ┌─ computer_vision ─┐
//!                 ├─ sport_specific ──┤
//! request ─spawn─►├─ benchmarking ────┼─join all─► composite (weighted, risk inverted)
//!                 ├─ injury_risk ─────┤
//!                 └─ coaching ────────┘
//! ```
//!
//! ## Partial failure policy
//!
//! A sub-pipeline that fails for any reason other than missing cloud
//! credentials contributes the fallback result, and so does one whose answer
//! assessed no axis at all. Only a configuration error aborts a
//! comprehensive request.
//!
//! Sub-analyses skip the tag-oriented enrichment steps (media tags, name
//! hints, vocabulary backfill) but still get derived suggestions and auto
//! categories.

use std::collections::BTreeMap;
use std::sync::Arc;

use analysis_core::{
    category_score, composite, enrich, extract_for, prompts, vocabulary, AnalysisKind,
    AnalysisRequest, CategoryScore, ContentAnalysisResult, ContentTag, LearningEntry,
    ModelPerformanceRecord, PerformanceTracker, ResultSource, SportTrend, SubAnalysis,
    FALLBACK_RESPONSE,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::backend::{
    build_backend, BackendAdapter, BackendHealth, InvocationContext, ModelBackend,
    ModelBackendDescriptor,
};
use crate::config::AnalystConfig;
use crate::errors::AnalysisError;
use crate::state_machine::{RequestState, RequestStateMachine};

/// Outcome of [`Analyzer::analyze_comprehensive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveAnalysis {
    /// Weighted composite, 0–100.
    pub overall_score: u32,
    pub categories: Vec<CategoryScore>,
    pub per_sub_analysis: BTreeMap<SubAnalysis, ContentAnalysisResult>,
}

/// One entry of a bulk run, in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItem {
    pub subject_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ContentAnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Answer of [`Analyzer::get_performance`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PerformanceReport {
    Sport(Option<ModelPerformanceRecord>),
    All(BTreeMap<String, ModelPerformanceRecord>),
}

/// Entry point of the analysis pipeline. Cheap to clone; clones share the
/// backend and the performance tracker.
#[derive(Clone)]
pub struct Analyzer {
    config: Arc<AnalystConfig>,
    adapter: BackendAdapter,
    tracker: Arc<PerformanceTracker>,
}

impl Analyzer {
    /// Validate `config` and build the backend it describes.
    ///
    /// Invalid weights fail here, never at request time.
    pub fn new(config: AnalystConfig) -> Result<Self, AnalysisError> {
        config.weights.validate()?;
        config.validate().map_err(AnalysisError::Configuration)?;
        let backend = build_backend(config.descriptor(), config.backend.api_key.clone())?;
        Self::with_backend(config, backend)
    }

    /// Use an already-built backend. The backend section of `config` is ignored.
    pub fn with_backend(
        config: AnalystConfig,
        backend: Arc<dyn ModelBackend>,
    ) -> Result<Self, AnalysisError> {
        config.weights.validate()?;
        if config.bulk_concurrency == 0 {
            return Err(AnalysisError::Configuration(
                "bulk_concurrency must be > 0".to_string(),
            ));
        }
        info!(
            kind = %backend.descriptor().kind,
            provider = %backend.descriptor().provider_id,
            model = %backend.descriptor().model_id,
            "analyzer ready"
        );
        Ok(Self {
            config: Arc::new(config),
            adapter: BackendAdapter::new(backend),
            tracker: Arc::new(PerformanceTracker::new()),
        })
    }

    pub fn config(&self) -> &AnalystConfig {
        &self.config
    }

    pub fn descriptor(&self) -> &ModelBackendDescriptor {
        self.adapter.descriptor()
    }

    pub fn tracker(&self) -> &PerformanceTracker {
        &self.tracker
    }

    /// Analyse one piece of content.
    ///
    /// Backend outages yield the fallback-shaped result; the only error is an
    /// unconfigured cloud backend.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<ContentAnalysisResult, AnalysisError> {
        info!(
            subject = %request.subject_ref,
            sport = %request.sport_key(),
            media = %request.media_kind,
            "analysis started"
        );
        let result = self.run_pipeline(AnalysisKind::ContentTagging, request).await?;
        info!(
            subject = %request.subject_ref,
            overall = result.performance.overall(),
            tags = result.tags.len(),
            fallback = result.is_fallback(),
            "analysis finished"
        );
        Ok(result)
    }

    async fn run_pipeline(
        &self,
        kind: AnalysisKind,
        request: &AnalysisRequest,
    ) -> Result<ContentAnalysisResult, AnalysisError> {
        let mut sm = RequestStateMachine::new();
        let prompt = prompts::compile(kind, request);

        sm.advance(RequestState::Invoking, None)?;
        let context = InvocationContext {
            subject_ref: request.subject_ref.clone(),
            media_kind: request.media_kind,
        };
        let invocation = match self.adapter.invoke(&prompt, &context).await {
            Ok(invocation) => invocation,
            Err(err) => {
                sm.fail(&err.to_string())?;
                debug!(kind = %kind, transitions = %sm.summary(), "pipeline aborted");
                return Err(err);
            }
        };

        let next = match invocation.source {
            ResultSource::Backend => RequestState::Extracting,
            ResultSource::Fallback => RequestState::FallbackExtracting,
        };
        sm.advance(next, None)?;
        let mut result = extract_for(request, &invocation.text);
        result.source = invocation.source;

        sm.advance(RequestState::Aggregating, None)?;
        if kind == AnalysisKind::ContentTagging {
            enrich::enrich(request, &mut result, self.config.min_ai_tags);
        } else {
            enrich::derived_suggestions(&mut result);
            enrich::auto_categories(&mut result);
        }
        self.tracker
            .record(&request.sport, invocation.latency_ms, &result);

        sm.advance(RequestState::Done, None)?;
        debug!(kind = %kind, transitions = %sm.summary(), "pipeline finished");
        Ok(result)
    }

    /// Run the five sub-analyses concurrently and combine them.
    pub async fn analyze_comprehensive(
        &self,
        request: &AnalysisRequest,
    ) -> Result<ComprehensiveAnalysis, AnalysisError> {
        info!(
            subject = %request.subject_ref,
            sport = %request.sport_key(),
            "comprehensive analysis started"
        );
        let request = Arc::new(request.clone());
        let mut join_set: JoinSet<(SubAnalysis, Result<ContentAnalysisResult, AnalysisError>)> =
            JoinSet::new();

        for analysis in SubAnalysis::ALL {
            let analyzer = self.clone();
            let request = request.clone();
            join_set.spawn(async move {
                let kind = AnalysisKind::for_sub_analysis(analysis);
                (analysis, analyzer.run_pipeline(kind, &request).await)
            });
        }

        let mut per_sub_analysis = BTreeMap::new();
        let mut configuration_error = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((analysis, Ok(result))) if result.performance.is_insufficient() => {
                    warn!(analysis = %analysis, "sub-analysis assessed no axis");
                }
                Ok((analysis, Ok(result))) => {
                    debug!(analysis = %analysis, fallback = result.is_fallback(), "sub-analysis done");
                    per_sub_analysis.insert(analysis, result);
                }
                Ok((_, Err(err))) if err.is_configuration() => {
                    configuration_error.get_or_insert(err);
                }
                Ok((analysis, Err(err))) => {
                    warn!(analysis = %analysis, error = %err, "sub-analysis failed");
                }
                Err(err) => warn!(error = %err, "sub-analysis task failed"),
            }
        }
        if let Some(err) = configuration_error {
            return Err(err);
        }

        for analysis in SubAnalysis::ALL {
            per_sub_analysis.entry(analysis).or_insert_with(|| {
                warn!(analysis = %analysis, "substituting fallback sub-analysis");
                let mut result = extract_for(&request, FALLBACK_RESPONSE);
                result.source = ResultSource::Fallback;
                enrich::derived_suggestions(&mut result);
                enrich::auto_categories(&mut result);
                result
            });
        }

        let scores: BTreeMap<SubAnalysis, f64> = per_sub_analysis
            .iter()
            .map(|(analysis, result)| (*analysis, category_score(*analysis, result)))
            .collect();
        let score = composite(&scores, &self.config.weights);

        info!(
            subject = %request.subject_ref,
            overall_score = score.overall,
            "comprehensive analysis finished"
        );
        Ok(ComprehensiveAnalysis {
            overall_score: score.overall,
            categories: score.categories,
            per_sub_analysis,
        })
    }

    /// Analyse many requests, at most `bulk_concurrency` at a time.
    ///
    /// Results come back in request order; a failure stays with its entry.
    pub async fn bulk_analyze(&self, requests: Vec<AnalysisRequest>) -> Vec<BulkItem> {
        let sem = Arc::new(Semaphore::new(self.config.bulk_concurrency));
        let mut join_set: JoinSet<(usize, BulkItem)> = JoinSet::new();
        let subjects: Vec<String> = requests.iter().map(|r| r.subject_ref.clone()).collect();

        for (index, request) in requests.into_iter().enumerate() {
            let sem = sem.clone();
            let analyzer = self.clone();
            join_set.spawn(async move {
                let _permit = sem.acquire().await;
                let outcome = analyzer.analyze(&request).await;
                let item = match outcome {
                    Ok(result) => BulkItem {
                        subject_ref: request.subject_ref,
                        result: Some(result),
                        error: None,
                    },
                    Err(err) => BulkItem {
                        subject_ref: request.subject_ref,
                        result: None,
                        error: Some(err.to_string()),
                    },
                };
                (index, item)
            });
        }

        let mut slots: Vec<Option<BulkItem>> = subjects.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, item)) => slots[index] = Some(item),
                Err(err) => warn!(error = %err, "bulk analysis task failed"),
            }
        }

        slots
            .into_iter()
            .zip(subjects)
            .map(|(slot, subject_ref)| {
                slot.unwrap_or_else(|| BulkItem {
                    subject_ref,
                    result: None,
                    error: Some("analysis task failed".to_string()),
                })
            })
            .collect()
    }

    /// Vocabulary tag suggestions. Never calls the backend.
    pub fn suggest_tags(&self, query: &str, sport: Option<&str>) -> Vec<ContentTag> {
        vocabulary::suggest_tags(query, sport)
    }

    /// One sport's record, or every sport's when `sport` is `None`.
    pub fn get_performance(&self, sport: Option<&str>) -> PerformanceReport {
        match sport {
            Some(sport) => PerformanceReport::Sport(self.tracker.performance(sport)),
            None => PerformanceReport::All(self.tracker.all_performance()),
        }
    }

    pub fn history(&self, sport: &str) -> Vec<LearningEntry> {
        self.tracker.history(sport)
    }

    /// Attach feedback to the newest learning entry of `sport`.
    pub fn record_feedback(&self, sport: &str, feedback: &str) -> bool {
        self.tracker.attach_feedback(sport, feedback)
    }

    pub fn optimize(&self) -> Vec<SportTrend> {
        self.tracker.optimize()
    }

    pub async fn health_check(&self) -> BackendHealth {
        self.adapter.health_check().await
    }
}
