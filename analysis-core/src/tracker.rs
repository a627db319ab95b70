//! Per-sport model performance and learning history.
//!
//! The only shared mutable state of the pipeline. Every sport key owns one
//! [`ModelPerformanceRecord`] and one bounded ring of [`LearningEntry`]s; both
//! are updated under a single lock so concurrent same-sport analyses cannot
//! lose updates.
//!
//! "Accuracy" here is structural completeness of a result (how many of the
//! expected fields were extracted), not factual correctness.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{sport_key, ContentAnalysisResult, LearningEntry, ModelPerformanceRecord};

/// Capacity of each sport's learning ring.
pub const LEARNING_HISTORY_CAP: usize = 100;
/// Number of most recent entries compared against the all-time mean.
pub const RECENT_WINDOW: usize = 10;
/// Relative improvement over the all-time mean that counts as "improving".
pub const IMPROVEMENT_THRESHOLD: f64 = 0.10;

/// Structural completeness of `result` on a 0–100 scale.
///
/// Point budget:
///
/// | Part        | Points | Rule                                  |
/// |-------------|--------|---------------------------------------|
/// | performance | 50     | 10 per nonzero field (5 fields)       |
/// | tags        | 20     | ≥5 → 20, ≥3 → 15, ≥1 → 10             |
/// | skills      | 15     | ≥3 → 15, ≥2 → 10, ≥1 → 5              |
/// | suggestions | 15     | ≥3 → 15, ≥2 → 10, ≥1 → 5              |
pub fn accuracy_estimate(result: &ContentAnalysisResult) -> f64 {
    const MAX_POINTS: f64 = 100.0;

    let performance = 10.0 * result.performance.nonzero_fields() as f64;
    let tags = match result.tags.len() {
        n if n >= 5 => 20.0,
        n if n >= 3 => 15.0,
        n if n >= 1 => 10.0,
        _ => 0.0,
    };
    let skills = tiered(result.skills.len());
    let suggestions = tiered(result.suggestions.len());

    (performance + tags + skills + suggestions) / MAX_POINTS * 100.0
}

fn tiered(count: usize) -> f64 {
    match count {
        n if n >= 3 => 15.0,
        2 => 10.0,
        1 => 5.0,
        _ => 0.0,
    }
}

/// Trend diagnostic for one sport, produced by [`PerformanceTracker::optimize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportTrend {
    pub sport_key: String,
    pub entries: usize,
    pub recent_mean: f64,
    pub all_time_mean: f64,
    pub improving: bool,
}

#[derive(Debug)]
struct SportLedger {
    record: ModelPerformanceRecord,
    history: VecDeque<LearningEntry>,
}

impl SportLedger {
    fn new(key: &str) -> Self {
        Self {
            record: ModelPerformanceRecord::new(key),
            history: VecDeque::with_capacity(LEARNING_HISTORY_CAP),
        }
    }

    fn apply(&mut self, latency_ms: f64, accuracy: f64, summary: String) {
        let n = self.record.sample_count as f64;
        self.record.running_accuracy = (self.record.running_accuracy * n + accuracy) / (n + 1.0);
        self.record.running_latency_ms =
            (self.record.running_latency_ms * n + latency_ms) / (n + 1.0);
        self.record.sample_count += 1;

        if self.history.len() == LEARNING_HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(LearningEntry {
            timestamp: Utc::now(),
            content_summary: summary,
            accuracy_estimate: accuracy,
            user_feedback: None,
        });
    }

    fn trend(&self) -> Option<SportTrend> {
        if self.history.is_empty() {
            return None;
        }
        let all_time_mean = mean_accuracy(self.history.iter());
        let skip = self.history.len().saturating_sub(RECENT_WINDOW);
        let recent_mean = mean_accuracy(self.history.iter().skip(skip));

        Some(SportTrend {
            sport_key: self.record.sport_key.clone(),
            entries: self.history.len(),
            recent_mean,
            all_time_mean,
            improving: recent_mean > all_time_mean * (1.0 + IMPROVEMENT_THRESHOLD),
        })
    }
}

fn mean_accuracy<'a>(entries: impl Iterator<Item = &'a LearningEntry>) -> f64 {
    let (sum, count) = entries.fold((0.0, 0usize), |(s, c), e| (s + e.accuracy_estimate, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Process-lifetime accuracy/latency tracker, safe to share across tasks.
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    ledgers: Mutex<HashMap<String, SportLedger>>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledgers(&self) -> MutexGuard<'_, HashMap<String, SportLedger>> {
        // Ledger updates are a fixed sequence of field writes; a panic elsewhere
        // cannot leave them half-applied.
        match self.ledgers.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!(error = %e, "performance tracker lock poisoned, recovering");
                e.into_inner()
            }
        }
    }

    /// Record one analysis outcome: accuracy is estimated from `result`.
    pub fn record(
        &self,
        sport: &str,
        latency_ms: u64,
        result: &ContentAnalysisResult,
    ) -> ModelPerformanceRecord {
        let accuracy = accuracy_estimate(result);
        self.record_sample(sport, latency_ms as f64, accuracy, result.summary())
    }

    /// Record a raw (latency, accuracy) sample.
    ///
    /// The running averages, the sample count and the learning ring are
    /// updated in one critical section.
    pub fn record_sample(
        &self,
        sport: &str,
        latency_ms: f64,
        accuracy: f64,
        summary: impl Into<String>,
    ) -> ModelPerformanceRecord {
        let key = sport_key(sport);
        let accuracy = if accuracy.is_nan() { 0.0 } else { accuracy.clamp(0.0, 100.0) };
        let latency_ms = if latency_ms.is_nan() { 0.0 } else { latency_ms.max(0.0) };

        let mut ledgers = self.ledgers();
        let ledger = ledgers
            .entry(key.clone())
            .or_insert_with(|| SportLedger::new(&key));
        ledger.apply(latency_ms, accuracy, summary.into());

        debug!(
            sport = %key,
            accuracy,
            latency_ms,
            samples = ledger.record.sample_count,
            "recorded model performance sample"
        );
        ledger.record.clone()
    }

    /// Attach user feedback to the newest learning entry of `sport`.
    ///
    /// Returns `false` when the sport has no history yet.
    pub fn attach_feedback(&self, sport: &str, feedback: impl Into<String>) -> bool {
        let key = sport_key(sport);
        let mut ledgers = self.ledgers();
        match ledgers.get_mut(&key).and_then(|l| l.history.back_mut()) {
            Some(entry) => {
                entry.user_feedback = Some(feedback.into());
                true
            }
            None => false,
        }
    }

    /// Current record for `sport`, if any sample was recorded.
    pub fn performance(&self, sport: &str) -> Option<ModelPerformanceRecord> {
        self.ledgers()
            .get(&sport_key(sport))
            .map(|l| l.record.clone())
    }

    /// Every sport's record, keyed by sport.
    pub fn all_performance(&self) -> BTreeMap<String, ModelPerformanceRecord> {
        self.ledgers()
            .iter()
            .map(|(k, l)| (k.clone(), l.record.clone()))
            .collect()
    }

    /// Learning history of `sport`, oldest first.
    pub fn history(&self, sport: &str) -> Vec<LearningEntry> {
        self.ledgers()
            .get(&sport_key(sport))
            .map(|l| l.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Compare each sport's recent accuracy against its all-time mean.
    ///
    /// Diagnostic only; nothing in scoring reads the outcome.
    pub fn optimize(&self) -> Vec<SportTrend> {
        let mut trends: Vec<SportTrend> = self
            .ledgers()
            .values()
            .filter_map(SportLedger::trend)
            .collect();
        trends.sort_by(|a, b| a.sport_key.cmp(&b.sport_key));

        for trend in trends.iter().filter(|t| t.improving) {
            info!(
                sport = %trend.sport_key,
                recent = trend.recent_mean,
                all_time = trend.all_time_mean,
                "model accuracy improving"
            );
        }
        trends
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract;
    use crate::prompts::FALLBACK_RESPONSE;
    use crate::types::{ContentTag, MediaKind, SkillAssessment, TagCategory};

    #[test]
    fn two_samples_average() {
        let tracker = PerformanceTracker::new();
        tracker.record_sample("Soccer", 100.0, 80.0, "first");
        let record = tracker.record_sample("soccer", 200.0, 60.0, "second");
        assert_eq!(record.running_accuracy, 70.0);
        assert_eq!(record.running_latency_ms, 150.0);
        assert_eq!(record.sample_count, 2);
        assert_eq!(record.sport_key, "soccer");
    }

    #[test]
    fn concurrent_records_lose_no_updates() {
        let tracker = PerformanceTracker::new();
        let samples: Vec<(f64, f64)> = (0..50)
            .map(|i| (100.0 + i as f64 * 3.0, (i * 7 % 100) as f64))
            .collect();

        std::thread::scope(|s| {
            for (latency, accuracy) in &samples {
                let tracker = &tracker;
                s.spawn(move || {
                    tracker.record_sample("soccer", *latency, *accuracy, "concurrent");
                });
            }
        });

        let record = tracker.performance("soccer").unwrap();
        assert_eq!(record.sample_count, 50);

        let expected_accuracy = samples.iter().map(|s| s.1).sum::<f64>() / 50.0;
        let expected_latency = samples.iter().map(|s| s.0).sum::<f64>() / 50.0;
        assert!((record.running_accuracy - expected_accuracy).abs() < 1e-6);
        assert!((record.running_latency_ms - expected_latency).abs() < 1e-6);
        assert_eq!(tracker.history("soccer").len(), 50);
    }

    #[test]
    fn history_is_bounded_fifo() {
        let tracker = PerformanceTracker::new();
        for i in 0..(LEARNING_HISTORY_CAP + 5) {
            tracker.record_sample("golf", 10.0, 50.0, format!("entry {i}"));
        }
        let history = tracker.history("golf");
        assert_eq!(history.len(), LEARNING_HISTORY_CAP);
        assert_eq!(history[0].content_summary, "entry 5");
        assert_eq!(
            history.last().unwrap().content_summary,
            format!("entry {}", LEARNING_HISTORY_CAP + 4)
        );
        assert_eq!(
            tracker.performance("golf").unwrap().sample_count,
            (LEARNING_HISTORY_CAP + 5) as u64
        );
    }

    #[test]
    fn fallback_completeness() {
        // 5 fields (50) + 2 tags (10) + 2 skills (10) + 1 suggestion (5)
        let result = extract(FALLBACK_RESPONSE);
        assert_eq!(accuracy_estimate(&result), 75.0);
    }

    #[test]
    fn empty_result_scores_zero() {
        let result = ContentAnalysisResult::empty(MediaKind::Video, "tennis");
        assert_eq!(accuracy_estimate(&result), 0.0);
    }

    #[test]
    fn complete_result_scores_hundred() {
        let mut result = extract("Technical: 7\nTactical: 7\nPhysical: 7\nMental: 7");
        for i in 0..5 {
            result.tags.push(ContentTag::new(
                format!("t{i}"),
                "tag",
                TagCategory::Skill,
                0.5,
                0.5,
            ));
        }
        for _ in 0..3 {
            result.skills.push(SkillAssessment::new("skill", 5.0, 0.5));
            result.suggestions.push("do more".into());
        }
        assert_eq!(accuracy_estimate(&result), 100.0);
    }

    #[test]
    fn optimize_flags_improving_sport() {
        let tracker = PerformanceTracker::new();
        for _ in 0..30 {
            tracker.record_sample("tennis", 10.0, 40.0, "early");
        }
        for _ in 0..10 {
            tracker.record_sample("tennis", 10.0, 90.0, "late");
        }
        for _ in 0..20 {
            tracker.record_sample("golf", 10.0, 60.0, "flat");
        }

        let trends = tracker.optimize();
        assert_eq!(trends.len(), 2);
        let golf = &trends[0];
        let tennis = &trends[1];
        assert_eq!(golf.sport_key, "golf");
        assert!(!golf.improving);
        assert!(tennis.improving);
        assert_eq!(tennis.recent_mean, 90.0);
        assert_eq!(tennis.all_time_mean, 52.5);
    }

    #[test]
    fn optimize_does_not_change_records() {
        let tracker = PerformanceTracker::new();
        tracker.record_sample("baseball", 120.0, 70.0, "only");
        let before = tracker.all_performance();
        tracker.optimize();
        assert_eq!(before, tracker.all_performance());
    }

    #[test]
    fn feedback_attaches_to_newest_entry() {
        let tracker = PerformanceTracker::new();
        assert!(!tracker.attach_feedback("football", "too generic"));
        tracker.record_sample("football", 10.0, 50.0, "a");
        tracker.record_sample("football", 10.0, 50.0, "b");
        assert!(tracker.attach_feedback("FOOTBALL", "too generic"));
        let history = tracker.history("football");
        assert_eq!(history[0].user_feedback, None);
        assert_eq!(history[1].user_feedback.as_deref(), Some("too generic"));
    }

    #[test]
    fn record_clamps_inputs() {
        let tracker = PerformanceTracker::new();
        let record = tracker.record_sample("golf", -50.0, 250.0, "odd");
        assert_eq!(record.running_latency_ms, 0.0);
        assert_eq!(record.running_accuracy, 100.0);
    }

    #[test]
    fn poisoned_lock_keeps_recording() {
        let tracker = PerformanceTracker::new();
        tracker.record_sample("hockey", 100.0, 40.0, "before");

        let poisoned = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _guard = tracker.ledgers.lock().unwrap();
                    panic!("worker died holding the ledger lock");
                })
                .join()
        });
        assert!(poisoned.is_err());
        assert!(tracker.ledgers.is_poisoned());

        let record = tracker.record_sample("hockey", 300.0, 60.0, "after");
        assert_eq!(record.sample_count, 2);
        assert_eq!(record.running_accuracy, 50.0);
        assert_eq!(tracker.history("hockey").len(), 2);
    }
}
