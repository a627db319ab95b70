//! Post-extraction enrichment.
//!
//! Runs after the extractor, in a fixed order:
//!
//! ```text
//! media_tags ─► subject_hints ─► backfill ─► derived_suggestions ─► auto_categories
//! └──────────── skipped for fallback results ──┘
//! ```
//!
//! The first three steps only add information that did not come from the
//! backend, so they are skipped when the backend was not reached. The last two
//! are pure functions of the result and leave the canned fallback unchanged.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::types::{
    AnalysisRequest, ContentAnalysisResult, ContentQuality, ContentTag, MediaKind, Setting,
    TagCategory, TagMetadata,
};
use crate::vocabulary;

/// Axis and skill scores below this earn a targeted suggestion.
pub const WEAKNESS_THRESHOLD: f64 = 6.0;
/// Skills need more than this confidence to become an auto category.
pub const SKILL_CATEGORY_CONFIDENCE: f64 = 0.7;

static DATE_IN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})-(\d{2})-(\d{2})|(\d{2})-(\d{2})-(\d{4})").unwrap()
});

// `vs` must not follow a letter; `_` and `-` count as separators, as in `game_vs_tigers`.
static OPPONENT_IN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^a-z])vs\.?[\s_-]*([a-z0-9]+)").unwrap());

/// Apply every enrichment step to `result`.
///
/// `min_tags` is the tag count below which the sport vocabulary is used to
/// backfill.
pub fn enrich(request: &AnalysisRequest, result: &mut ContentAnalysisResult, min_tags: usize) {
    if !result.is_fallback() {
        media_tags(request, result);
        subject_hints(&request.subject_ref, result);
        backfill(request, result, min_tags);
    }
    derived_suggestions(result);
    auto_categories(result);
}

/// Tags implied by the media kind alone.
pub fn media_tags(request: &AnalysisRequest, result: &mut ContentAnalysisResult) {
    match request.media_kind {
        MediaKind::Video => {}
        MediaKind::Image => {
            result.tags.push(
                ContentTag::new(
                    "visual-analysis",
                    "Visual Analysis",
                    TagCategory::Technique,
                    0.9,
                    0.8,
                )
                .with_metadata(TagMetadata {
                    quality: Some(ContentQuality::Good),
                    ..Default::default()
                }),
            );
            if let Some(position) = request.position_hint.as_deref().map(str::trim) {
                if !position.is_empty() {
                    result.tags.push(
                        ContentTag::new(
                            format!("position-{}", ContentTag::slug(position)),
                            position,
                            TagCategory::Sport,
                            0.9,
                            0.9,
                        )
                        .with_metadata(TagMetadata {
                            position: Some(position.to_string()),
                            ..Default::default()
                        }),
                    );
                }
            }
        }
        MediaKind::Document => {
            let name = request.subject_ref.to_lowercase();
            if name.contains("stats") {
                result.tags.push(ContentTag::new(
                    "statistics",
                    "Statistics",
                    TagCategory::Performance,
                    0.95,
                    0.9,
                ));
            }
            if name.contains("report") {
                result.tags.push(ContentTag::new(
                    "report",
                    "Performance Report",
                    TagCategory::Performance,
                    0.95,
                    0.9,
                ));
            }
            if name.contains("plan") || name.contains("training") {
                result.tags.push(ContentTag::new(
                    "training-plan",
                    "Training Plan",
                    TagCategory::Strategy,
                    0.9,
                    0.9,
                ));
            }
        }
    }
}

/// Hints read from the subject reference (usually a file name).
///
/// The setting is only filled in when the response left it unknown.
pub fn subject_hints(subject_ref: &str, result: &mut ContentAnalysisResult) {
    let name = subject_ref.to_lowercase();

    if let Some(date) = DATE_IN_NAME.find(&name) {
        result.tags.push(
            ContentTag::new(
                "dated-content",
                "Dated Content",
                TagCategory::Event,
                0.9,
                0.7,
            )
            .with_metadata(TagMetadata {
                timestamp: Some(date.as_str().to_string()),
                ..Default::default()
            }),
        );
    }

    if !result.context.setting.is_known() {
        let hinted = [Setting::Game, Setting::Practice, Setting::Training]
            .into_iter()
            .find(|s| name.contains(&s.to_string()));
        if let Some(setting) = hinted {
            result.context.setting = setting;
        }
    }

    if let Some(caps) = OPPONENT_IN_NAME.captures(&name) {
        result.context.opponents = caps.get(1).map(|m| m.as_str().to_string());
    }
}

/// Append the sport vocabulary when fewer than `min_tags` tags were extracted.
pub fn backfill(request: &AnalysisRequest, result: &mut ContentAnalysisResult, min_tags: usize) {
    if result.tags.len() >= min_tags {
        return;
    }
    let extra = vocabulary::tags_for(&request.sport);
    debug!(
        sport = %request.sport_key(),
        extracted = result.tags.len(),
        added = extra.len(),
        "backfilling thin tag set from vocabulary"
    );
    result.tags.extend(extra);
}

/// Suggestions derived from weak axes, the setting and weak skills.
///
/// Unassessed axes (score 0) are not treated as weak. Suggestions already
/// present are not repeated.
pub fn derived_suggestions(result: &mut ContentAnalysisResult) {
    let perf = result.performance;
    let mut derived: Vec<String> = [
        (perf.technical(), "Focus on technical skill development"),
        (perf.tactical(), "Work on game strategy and decision-making"),
        (perf.physical(), "Improve physical conditioning and strength"),
        (perf.mental(), "Develop mental toughness and focus"),
    ]
    .into_iter()
    .filter(|(score, _)| *score > 0.0 && *score < WEAKNESS_THRESHOLD)
    .map(|(_, text)| text.to_string())
    .collect();

    match result.context.setting {
        Setting::Practice => {
            derived.push("Consider recording game footage for comparison".into())
        }
        Setting::Game => {
            derived.push("Analyze practice footage to identify improvement areas".into())
        }
        _ => {}
    }

    let mut weak_skills: Vec<_> = result
        .skills
        .iter()
        .filter(|s| s.level < WEAKNESS_THRESHOLD)
        .collect();
    weak_skills.sort_by(|a, b| a.level.total_cmp(&b.level));
    derived.extend(
        weak_skills
            .iter()
            .take(2)
            .map(|s| format!("Improve {} through targeted practice", s.name)),
    );

    for suggestion in derived {
        if !result.suggestions.contains(&suggestion) {
            result.suggestions.push(suggestion);
        }
    }
}

/// Performance band label for an overall score.
pub fn performance_band(overall: f64) -> &'static str {
    if overall >= 8.0 {
        "High Performance"
    } else if overall >= 6.0 {
        "Good Performance"
    } else if overall >= 4.0 {
        "Developing Performance"
    } else {
        "Needs Improvement"
    }
}

/// Recompute `auto_categories` from the rest of the result.
pub fn auto_categories(result: &mut ContentAnalysisResult) {
    let mut categories = std::collections::BTreeSet::new();

    let sport = result.primary_sport.trim();
    if !sport.is_empty() && !sport.eq_ignore_ascii_case("unknown") {
        categories.insert(sport.to_lowercase());
    }

    categories.insert(performance_band(result.performance.overall()).to_string());

    if result.context.setting.is_known() {
        categories.insert(capitalize(&result.context.setting.to_string()));
    }

    let mut confident: Vec<_> = result
        .skills
        .iter()
        .filter(|s| s.confidence > SKILL_CATEGORY_CONFIDENCE)
        .collect();
    confident.sort_by(|a, b| b.level.total_cmp(&a.level));
    categories.extend(confident.iter().take(3).map(|s| s.name.clone()));

    result.auto_categories = categories;
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
