//! Result model shared by every stage of the analysis pipeline.
//!
//! All numeric scores are clamped on construction so a value that made it
//! into one of these types is already inside its declared range.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound of every per-axis performance score.
pub const MAX_AXIS_SCORE: f64 = 10.0;

/// Clamp `value` into `[0, 10]`, mapping NaN to 0.
pub fn clamp_axis(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_AXIS_SCORE)
    }
}

/// Clamp `value` into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Normalize a sport name into the lowercase key that partitions
/// vocabulary, prompts and performance records.
pub fn sport_key(sport: &str) -> String {
    sport.trim().to_lowercase()
}

/// Kind of media the analysis request refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Image,
    Document,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Image => write!(f, "image"),
            Self::Document => write!(f, "document"),
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "image" => Ok(Self::Image),
            "document" => Ok(Self::Document),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// A single analysis call. Created per request and never persisted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Opaque reference to the analysed content (usually a file name).
    pub subject_ref: String,
    pub media_kind: MediaKind,
    pub sport: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_level_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_text_context: Option<String>,
}

impl AnalysisRequest {
    pub fn new(subject_ref: impl Into<String>, media_kind: MediaKind, sport: impl Into<String>) -> Self {
        Self {
            subject_ref: subject_ref.into(),
            media_kind,
            sport: sport.into(),
            position_hint: None,
            skill_level_hint: None,
            free_text_context: None,
        }
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position_hint = Some(position.into());
        self
    }

    pub fn with_skill_level(mut self, level: impl Into<String>) -> Self {
        self.skill_level_hint = Some(level.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.free_text_context = Some(context.into());
        self
    }

    /// Lowercase sport key for this request.
    pub fn sport_key(&self) -> String {
        sport_key(&self.sport)
    }
}

/// Category a content tag belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    Sport,
    #[default]
    Skill,
    Performance,
    Event,
    Location,
    Equipment,
    Technique,
    Strategy,
}

impl TagCategory {
    /// Parse a category name, case-insensitively. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "sport" => Some(Self::Sport),
            "skill" => Some(Self::Skill),
            "performance" => Some(Self::Performance),
            "event" => Some(Self::Event),
            "location" => Some(Self::Location),
            "equipment" => Some(Self::Equipment),
            "technique" => Some(Self::Technique),
            "strategy" => Some(Self::Strategy),
            _ => None,
        }
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sport => "sport",
            Self::Skill => "skill",
            Self::Performance => "performance",
            Self::Event => "event",
            Self::Location => "location",
            Self::Equipment => "equipment",
            Self::Technique => "technique",
            Self::Strategy => "strategy",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillTier {
    Beginner,
    Intermediate,
    Advanced,
    Elite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

/// Optional metadata attached to a tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<SkillTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<ContentQuality>,
}

/// A descriptive tag attached to analysed content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTag {
    pub id: String,
    pub name: String,
    pub category: TagCategory,
    pub confidence: f64,
    pub relevance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TagMetadata>,
}

impl ContentTag {
    /// Build a tag with clamped confidence and relevance.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: TagCategory,
        confidence: f64,
        relevance: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            confidence: clamp_unit(confidence),
            relevance: clamp_unit(relevance),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: TagMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Slug used for ids derived from a free-form name.
    pub fn slug(name: &str) -> String {
        name.split_whitespace()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// A named skill with a 0–10 level and a 0–1 confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillAssessment {
    pub name: String,
    pub level: f64,
    pub confidence: f64,
}

impl SkillAssessment {
    pub fn new(name: impl Into<String>, level: f64, confidence: f64) -> Self {
        Self {
            name: name.into(),
            level: clamp_axis(level),
            confidence: clamp_unit(confidence),
        }
    }
}

/// The four independently assessed performance axes.
///
/// This is the only way to build a [`PerformanceScore`]; `overall` is always
/// derived from these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisScores {
    #[serde(default)]
    pub technical: f64,
    #[serde(default)]
    pub tactical: f64,
    #[serde(default)]
    pub physical: f64,
    #[serde(default)]
    pub mental: f64,
}

/// Per-result performance scores, each in `[0, 10]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "AxisScores")]
pub struct PerformanceScore {
    overall: f64,
    technical: f64,
    tactical: f64,
    physical: f64,
    mental: f64,
}

impl From<AxisScores> for PerformanceScore {
    fn from(axes: AxisScores) -> Self {
        let technical = clamp_axis(axes.technical);
        let tactical = clamp_axis(axes.tactical);
        let physical = clamp_axis(axes.physical);
        let mental = clamp_axis(axes.mental);
        Self {
            overall: crate::aggregate::axis_mean(&[technical, tactical, physical, mental]),
            technical,
            tactical,
            physical,
            mental,
        }
    }
}

impl PerformanceScore {
    pub fn overall(&self) -> f64 {
        self.overall
    }

    pub fn technical(&self) -> f64 {
        self.technical
    }

    pub fn tactical(&self) -> f64 {
        self.tactical
    }

    pub fn physical(&self) -> f64 {
        self.physical
    }

    pub fn mental(&self) -> f64 {
        self.mental
    }

    /// All five fields, overall first.
    pub fn fields(&self) -> [f64; 5] {
        [
            self.overall,
            self.technical,
            self.tactical,
            self.physical,
            self.mental,
        ]
    }

    /// Number of fields that carry a nonzero score.
    pub fn nonzero_fields(&self) -> usize {
        self.fields().iter().filter(|v| **v > 0.0).count()
    }

    /// Whether no axis was assessed at all.
    pub fn is_insufficient(&self) -> bool {
        self.overall == 0.0
    }
}

/// Where the analysed content was recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Setting {
    Practice,
    Game,
    Training,
    Competition,
    Scrimmage,
    #[default]
    Unknown,
}

impl Setting {
    /// Parse a setting name. Anything outside the closed set yields `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "practice" => Some(Self::Practice),
            "game" => Some(Self::Game),
            "training" => Some(Self::Training),
            "competition" => Some(Self::Competition),
            "scrimmage" => Some(Self::Scrimmage),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Practice => "practice",
            Self::Game => "game",
            Self::Training => "training",
            Self::Competition => "competition",
            Self::Scrimmage => "scrimmage",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub setting: Setting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponents: Option<String>,
}

/// Which path produced the text a result was extracted from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    #[default]
    Backend,
    Fallback,
}

/// Fully typed outcome of a single analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysisResult {
    pub media_kind: MediaKind,
    pub primary_sport: String,
    #[serde(default)]
    pub secondary_sports: Vec<String>,
    /// Ordered, possibly duplicated. Dedup belongs to the caller.
    #[serde(default)]
    pub tags: Vec<ContentTag>,
    #[serde(default)]
    pub skills: Vec<SkillAssessment>,
    #[serde(default)]
    pub performance: PerformanceScore,
    #[serde(default)]
    pub context: AnalysisContext,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub auto_categories: BTreeSet<String>,
    #[serde(default)]
    pub detected_objects: Vec<String>,
    #[serde(default)]
    pub source: ResultSource,
}

impl ContentAnalysisResult {
    /// Empty result for a sport and media kind; the zero value of extraction.
    pub fn empty(media_kind: MediaKind, primary_sport: impl Into<String>) -> Self {
        Self {
            media_kind,
            primary_sport: primary_sport.into(),
            secondary_sports: Vec::new(),
            tags: Vec::new(),
            skills: Vec::new(),
            performance: PerformanceScore::default(),
            context: AnalysisContext::default(),
            suggestions: Vec::new(),
            auto_categories: BTreeSet::new(),
            detected_objects: Vec::new(),
            source: ResultSource::Backend,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ResultSource::Fallback
    }

    /// Short human-readable summary for learning history entries.
    pub fn summary(&self) -> String {
        format!(
            "{} {}: overall {:.1}, {} tags, {} skills, {} suggestions",
            self.primary_sport,
            self.media_kind,
            self.performance.overall(),
            self.tags.len(),
            self.skills.len(),
            self.suggestions.len()
        )
    }
}

/// Rolling accuracy/latency statistics for one sport key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformanceRecord {
    pub sport_key: String,
    pub running_accuracy: f64,
    pub running_latency_ms: f64,
    pub sample_count: u64,
}

impl ModelPerformanceRecord {
    pub fn new(sport_key: impl Into<String>) -> Self {
        Self {
            sport_key: sport_key.into(),
            running_accuracy: 0.0,
            running_latency_ms: 0.0,
            sample_count: 0,
        }
    }
}

/// One entry of the bounded per-sport learning history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningEntry {
    pub timestamp: DateTime<Utc>,
    pub content_summary: String,
    pub accuracy_estimate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
}
