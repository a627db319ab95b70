//! Prompt templates for each analysis kind.
//!
//! Every template ends with the same output contract so the extractor can
//! parse the answer line by line:
//!
//! ```text
//! Primary Sport: <sport>
//! Secondary Sports: <sport>, <sport>
//! Setting: practice|game|training|competition|scrimmage|unknown
//! PERFORMANCE SCORES:
//! Technical: n/10   (also Overall, Tactical, Physical, Mental)
//! TAGS:
//! - name, category, confidence
//! SKILLS:
//! - name: Level n, Confidence c
//! SUGGESTIONS:
//! - free text
//! DETECTED OBJECTS:
//! - free text
//! ```
//!
//! Compilation is a pure function of its inputs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregate::SubAnalysis;
use crate::types::{AnalysisRequest, MediaKind};

pub const HEADER_SCORES: &str = "PERFORMANCE SCORES";
pub const HEADER_TAGS: &str = "TAGS";
pub const HEADER_SKILLS: &str = "SKILLS";
pub const HEADER_SUGGESTIONS: &str = "SUGGESTIONS";
pub const HEADER_OBJECTS: &str = "DETECTED OBJECTS";

/// Constant response substituted when the backend cannot answer.
///
/// Mid-scale on every axis, two generic tags, two generic skills and an
/// explicit manual-review suggestion. It follows the output contract, so it
/// always extracts cleanly.
pub const FALLBACK_RESPONSE: &str = "\
PERFORMANCE SCORES:
Overall: 6/10
Technical: 6/10
Tactical: 6/10
Physical: 6/10
Mental: 6/10

TAGS:
- Athletic Performance, performance, 0.6
- Uploaded Content, event, 0.5

SKILLS:
- General Athleticism: Level 6, Confidence 0.5
- Fundamentals: Level 6, Confidence 0.5

SUGGESTIONS:
- Automated analysis unavailable; manual review recommended
";

/// The kind of analysis a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Movement and body-mechanics description.
    Movement,
    /// Technique against the sport's own fundamentals.
    SportTechnique,
    /// Comparison against the athlete's stated level.
    Benchmark,
    /// Injury-risk screening. Scores are risk levels, higher is worse.
    InjuryRisk,
    /// Actionable coaching feedback.
    Coaching,
    /// General content tagging for uploads.
    ContentTagging,
}

impl AnalysisKind {
    /// The prompt kind that feeds a comprehensive sub-analysis.
    pub fn for_sub_analysis(analysis: SubAnalysis) -> Self {
        match analysis {
            SubAnalysis::ComputerVision => Self::Movement,
            SubAnalysis::SportSpecific => Self::SportTechnique,
            SubAnalysis::Benchmarking => Self::Benchmark,
            SubAnalysis::InjuryRisk => Self::InjuryRisk,
            SubAnalysis::Coaching => Self::Coaching,
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movement => write!(f, "movement"),
            Self::SportTechnique => write!(f, "sport_technique"),
            Self::Benchmark => write!(f, "benchmark"),
            Self::InjuryRisk => write!(f, "injury_risk"),
            Self::Coaching => write!(f, "coaching"),
            Self::ContentTagging => write!(f, "content_tagging"),
        }
    }
}

/// Technique focus areas for sports with a dedicated template.
const SPORT_FOCUS: &[(&str, &[&str])] = &[
    (
        "football",
        &[
            "stance and first step",
            "route running or blocking leverage",
            "ball security",
            "pre-snap reads",
        ],
    ),
    (
        "basketball",
        &[
            "shooting form and release",
            "ball handling under pressure",
            "defensive stance and closeouts",
            "court vision and spacing",
        ],
    ),
    (
        "soccer",
        &[
            "first touch and ball control",
            "passing weight and accuracy",
            "body shape when receiving",
            "off-ball movement",
        ],
    ),
    (
        "baseball",
        &[
            "swing path and bat speed",
            "pitching mechanics and arm slot",
            "fielding footwork",
            "base running reads",
        ],
    ),
    (
        "tennis",
        &[
            "serve toss and kinetic chain",
            "groundstroke preparation",
            "footwork and recovery",
            "shot selection",
        ],
    ),
    (
        "golf",
        &[
            "setup and alignment",
            "swing plane and tempo",
            "weight transfer",
            "short game touch",
        ],
    ),
];

/// Focus areas for `sport`, by exact lowercase match.
fn sport_focus(sport: &str) -> Option<&'static [&'static str]> {
    let key = sport.trim().to_lowercase();
    SPORT_FOCUS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, focus)| *focus)
}

fn or_unknown(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("unknown")
}

/// Build the prompt for `kind` and `request`.
pub fn compile(kind: AnalysisKind, request: &AnalysisRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("# {}\n\n", title(kind, request.media_kind)));
    prompt.push_str("## Subject\n\n");
    prompt.push_str(&format!("File: {}\n", request.subject_ref));
    prompt.push_str(&format!("Media: {}\n", request.media_kind));
    prompt.push_str(&format!("Sport: {}\n", or_unknown(Some(request.sport.as_str()))));
    prompt.push_str(&format!(
        "Position: {}\n",
        or_unknown(request.position_hint.as_deref())
    ));
    prompt.push_str(&format!(
        "Level: {}\n",
        or_unknown(request.skill_level_hint.as_deref())
    ));
    prompt.push_str(&format!(
        "Description: {}\n\n",
        request.free_text_context.as_deref().unwrap_or("none")
    ));

    prompt.push_str("## Task\n\n");
    for (i, item) in task_items(kind, request).iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, item));
    }
    prompt.push('\n');

    prompt.push_str(&output_contract(kind));
    prompt
}

fn title(kind: AnalysisKind, media: MediaKind) -> String {
    match kind {
        AnalysisKind::Movement => "Movement Analysis".to_string(),
        AnalysisKind::SportTechnique => "Sport-Specific Technique Analysis".to_string(),
        AnalysisKind::Benchmark => "Benchmark Against Level".to_string(),
        AnalysisKind::InjuryRisk => "Injury Risk Screening".to_string(),
        AnalysisKind::Coaching => "Coaching Feedback".to_string(),
        AnalysisKind::ContentTagging => format!("Sports {} Tagging", capitalize(&media.to_string())),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn task_items(kind: AnalysisKind, request: &AnalysisRequest) -> Vec<String> {
    match kind {
        AnalysisKind::Movement => vec![
            "Describe body positioning and balance throughout the clip".into(),
            "Assess joint alignment and range of motion".into(),
            "Rate movement efficiency, speed and agility".into(),
            "Note asymmetries or compensations".into(),
        ],
        AnalysisKind::SportTechnique => match sport_focus(&request.sport) {
            Some(focus) => focus
                .iter()
                .map(|area| format!("Evaluate {area}"))
                .chain(std::iter::once(format!(
                    "Compare execution with sound {} fundamentals",
                    request.sport.trim().to_lowercase()
                )))
                .collect(),
            None => vec![
                "Identify the primary skills being performed".into(),
                "Evaluate execution against general athletic fundamentals".into(),
                "Highlight the most and least consistent techniques".into(),
            ],
        },
        AnalysisKind::Benchmark => vec![
            format!(
                "Compare this performance with a typical {} athlete",
                or_unknown(request.skill_level_hint.as_deref())
            ),
            "State which skills are above and below that level".into(),
            "Estimate readiness for the next level of competition".into(),
        ],
        AnalysisKind::InjuryRisk => vec![
            "Screen landing, cutting and deceleration mechanics".into(),
            "Flag fatigue indicators and compensation patterns".into(),
            "Score each axis as a RISK level from 1 (minimal risk) to 10 (severe risk); write 0 only for an axis you could not assess".into(),
        ],
        AnalysisKind::Coaching => vec![
            "Name the three most impactful improvements".into(),
            "Give one concrete drill for each improvement".into(),
            "Note what the athlete should keep doing".into(),
        ],
        AnalysisKind::ContentTagging => match request.media_kind {
            MediaKind::Video => vec![
                "Primary and secondary sports".into(),
                "Skills demonstrated".into(),
                "Performance quality on each axis".into(),
                "Context (practice, game, training)".into(),
                "Equipment and objects visible".into(),
            ],
            MediaKind::Image => vec![
                "Sport being played".into(),
                "Action or skill being performed".into(),
                "Equipment visible".into(),
                "Technique quality".into(),
                "Context (game, practice, training)".into(),
            ],
            MediaKind::Document => vec![
                "Document type (stats, report, plan)".into(),
                "Sports covered".into(),
                "Skills or techniques mentioned".into(),
                "Performance data and key insights".into(),
            ],
        },
    }
}

fn output_contract(kind: AnalysisKind) -> String {
    let scale = if kind == AnalysisKind::InjuryRisk {
        "risk, 1-10"
    } else {
        "0-10"
    };

    let mut out = String::new();
    out.push_str("## Output Format\n\n");
    out.push_str("Answer using exactly these lines and section headers:\n\n");
    out.push_str("Primary Sport: <sport>\n");
    out.push_str("Secondary Sports: <sport>, <sport>\n");
    out.push_str("Setting: <practice|game|training|competition|scrimmage|unknown>\n\n");
    out.push_str(&format!("{HEADER_SCORES}:\n"));
    for axis in ["Overall", "Technical", "Tactical", "Physical", "Mental"] {
        out.push_str(&format!("{axis}: <{scale}>/10\n"));
    }
    out.push('\n');
    out.push_str(&format!("{HEADER_TAGS}:\n"));
    out.push_str("- <name>, <sport|skill|performance|event|location|equipment|technique|strategy>, <confidence 0-1>\n\n");
    out.push_str(&format!("{HEADER_SKILLS}:\n"));
    out.push_str("- <skill name>: Level <0-10>, Confidence <0-1>\n\n");
    out.push_str(&format!("{HEADER_SUGGESTIONS}:\n"));
    out.push_str("- <one actionable suggestion per line>\n\n");
    out.push_str(&format!("{HEADER_OBJECTS}:\n"));
    out.push_str("- <object>\n");
    out
}
