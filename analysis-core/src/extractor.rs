//! Tolerant line-oriented extraction of backend responses.
//!
//! The backend is untrusted and non-deterministic, so extraction is total:
//! every input, including empty or adversarial text, produces a complete
//! [`ContentAnalysisResult`]. Lines that do not fit the output contract in
//! [`crate::prompts`] are dropped, never reported as errors.
//!
//! Two independent passes run over each line:
//!
//! 1. **Sections.** A cursor changes only on an exact header line
//!    (`TAGS:`, `SKILLS:`, ...). Bullet lines append to the current
//!    section's list.
//! 2. **Fields.** Every line is matched against the field patterns
//!    (scores, `Setting:`, `Primary Sport:`). A later numeric value for a
//!    field overwrites an earlier one; values are never summed.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::prompts::{HEADER_OBJECTS, HEADER_SCORES, HEADER_SKILLS, HEADER_SUGGESTIONS, HEADER_TAGS};
use crate::types::{
    AnalysisRequest, AxisScores, ContentAnalysisResult, ContentTag, MediaKind, PerformanceScore,
    Setting, SkillAssessment, TagCategory,
};

/// Relevance given to tags read from a backend response.
pub const EXTRACTED_TAG_RELEVANCE: f64 = 0.7;

static SCORE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(overall|technical|tactical|physical|mental)(?:\s+score)?\s*:\s*(-?(?:\d+(?:\.\d+)?|\.\d+))",
    )
    .unwrap()
});
static SETTING_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^setting\s*:\s*([a-z]+)").unwrap());
static PRIMARY_SPORT_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^primary\s+sport\s*:\s*(.+)$").unwrap());
static SECONDARY_SPORTS_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^secondary\s+sports?\s*:\s*(.+)$").unwrap());
static SKILL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(.+?)\s*:\s*level\s*(-?(?:\d+(?:\.\d+)?|\.\d+))(?:\s*/\s*10)?\s*,\s*confidence\s*(-?(?:\d+(?:\.\d+)?|\.\d+))\s*$",
    )
    .unwrap()
});
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•]|\d+[.)])\s+").unwrap());

/// Section cursor of the line scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Scores,
    Tags,
    Skills,
    Suggestions,
    Objects,
}

/// Recognize an exact header line.
///
/// Leading `#`, surrounding `**` and a trailing colon are tolerated; the
/// remaining text must equal a known header, case-insensitively.
fn header(line: &str) -> Option<Section> {
    let name = line
        .trim()
        .trim_start_matches('#')
        .trim()
        .trim_matches('*')
        .trim();
    let name = name.strip_suffix(':').unwrap_or(name).trim().to_uppercase();
    match name.as_str() {
        HEADER_SCORES => Some(Section::Scores),
        HEADER_TAGS => Some(Section::Tags),
        HEADER_SKILLS => Some(Section::Skills),
        HEADER_SUGGESTIONS => Some(Section::Suggestions),
        HEADER_OBJECTS => Some(Section::Objects),
        _ => None,
    }
}

/// Split off a bullet marker. Returns the content and whether a marker was present.
fn strip_bullet(line: &str) -> (&str, bool) {
    match BULLET.find(line) {
        Some(m) => (line[m.end()..].trim(), true),
        None => (line, false),
    }
}

/// A value copied from the prompt template rather than filled in.
fn is_placeholder(value: &str) -> bool {
    value.starts_with('<')
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse `name, category, confidence`. Exactly three parts are required and
/// the third must be a float.
fn parse_tag(content: &str) -> Option<ContentTag> {
    let parts: Vec<&str> = content.split(',').map(str::trim).collect();
    let [name, category, confidence] = parts.as_slice() else {
        return None;
    };
    if name.is_empty() || is_placeholder(name) {
        return None;
    }
    let confidence = parse_number(confidence)?;
    let category = TagCategory::parse(category).unwrap_or_default();
    Some(ContentTag::new(
        format!("tag-{}", ContentTag::slug(name)),
        *name,
        category,
        confidence,
        EXTRACTED_TAG_RELEVANCE,
    ))
}

/// Parse `name: Level n, Confidence c`. Both numbers must parse.
fn parse_skill(content: &str) -> Option<SkillAssessment> {
    let caps = SKILL_LINE.captures(content)?;
    let name = caps.get(1)?.as_str().trim();
    if name.is_empty() || is_placeholder(name) {
        return None;
    }
    let level = parse_number(caps.get(2)?.as_str())?;
    let confidence = parse_number(caps.get(3)?.as_str())?;
    Some(SkillAssessment::new(name, level, confidence))
}

/// Line scanner state.
struct Extractor {
    result: ContentAnalysisResult,
    axes: AxisScores,
    section: Section,
    dropped: usize,
}

impl Extractor {
    fn new(seed: ContentAnalysisResult) -> Self {
        Self {
            result: seed,
            axes: AxisScores::default(),
            section: Section::None,
            dropped: 0,
        }
    }

    fn feed(&mut self, raw: &str) {
        let line = raw.trim();
        if line.is_empty() {
            return;
        }
        if let Some(section) = header(line) {
            self.section = section;
            return;
        }

        let (content, is_bullet) = strip_bullet(line);
        let field_line = content.replace("**", "");
        let matched_field = self.match_fields(field_line.trim());

        let appended = is_bullet && self.append_to_section(content);
        if !matched_field && !appended {
            self.dropped += 1;
            trace!(line = %content, "dropping unrecognized line");
        }
    }

    /// Field pass. Returns whether any field pattern matched.
    fn match_fields(&mut self, line: &str) -> bool {
        if let Some(caps) = SCORE_FIELD.captures(line) {
            let value = caps.get(2).and_then(|m| parse_number(m.as_str()));
            if let (Some(axis), Some(value)) = (caps.get(1), value) {
                match axis.as_str().to_lowercase().as_str() {
                    "technical" => self.axes.technical = value,
                    "tactical" => self.axes.tactical = value,
                    "physical" => self.axes.physical = value,
                    "mental" => self.axes.mental = value,
                    // Overall is always derived from the axes.
                    _ => trace!(value, "ignoring reported overall"),
                }
                return true;
            }
        }

        if let Some(caps) = SETTING_FIELD.captures(line) {
            let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            match Setting::parse(raw) {
                Some(setting) => self.result.context.setting = setting,
                None => debug!(setting = raw, "unrecognized setting"),
            }
            return true;
        }

        if let Some(caps) = PRIMARY_SPORT_FIELD.captures(line) {
            let value = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            if !value.is_empty() && !is_placeholder(value) {
                self.result.primary_sport = value.to_lowercase();
            }
            return true;
        }

        if let Some(caps) = SECONDARY_SPORTS_FIELD.captures(line) {
            let value = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            self.result.secondary_sports.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty() && !is_placeholder(s) && !s.eq_ignore_ascii_case("none"))
                    .map(str::to_lowercase),
            );
            return true;
        }

        false
    }

    /// Section pass for bullet lines. Returns whether the line was kept.
    fn append_to_section(&mut self, content: &str) -> bool {
        if content.is_empty() || is_placeholder(content) {
            return false;
        }
        match self.section {
            Section::Tags => match parse_tag(content) {
                Some(tag) => {
                    self.result.tags.push(tag);
                    true
                }
                None => false,
            },
            Section::Skills => match parse_skill(content) {
                Some(skill) => {
                    self.result.skills.push(skill);
                    true
                }
                None => false,
            },
            Section::Suggestions => {
                self.result.suggestions.push(content.to_string());
                true
            }
            Section::Objects => {
                self.result.detected_objects.push(content.to_string());
                true
            }
            Section::None | Section::Scores => false,
        }
    }

    fn finish(mut self) -> ContentAnalysisResult {
        self.result.performance = PerformanceScore::from(self.axes);
        if self.dropped > 0 {
            debug!(dropped = self.dropped, "extraction dropped non-conforming lines");
        }
        self.result
    }
}

/// Extract a result from `text` with no request context.
///
/// The media kind defaults to video and the primary sport to `"unknown"`
/// unless the text names one.
pub fn extract(text: &str) -> ContentAnalysisResult {
    extract_seeded(ContentAnalysisResult::empty(MediaKind::default(), "unknown"), text)
}

/// Extract a result from `text`, seeded with the request's media kind and sport.
pub fn extract_for(request: &AnalysisRequest, text: &str) -> ContentAnalysisResult {
    let sport = request.sport_key();
    let sport = if sport.is_empty() { "unknown".to_string() } else { sport };
    extract_seeded(ContentAnalysisResult::empty(request.media_kind, sport), text)
}

fn extract_seeded(seed: ContentAnalysisResult, text: &str) -> ContentAnalysisResult {
    let mut extractor = Extractor::new(seed);
    for line in text.lines() {
        extractor.feed(line);
    }
    extractor.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::FALLBACK_RESPONSE;

    const WELL_FORMED: &str = "\
Primary Sport: Basketball
Secondary Sports: Volleyball, none
Setting: Game

PERFORMANCE SCORES:
Overall: 9/10
Technical: 8/10
Tactical: 7/10
Physical: 9/10
Mental: 6/10

TAGS:
- Jump Shot, technique, 0.92
- Full Court, location, 0.7
- Hustle, attitude, 0.6

SKILLS:
- Ball Handling: Level 7, Confidence 0.85
- Shooting: Level 8/10, Confidence 0.9

SUGGESTIONS:
- Keep the guide hand quiet on release
- Attack closeouts with a dribble

DETECTED OBJECTS:
- basketball
- hoop
";

    #[test]
    fn well_formed_response_is_fully_extracted() {
        let result = extract(WELL_FORMED);
        assert_eq!(result.primary_sport, "basketball");
        assert_eq!(result.secondary_sports, vec!["volleyball".to_string()]);
        assert_eq!(result.context.setting, Setting::Game);
        assert_eq!(result.performance.technical(), 8.0);
        assert_eq!(result.performance.tactical(), 7.0);
        assert_eq!(result.performance.physical(), 9.0);
        assert_eq!(result.performance.mental(), 6.0);
        // Reported overall (9) is ignored; (8 + 7 + 9 + 6) / 4
        assert_eq!(result.performance.overall(), 7.5);
        assert_eq!(result.tags.len(), 3);
        assert_eq!(result.tags[0].id, "tag-jump-shot");
        assert_eq!(result.tags[0].category, TagCategory::Technique);
        assert_eq!(result.tags[2].category, TagCategory::Skill, "unknown category defaults to skill");
        assert_eq!(result.skills.len(), 2);
        assert_eq!(result.skills[1].level, 8.0);
        assert_eq!(result.suggestions.len(), 2);
        assert_eq!(result.detected_objects, vec!["basketball", "hoop"]);
    }

    #[test]
    fn empty_input_yields_zero_values() {
        let result = extract("");
        assert_eq!(result.primary_sport, "unknown");
        assert!(result.tags.is_empty());
        assert!(result.skills.is_empty());
        assert!(result.suggestions.is_empty());
        assert_eq!(result.performance.overall(), 0.0);
        assert_eq!(result.context.setting, Setting::Unknown);
    }

    #[test]
    fn pure_prose_yields_zero_values() {
        let text = "The athlete looked great out there today. Really strong effort,\n\
                    though the footwork could be tighter. Tags: hustle, grit.";
        let result = extract(text);
        assert_eq!(result.performance.nonzero_fields(), 0);
        assert!(result.tags.is_empty());
    }

    #[test]
    fn adversarial_input_never_panics() {
        let long_line = "x".repeat(100_000);
        let inputs = [
            "\0\0\0",
            "TAGS:\n- ,,,\n- a,b\n- a,b,c,d\n- a,b,notanumber",
            "SKILLS:\n- : Level , Confidence \n- x: Level 99999999999999999999999999, Confidence -4",
            "Technical: 1e400\nMental: -7\nPhysical: 10000",
            "PERFORMANCE SCORES\n* * *\n#####\n::::",
            "🏀🏈⚽\nSetting: 🤷\nPrimary Sport:    ",
            long_line.as_str(),
        ];
        for input in inputs {
            let result = extract(input);
            for field in result.performance.fields() {
                assert!((0.0..=10.0).contains(&field), "field {field} out of range");
            }
            for tag in &result.tags {
                assert!((0.0..=1.0).contains(&tag.confidence));
            }
            for skill in &result.skills {
                assert!((0.0..=10.0).contains(&skill.level));
                assert!((0.0..=1.0).contains(&skill.confidence));
            }
        }
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let result = extract("Technical: 42\nTactical: -3\nPhysical: 7");
        assert_eq!(result.performance.technical(), 10.0);
        assert_eq!(result.performance.tactical(), 0.0);
        assert_eq!(result.performance.overall(), 8.5);
    }

    #[test]
    fn later_score_overwrites_earlier() {
        let result = extract("Technical: 3/10\nsome prose\nTechnical: 7/10");
        assert_eq!(result.performance.technical(), 7.0);
        assert_eq!(result.performance.overall(), 7.0);
    }

    #[test]
    fn fields_match_outside_any_section_and_with_markup() {
        let result = extract("- **Mental:** 5/10\nTactical score: 4.5");
        assert_eq!(result.performance.mental(), 5.0);
        assert_eq!(result.performance.tactical(), 4.5);
    }

    #[test]
    fn skill_requires_both_numbers() {
        let text = "SKILLS:\n- Passing: Level 7\n- Vision: Level high, Confidence 0.8\n- Footwork: Level 6, Confidence .75";
        let result = extract(text);
        assert_eq!(result.skills.len(), 1);
        assert_eq!(result.skills[0].name, "Footwork");
        assert_eq!(result.skills[0].confidence, 0.75);
    }

    #[test]
    fn tag_requires_float_third_token() {
        let text = "TAGS:\n- Sprint, performance, high\n- Sprint, performance, 0.8, extra\n- Sprint, performance, 0.8";
        let result = extract(text);
        assert_eq!(result.tags.len(), 1);
        assert_eq!(result.tags[0].category, TagCategory::Performance);
        assert_eq!(result.tags[0].relevance, EXTRACTED_TAG_RELEVANCE);
    }

    #[test]
    fn section_changes_only_on_exact_headers() {
        let text = "SUGGESTIONS:\n- first\nSome suggestions follow:\n- second\nTags worth noting:\n- third";
        let result = extract(text);
        assert_eq!(result.suggestions, vec!["first", "second", "third"]);
        assert!(result.tags.is_empty());
    }

    #[test]
    fn markdown_headers_are_recognized() {
        let text = "## Tags\n- Layup, technique, 0.8\n### **Suggestions:**\n1. Finish with the outside hand";
        let result = extract(text);
        assert_eq!(result.tags.len(), 1);
        assert_eq!(result.suggestions, vec!["Finish with the outside hand"]);
    }

    #[test]
    fn bullets_before_any_section_are_dropped() {
        let result = extract("- Layup, technique, 0.8\n- Shooting: Level 6, Confidence 0.5");
        assert!(result.tags.is_empty());
        assert!(result.skills.is_empty());
    }

    #[test]
    fn template_placeholders_are_ignored() {
        let text = "Primary Sport: <sport>\nTAGS:\n- <name>, <category>, 0.5\nSUGGESTIONS:\n- <one actionable suggestion per line>";
        let result = extract(text);
        assert_eq!(result.primary_sport, "unknown");
        assert!(result.tags.is_empty());
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn unknown_setting_keeps_default() {
        let result = extract("Setting: tournament");
        assert_eq!(result.context.setting, Setting::Unknown);
    }

    #[test]
    fn fallback_round_trips_to_mid_scale() {
        let result = extract(FALLBACK_RESPONSE);
        assert_eq!(result.performance.fields(), [6.0; 5]);
        assert_eq!(result.tags.len(), 2);
        assert_eq!(result.skills.len(), 2);
        assert!(result
            .suggestions
            .iter()
            .any(|s| s.to_lowercase().contains("manual")));
    }

    #[test]
    fn extract_for_seeds_from_request() {
        let request = AnalysisRequest::new("serve.jpg", MediaKind::Image, " Tennis ");
        let result = extract_for(&request, "Technical: 6");
        assert_eq!(result.media_kind, MediaKind::Image);
        assert_eq!(result.primary_sport, "tennis");

        let overridden = extract_for(&request, "Primary Sport: Pickleball");
        assert_eq!(overridden.primary_sport, "pickleball");
    }
}
