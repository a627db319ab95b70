//! Static per-sport keyword vocabulary.
//!
//! Works with zero backend availability: used to backfill thin tag sets and
//! to answer tag-suggestion queries from UI collaborators.

use crate::types::{sport_key, ContentTag, SkillTier, TagCategory, TagMetadata};

/// Confidence assigned to vocabulary tags and to unscoped suggestions.
pub const VOCABULARY_CONFIDENCE: f64 = 0.8;
/// Relevance assigned to vocabulary tags and to unscoped suggestions.
pub const VOCABULARY_RELEVANCE: f64 = 0.7;
/// Confidence of a suggestion matched within the requested sport.
pub const SCOPED_SUGGESTION_CONFIDENCE: f64 = 0.9;
/// Relevance of a suggestion matched within the requested sport.
pub const SCOPED_SUGGESTION_RELEVANCE: f64 = 0.8;
/// Maximum number of suggestions returned by [`suggest_tags`].
pub const MAX_SUGGESTIONS: usize = 10;

/// Sport → ordered keyword list.
const SPORT_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "football",
        &[
            "touchdown",
            "quarterback",
            "running back",
            "wide receiver",
            "linebacker",
            "defensive back",
            "offensive line",
            "field goal",
            "punt",
            "snap",
            "blitz",
            "coverage",
            "route",
            "pocket",
            "rushing",
            "passing",
        ],
    ),
    (
        "basketball",
        &[
            "dribble",
            "shoot",
            "rebound",
            "assist",
            "steal",
            "block",
            "layup",
            "three-point",
            "free throw",
            "defense",
            "offense",
            "pick and roll",
            "fast break",
            "court",
            "basket",
            "dunk",
        ],
    ),
    (
        "soccer",
        &[
            "goal",
            "kick",
            "dribble",
            "pass",
            "header",
            "tackle",
            "save",
            "penalty",
            "corner",
            "offside",
            "midfielder",
            "striker",
            "defender",
            "goalkeeper",
            "cross",
            "volley",
        ],
    ),
    (
        "baseball",
        &[
            "pitch",
            "hit",
            "catch",
            "throw",
            "steal",
            "slide",
            "home run",
            "strikeout",
            "walk",
            "bunt",
            "double play",
            "infield",
            "outfield",
            "mound",
            "plate",
            "base",
        ],
    ),
    (
        "tennis",
        &[
            "serve",
            "forehand",
            "backhand",
            "volley",
            "lob",
            "smash",
            "ace",
            "deuce",
            "advantage",
            "set",
            "match",
            "court",
            "net",
            "baseline",
            "rally",
            "winner",
        ],
    ),
    (
        "golf",
        &[
            "drive", "putt", "chip", "iron", "wood", "wedge", "fairway", "green", "bunker",
            "rough", "tee", "hole", "par", "birdie", "eagle", "bogey",
        ],
    ),
];

/// Sports that have a dedicated vocabulary, in declaration order.
pub fn known_sports() -> impl Iterator<Item = &'static str> {
    SPORT_KEYWORDS.iter().map(|(sport, _)| *sport)
}

/// Whether `sport` (any case) has a dedicated vocabulary.
pub fn is_known_sport(sport: &str) -> bool {
    keywords(sport).is_some()
}

/// Ordered keyword list for `sport`, if it is known.
pub fn keywords(sport: &str) -> Option<&'static [&'static str]> {
    let key = sport_key(sport);
    SPORT_KEYWORDS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, words)| *words)
}

fn keyword_tag(keyword: &str, confidence: f64, relevance: f64) -> ContentTag {
    ContentTag::new(
        format!("sport-{keyword}"),
        keyword,
        TagCategory::Sport,
        confidence,
        relevance,
    )
}

fn intermediate() -> TagMetadata {
    TagMetadata {
        level: Some(SkillTier::Intermediate),
        ..Default::default()
    }
}

/// One tag per keyword of `sport`, in vocabulary order.
///
/// Every tag gets confidence 0.8, relevance 0.7 and level "intermediate".
/// Unknown sports yield an empty list.
pub fn tags_for(sport: &str) -> Vec<ContentTag> {
    keywords(sport)
        .unwrap_or_default()
        .iter()
        .map(|kw| {
            keyword_tag(kw, VOCABULARY_CONFIDENCE, VOCABULARY_RELEVANCE)
                .with_metadata(intermediate())
        })
        .collect()
}

/// Keywords containing `query` (case-insensitive), as suggestion tags.
///
/// With a sport, only that sport's vocabulary is searched and matches carry
/// confidence 0.9. Without one, every vocabulary is searched and matches carry
/// confidence 0.8; a keyword shared by two sports appears twice. At most
/// [`MAX_SUGGESTIONS`] tags are returned.
pub fn suggest_tags(query: &str, sport: Option<&str>) -> Vec<ContentTag> {
    let needle = query.trim().to_lowercase();

    let suggestions: Vec<ContentTag> = match sport {
        Some(sport) => keywords(sport)
            .unwrap_or_default()
            .iter()
            .filter(|kw| kw.contains(needle.as_str()))
            .map(|kw| {
                keyword_tag(kw, SCOPED_SUGGESTION_CONFIDENCE, SCOPED_SUGGESTION_RELEVANCE)
            })
            .collect(),
        None => SPORT_KEYWORDS
            .iter()
            .flat_map(|(_, words)| words.iter())
            .filter(|kw| kw.contains(needle.as_str()))
            .map(|kw| {
                keyword_tag(kw, VOCABULARY_CONFIDENCE, VOCABULARY_RELEVANCE)
                    .with_metadata(intermediate())
            })
            .collect(),
    };

    suggestions.into_iter().take(MAX_SUGGESTIONS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_for_known_sport_use_fixed_scores() {
        let tags = tags_for("Basketball");
        assert_eq!(tags.len(), 16);
        assert_eq!(tags[0].name, "dribble");
        assert_eq!(tags[0].id, "sport-dribble");
        for tag in &tags {
            assert_eq!(tag.confidence, 0.8);
            assert_eq!(tag.relevance, 0.7);
            assert_eq!(tag.category, TagCategory::Sport);
            assert_eq!(
                tag.metadata.as_ref().and_then(|m| m.level),
                Some(SkillTier::Intermediate)
            );
        }
    }

    #[test]
    fn tags_for_unknown_sport_is_empty() {
        assert!(tags_for("curling").is_empty());
        assert!(!is_known_sport("curling"));
    }

    #[test]
    fn scoped_suggestion_has_higher_confidence() {
        let tags = suggest_tags("dribbl", Some("basketball"));
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "dribble");
        assert_eq!(tags[0].confidence, 0.9);
    }

    #[test]
    fn unscoped_suggestion_searches_every_sport() {
        let tags = suggest_tags("dribbl", None);
        // basketball and soccer both list "dribble"
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().all(|t| t.name == "dribble"));
        assert!(tags.iter().all(|t| t.confidence == 0.8));
    }

    #[test]
    fn suggestions_are_capped() {
        // Every keyword contains at least one vowel; "e" matches well over ten.
        let tags = suggest_tags("e", None);
        assert_eq!(tags.len(), MAX_SUGGESTIONS);
    }

    #[test]
    fn query_is_case_insensitive() {
        let tags = suggest_tags("PUTT", Some("golf"));
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "putt");
    }

    #[test]
    fn unknown_scoped_sport_yields_nothing() {
        assert!(suggest_tags("goal", Some("cricket")).is_empty());
    }

    #[test]
    fn every_known_sport_has_a_vocabulary() {
        let sports: Vec<_> = known_sports().collect();
        assert_eq!(
            sports,
            ["football", "basketball", "soccer", "baseball", "tennis", "golf"]
        );
        for sport in sports {
            assert!(!tags_for(sport).is_empty());
        }
    }
}
