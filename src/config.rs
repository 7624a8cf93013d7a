//! Run configuration: weights, labels, markers and the topic vocabulary.
//!
//! Everything has a built-in default. A JSON file given with `--config`
//! overrides individual keys; keys it leaves out keep their default.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ScoreError;
use crate::topics::TopicVocabulary;

// ── Weights ──────────────────────────────────────────────────────────

/// Multiplier per weight class.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub investment_objective: f64,
    pub short_name: f64,
    pub principle_strategy: f64,
    pub catch: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            investment_objective: 1.0,
            short_name: 1.0,
            principle_strategy: 0.6,
            catch: 0.03,
        }
    }
}

/// `Event Type` labels that select a weight class. Matched exactly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EventLabels {
    pub investment_objective: String,
    pub short_name: String,
    pub principle_strategy: String,
}

impl Default for EventLabels {
    fn default() -> Self {
        Self {
            investment_objective: "OS IS Investment Objective".to_string(),
            short_name: "OS IS short name".to_string(),
            principle_strategy: "OS IS Principle Strategy".to_string(),
        }
    }
}

// ── Markup markers ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Markers {
    /// Tag-name prefix of true-positive event spans
    pub event_prefix: String,
    /// Attribute-name fragment marking a topic attribute
    pub topic_attribute: String,
    /// Prefix removed from a topic attribute name to get its TopicId
    pub attribute_prefix: String,
    /// Attribute values that count as a hit
    pub qualifying_scopes: Vec<String>,
    /// Case-insensitive substring flagging a negated extraction
    pub negation: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            event_prefix: "TRUEEVENT".to_string(),
            topic_attribute: "prop_topic_".to_string(),
            attribute_prefix: "prop_".to_string(),
            qualifying_scopes: vec!["sentence".to_string(), "paragraph".to_string()],
            negation: "prop_negation_event".to_string(),
        }
    }
}

// ── Top level ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: Weights,
    pub event_labels: EventLabels,
    pub markers: Markers,
    /// Replaces the built-in vocabulary when present
    pub topics: Option<Vec<String>>,
    /// Display-name remap applied after the `topic_` prefix is stripped
    pub display_names: HashMap<String, String>,
}

impl ScoringConfig {
    /// Defaults, overridden by the JSON file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ScoreError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let json = std::fs::read_to_string(path).map_err(|source| ScoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json).map_err(|source| ScoreError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The vocabulary for this run, fixed from here on.
    pub fn vocabulary(&self) -> TopicVocabulary {
        let remap = self.display_names.clone();
        match &self.topics {
            Some(topics) => TopicVocabulary::new(topics.iter().cloned(), remap),
            None => TopicVocabulary::builtin(remap),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::DEFAULT_TOPICS;

    #[test]
    fn test_defaults() {
        let config = ScoringConfig::default();
        assert_eq!(config.weights.catch, 0.03);
        assert_eq!(config.weights.principle_strategy, 0.6);
        assert_eq!(config.event_labels.short_name, "OS IS short name");
        assert_eq!(config.markers.event_prefix, "TRUEEVENT");
        assert_eq!(config.vocabulary().len(), DEFAULT_TOPICS.len());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ScoringConfig::from_json(r#"{"weights": {"catch": 0.1}}"#).unwrap();
        assert_eq!(config.weights.catch, 0.1);
        assert_eq!(config.weights.investment_objective, 1.0);
        assert_eq!(config.markers, Markers::default());
    }

    #[test]
    fn test_topics_and_display_names_override() {
        let config = ScoringConfig::from_json(
            r#"{"topics": ["topic_water", "topic_solar"], "display_names": {"solar": "Solar"}}"#,
        )
        .unwrap();
        let vocab = config.vocabulary();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.display_name("topic_solar"), "Solar");
    }

    #[test]
    fn test_malformed_weights_rejected() {
        assert!(ScoringConfig::from_json("{\"weights\": 3}").is_err());
    }

    #[test]
    fn test_load_without_path_is_default() {
        assert_eq!(ScoringConfig::load(None).unwrap(), ScoringConfig::default());
    }
}
