//! Locates the annotated span behind an extraction and reads its topics.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::Markers;
use crate::markup::Element;
use crate::topics::TopicVocabulary;

static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

// API exports carry topics as dict-literal keys: [{'topic_water': 'sentence'}]
static RE_PROPERTY_TOPIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"](topic_[^'"]*)['"]\s*:"#).unwrap());

/// Topics recovered for one row, split by whether the vocabulary knows them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicHits {
    /// Vocabulary positions
    pub known: Vec<usize>,
    /// TopicIds the vocabulary does not contain; they carry no score
    pub unknown: Vec<String>,
}

impl TopicHits {
    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.unknown.is_empty()
    }
}

pub struct ExtractionMatcher<'a> {
    markers: &'a Markers,
    vocab: &'a TopicVocabulary,
}

impl<'a> ExtractionMatcher<'a> {
    pub fn new(markers: &'a Markers, vocab: &'a TopicVocabulary) -> Self {
        Self { markers, vocab }
    }

    /// Topics of the first event span whose flattened text equals
    /// `extraction`, or `None` when no span matches.
    pub fn match_span(&self, tree: &Element, extraction: &str) -> Option<TopicHits> {
        let span = tree
            .descendants()
            .into_iter()
            .filter(|e| e.name.starts_with(&self.markers.event_prefix))
            .find(|e| flatten(e) == extraction)?;
        Some(self.resolve(self.span_topics(span)))
    }

    /// Deduplicated TopicIds from the span's qualifying topic attributes.
    pub fn span_topics(&self, span: &Element) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();
        for (key, value) in &span.attributes {
            if !key.contains(&self.markers.topic_attribute) {
                continue;
            }
            if !self.markers.qualifying_scopes.iter().any(|s| s == value) {
                continue;
            }
            let id = key.replace(&self.markers.attribute_prefix, "");
            if !topics.contains(&id) {
                topics.push(id);
            }
        }
        topics
    }

    /// Map TopicIds onto vocabulary positions.
    pub fn resolve(&self, topics: Vec<String>) -> TopicHits {
        let mut hits = TopicHits::default();
        for id in topics {
            match self.vocab.position(&id) {
                Some(pos) if !hits.known.contains(&pos) => hits.known.push(pos),
                Some(_) => {}
                None => hits.unknown.push(id),
            }
        }
        hits
    }
}

/// Span text with inner markup serialized and then stripped of tags.
pub fn flatten(span: &Element) -> String {
    RE_TAG.replace_all(&span.inner_markup(), "").into_owned()
}

/// TopicIds named as keys in an API export's `properties` cell.
pub fn topics_from_properties(raw: &str) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();
    for caps in RE_PROPERTY_TOPIC.captures_iter(raw) {
        let id = caps[1].to_string();
        if !topics.contains(&id) {
            topics.push(id);
        }
    }
    topics
}
