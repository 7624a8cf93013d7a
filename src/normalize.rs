//! Repairs the near-XML annotation strings into well-formed markup.
//!
//! The extraction tool emits attribute values without quotes, leaves `&`
//! unescaped, and wraps irrelevant matches in `sa.irrelevant.rule` tags
//! that carry nothing we need. Each malformation has its own rule; the
//! rules run in order and are all plain text substitutions.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::trace;

// ── Patterns ─────────────────────────────────────────────────────────

// attr=value with a bare identifier value: prop_topic_water=sentence
static RE_UNQUOTED_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=([A-Za-z0-9_]+)").unwrap());

// A literal ampersand, or one that already starts a reference XML itself
// defines: the five predefined entities or a numeric character reference.
// HTML names such as &rsquo; or &nbsp; are not XML and get escaped.
static RE_AMPERSAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+;|#x[0-9A-Fa-f]+;|(?:amp|lt|gt|quot|apos);)?").unwrap()
});

static RE_IRRELEVANT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?sa\.irrelevant\.rule>").unwrap());

// ── Rules ────────────────────────────────────────────────────────────

/// One class of malformation and how to repair it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairRule {
    QuoteAttributeValues,
    EscapeAmpersands,
    StripIrrelevantTags,
}

impl RepairRule {
    /// The rules in the order they must run.
    pub const ORDERED: [RepairRule; 3] = [
        Self::QuoteAttributeValues,
        Self::EscapeAmpersands,
        Self::StripIrrelevantTags,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::QuoteAttributeValues => "quote-attribute-values",
            Self::EscapeAmpersands => "escape-ampersands",
            Self::StripIrrelevantTags => "strip-irrelevant-tags",
        }
    }

    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        match self {
            Self::QuoteAttributeValues => RE_UNQUOTED_ATTR.replace_all(input, "='$1'"),
            Self::EscapeAmpersands => RE_AMPERSAND.replace_all(input, |caps: &Captures| {
                match caps.get(1) {
                    Some(_) => caps[0].to_string(),
                    None => "&amp;".to_string(),
                }
            }),
            Self::StripIrrelevantTags => RE_IRRELEVANT_TAG.replace_all(input, ""),
        }
    }
}

/// Run every repair rule over an annotated sentence.
pub fn normalize_annotations(raw: &str) -> String {
    RepairRule::ORDERED.iter().fold(raw.to_string(), |text, rule| {
        let repaired = match rule.apply(&text) {
            Cow::Borrowed(_) => None,
            Cow::Owned(repaired) => Some(repaired),
        };
        match repaired {
            Some(repaired) => {
                trace!(rule = rule.name(), "repaired annotation");
                repaired
            }
            None => text,
        }
    })
}
