//! Turns binary topic hits into signed, provenance-weighted scores.

use crate::config::{EventLabels, Markers, Weights};
use crate::topics::TopicScores;

/// Which rule family produced an extraction. Exactly one applies per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightClass {
    InvestmentObjective,
    PrincipleStrategy,
    ShortName,
    /// Anything not matched by a labelled rule
    Catch,
}

impl WeightClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvestmentObjective => "investment_objective",
            Self::PrincipleStrategy => "principle_strategy",
            Self::ShortName => "short_name",
            Self::Catch => "catch",
        }
    }
}

pub struct WeightPolicy<'a> {
    weights: &'a Weights,
    labels: &'a EventLabels,
    negation_marker: String,
}

impl<'a> WeightPolicy<'a> {
    pub fn new(weights: &'a Weights, labels: &'a EventLabels, markers: &Markers) -> Self {
        Self {
            weights,
            labels,
            negation_marker: markers.negation.to_lowercase(),
        }
    }

    /// Exact label match; case or whitespace variants fall into `Catch`.
    pub fn classify(&self, event_type: &str) -> WeightClass {
        if event_type == self.labels.investment_objective {
            WeightClass::InvestmentObjective
        } else if event_type == self.labels.short_name {
            WeightClass::ShortName
        } else if event_type == self.labels.principle_strategy {
            WeightClass::PrincipleStrategy
        } else {
            WeightClass::Catch
        }
    }

    pub fn multiplier(&self, class: WeightClass) -> f64 {
        match class {
            WeightClass::InvestmentObjective => self.weights.investment_objective,
            WeightClass::ShortName => self.weights.short_name,
            WeightClass::PrincipleStrategy => self.weights.principle_strategy,
            WeightClass::Catch => self.weights.catch,
        }
    }

    pub fn is_negated(&self, text: &str) -> bool {
        !self.negation_marker.is_empty() && text.to_lowercase().contains(&self.negation_marker)
    }

    /// Scale every topic by the class multiplier, then flip the sign when
    /// `negation_source` carries the negation marker.
    pub fn apply(&self, scores: &TopicScores, event_type: &str, negation_source: &str) -> TopicScores {
        let factor = self.multiplier(self.classify(event_type));
        let sign = if self.is_negated(negation_source) { -1.0 } else { 1.0 };
        scores.map(|v| {
            let weighted = v * factor;
            if weighted == 0.0 { 0.0 } else { weighted * sign }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::TopicVocabulary;
    use std::collections::HashMap;

    fn one_hit() -> TopicScores {
        let vocab = TopicVocabulary::new(["topic_a", "topic_b"], HashMap::new());
        let mut scores = TopicScores::zeroed(&vocab);
        scores.set(0, 1.0);
        scores
    }

    #[test]
    fn test_classify_exact_labels() {
        let (w, l, m) = (Weights::default(), EventLabels::default(), Markers::default());
        let policy = WeightPolicy::new(&w, &l, &m);
        assert_eq!(policy.classify("OS IS Investment Objective"), WeightClass::InvestmentObjective);
        assert_eq!(policy.classify("OS IS short name"), WeightClass::ShortName);
        assert_eq!(policy.classify("OS IS Principle Strategy"), WeightClass::PrincipleStrategy);
        assert_eq!(policy.classify("OS IS Catch_rule"), WeightClass::Catch);
    }

    #[test]
    fn test_classify_variants_fall_into_catch() {
        let (w, l, m) = (Weights::default(), EventLabels::default(), Markers::default());
        let policy = WeightPolicy::new(&w, &l, &m);
        assert_eq!(policy.classify("os is investment objective"), WeightClass::Catch);
        assert_eq!(policy.classify("OS IS Investment Objective "), WeightClass::Catch);
        assert_eq!(policy.classify(""), WeightClass::Catch);
    }

    #[test]
    fn test_multiplier_ordering() {
        let (w, l, m) = (Weights::default(), EventLabels::default(), Markers::default());
        let policy = WeightPolicy::new(&w, &l, &m);
        let catch = policy.multiplier(WeightClass::Catch);
        let strategy = policy.multiplier(WeightClass::PrincipleStrategy);
        let objective = policy.multiplier(WeightClass::InvestmentObjective);
        let short = policy.multiplier(WeightClass::ShortName);
        assert!(catch < strategy);
        assert!(strategy < objective);
        assert_eq!(objective, short);
    }

    #[test]
    fn test_apply_weights_hits_only() {
        let (w, l, m) = (Weights::default(), EventLabels::default(), Markers::default());
        let policy = WeightPolicy::new(&w, &l, &m);
        let out = policy.apply(&one_hit(), "OS IS Principle Strategy", "<s>plain</s>");
        assert_eq!(out.values(), &[0.6, 0.0]);
    }

    #[test]
    fn test_negation_flips_sign_after_weighting() {
        let (w, l, m) = (Weights::default(), EventLabels::default(), Markers::default());
        let policy = WeightPolicy::new(&w, &l, &m);
        let out = policy.apply(
            &one_hit(),
            "OS IS Catch_rule",
            "<s><TRUEEVENT_X PROP_Negation_Event='true'>x</TRUEEVENT_X></s>",
        );
        assert_eq!(out.values(), &[-0.03, 0.0]);
        // zero stays unsigned
        assert!(out.get(1).is_sign_positive());
    }

    #[test]
    fn test_negation_keeps_magnitude() {
        let (w, l, m) = (Weights::default(), EventLabels::default(), Markers::default());
        let policy = WeightPolicy::new(&w, &l, &m);
        let plain = policy.apply(&one_hit(), "OS IS Investment Objective", "");
        let negated = policy.apply(&one_hit(), "OS IS Investment Objective", "prop_negation_event");
        assert_eq!(plain.get(0), -negated.get(0));
    }
}
