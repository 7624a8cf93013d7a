//! Reduces weighted rows to one row per grouping key.
//!
//! Per topic the group keeps its largest value unless the smallest one
//! is strictly larger in magnitude, so a strong negated signal is not
//! masked by a weak positive one.

use std::collections::BTreeMap;

use crate::topics::TopicScores;
use crate::types::{AggregatedRow, ExtractionRow, IdentityLayout};

/// Signed max-magnitude of a group's extremes. Ties keep the maximum.
pub fn pick_extreme(max: f64, min: f64) -> f64 {
    if min.abs() > max { min } else { max }
}

struct Group {
    identity: Vec<String>,
    max: Vec<f64>,
    min: Vec<f64>,
}

impl Group {
    fn new(row: &ExtractionRow) -> Self {
        Self {
            identity: row.identity.clone(),
            max: row.scores.values().to_vec(),
            min: row.scores.values().to_vec(),
        }
    }

    fn absorb(&mut self, row: &ExtractionRow, layout: &IdentityLayout) {
        for (i, &v) in row.scores.values().iter().enumerate() {
            if let Some(hi) = self.max.get_mut(i) {
                *hi = hi.max(v);
            }
            if let Some(lo) = self.min.get_mut(i) {
                *lo = lo.min(v);
            }
        }
        // identity columns outside the key take the greatest value seen
        for (i, value) in row.identity.iter().enumerate() {
            if layout.grouping.contains(&i) {
                continue;
            }
            if let Some(current) = self.identity.get_mut(i)
                && *value > *current
            {
                *current = value.clone();
            }
        }
    }

    fn finish(self, template: &TopicScores) -> AggregatedRow {
        let mut scores = template.map(|_| 0.0);
        for (i, (&hi, &lo)) in self.max.iter().zip(&self.min).enumerate() {
            scores.set(i, pick_extreme(hi, lo));
        }
        let evidence = vec![None; scores.len()];
        AggregatedRow {
            identity: self.identity,
            scores,
            evidence,
        }
    }
}

/// Result of aggregation plus what had to be skipped.
#[derive(Debug, Default)]
pub struct Aggregation {
    /// Sorted by grouping key
    pub rows: Vec<AggregatedRow>,
    /// Input rows left out because a grouping value was empty
    pub skipped_rows: usize,
}

/// Group rows by their key and reduce each topic with `pick_extreme`.
pub fn aggregate(rows: &[ExtractionRow], layout: &IdentityLayout) -> Aggregation {
    let mut groups: BTreeMap<Vec<String>, Group> = BTreeMap::new();
    let mut skipped_rows = 0;

    for row in rows {
        let key = row.key(layout);
        if key.iter().any(|v| v.is_empty()) {
            skipped_rows += 1;
            continue;
        }
        match groups.get_mut(&key) {
            Some(group) => group.absorb(row, layout),
            None => {
                groups.insert(key, Group::new(row));
            }
        }
    }

    let Some(template) = rows.first().map(|r| &r.scores) else {
        return Aggregation::default();
    };
    Aggregation {
        rows: groups.into_values().map(|g| g.finish(template)).collect(),
        skipped_rows,
    }
}
