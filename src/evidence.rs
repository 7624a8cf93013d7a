//! Picks one representative sentence fragment per non-zero aggregated score.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{AggregatedRow, ExtractionRow, IdentityLayout};

// ── Boilerplate lead-ins ─────────────────────────────────────────────
//
// Prospectus section headings and the metadata prefixes added when the
// fund name/description is prepended to the article text:
//   "Principal Investment Strategies: The Fund invests ..."
//   "INVESTMENT OBJECTIVE The Fund seeks ..."
//   "short_name Acme Solar ETF"

static BOILERPLATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)principal investment strateg(?:ies|y):? *",
        r"(?i)investment objectives?:* *",
        r"(?i)short_desc ",
        r"(?i)short_name ",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Remove every boilerplate lead-in from `text`.
pub fn strip_boilerplate(text: &str) -> String {
    BOILERPLATE
        .iter()
        .fold(text.to_string(), |acc, re| re.replace_all(&acc, "").into_owned())
}

// ── Sentence splitting ───────────────────────────────────────────────

/// Split after `.` or `?` followed by spaces and an uppercase letter.
///
/// The character two before the mark must not be an uppercase letter, so
/// short capitalised abbreviations such as "Dr. Smith" or "Co. Ltd" stay
/// together.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut out = Vec::new();
    let mut start = 0;
    let mut k = 2;

    while k < chars.len() {
        let (pos, mark) = chars[k];
        let boundary = matches!(mark, '.' | '?')
            && chars[k - 1].1 != '\n'
            && !chars[k - 2].1.is_ascii_uppercase();
        if !boundary {
            k += 1;
            continue;
        }
        let mut j = k + 1;
        while j < chars.len() && chars[j].1 == ' ' {
            j += 1;
        }
        if j > k + 1 && j < chars.len() && chars[j].1.is_ascii_uppercase() {
            out.push(&text[start..pos + mark.len_utf8()]);
            start = chars[j].0;
            k = j;
        } else {
            k += 1;
        }
    }
    out.push(&text[start..]);
    out
}

/// The first fragment of `sentence` containing `extraction`, trimmed, or
/// the whole sentence when no fragment does.
pub fn evidence_text(sentence: &str, extraction: &str) -> (String, bool) {
    match split_sentences(sentence)
        .into_iter()
        .find(|fragment| fragment.contains(extraction))
    {
        Some(fragment) => (fragment.trim().to_string(), false),
        None => (sentence.to_string(), true),
    }
}

// ── Selection ────────────────────────────────────────────────────────

struct Candidate<'a> {
    row: &'a ExtractionRow,
    sentence: String,
    extraction: String,
}

/// Aggregated rows with evidence attached.
#[derive(Debug, Default)]
pub struct EvidenceTable {
    /// One row per entity, first aggregated row kept
    pub rows: Vec<AggregatedRow>,
    /// Selections where no fragment contained the extraction
    pub fallbacks: usize,
}

/// Attach evidence text to every non-zero topic score of `aggregated`.
///
/// Aggregated rows are deduplicated by entity first. The supporting row
/// is the entity's row with the extreme value for the topic (maximum for
/// a positive score, minimum for a negative one); ties keep the earliest
/// input row.
pub fn select_evidence(
    aggregated: &[AggregatedRow],
    rows: &[ExtractionRow],
    layout: &IdentityLayout,
) -> EvidenceTable {
    let mut by_entity: HashMap<&str, Vec<Candidate>> = HashMap::new();
    for row in rows {
        by_entity.entry(row.entity(layout)).or_default().push(Candidate {
            row,
            sentence: strip_boilerplate(&row.sentence),
            extraction: strip_boilerplate(&row.extraction),
        });
    }

    let mut table = EvidenceTable::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for agg in aggregated {
        let entity = agg.entity(layout);
        if !seen.insert(entity) {
            continue;
        }

        let mut out = agg.clone();
        if agg.scores.is_all_zero() {
            table.rows.push(out);
            continue;
        }
        let candidates = by_entity.get(entity).map(Vec::as_slice).unwrap_or(&[]);

        for (pos, &value) in agg.scores.values().iter().enumerate() {
            if value == 0.0 {
                continue;
            }
            let Some(best) = extreme_candidate(candidates, pos, value > 0.0) else {
                continue;
            };
            let (text, fell_back) = evidence_text(&best.sentence, &best.extraction);
            if fell_back {
                table.fallbacks += 1;
            }
            if let Some(slot) = out.evidence.get_mut(pos) {
                *slot = Some(text);
            }
        }
        table.rows.push(out);
    }
    table
}

fn extreme_candidate<'c, 'a>(
    candidates: &'c [Candidate<'a>],
    pos: usize,
    highest: bool,
) -> Option<&'c Candidate<'a>> {
    let mut best: Option<&Candidate> = None;
    for c in candidates {
        let v = c.row.scores.get(pos);
        let better = match best {
            None => true,
            Some(b) if highest => v > b.row.scores.get(pos),
            Some(b) => v < b.row.scores.get(pos),
        };
        if better {
            best = Some(c);
        }
    }
    best
}
