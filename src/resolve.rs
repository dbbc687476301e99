//! The resolution stage: mapping unreliable classifier guesses onto
//! ground-truth candidate sets.
//!
//! The oracle returns free-form, best-effort output. Nothing it says is
//! trusted directly: every guess is validated against the candidate set
//! fetched from the catalog, with a fixed ladder of fallbacks applied in
//! strict priority order:
//!
//! 1. exact match
//! 2. case-insensitive substring match (either direction)
//! 3. token-overlap score (`|intersection| / min(|guess|, |candidate|)`)
//! 4. query-keyword containment
//! 5. first candidate in catalog order (deterministic, semantically
//!    arbitrary — logged, never hidden)
//!
//! The same ladder backs all three stages (course, module, resource); the
//! module stage unions per-name matches instead of short-circuiting, and the
//! resource stage validates index selections instead of names.

use std::collections::HashSet;
use std::fmt;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::{Course, CourseList, Module, ResourceGuess};

/// Classifier-suggested module names considered per request.
pub const MAX_MODULE_GUESSES: usize = 3;
/// Classifier-suggested resource indices considered per module.
pub const MAX_RESOURCE_GUESSES: usize = 5;

/// Which rung of the matching ladder produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPath {
    Exact,
    Substring,
    Overlap,
    Keyword,
    Default,
}

impl fmt::Display for MatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchPath::Exact => "exact",
            MatchPath::Substring => "substring",
            MatchPath::Overlap => "overlap",
            MatchPath::Keyword => "keyword",
            MatchPath::Default => "default",
        };
        f.write_str(s)
    }
}

/// Decode a classifier reply into a guess struct, strict-first.
///
/// Tries the raw text as JSON, then the outermost `{…}` span (models often
/// wrap the object in prose or a code fence). Returns `None` when neither
/// parses; the caller falls back to the heuristic ladder.
pub fn decode_guess<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

/// Lowercase tokens of length > 3, split on non-alphanumeric characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Token-overlap score between a guess and a candidate name.
pub fn overlap_score(guess: &str, candidate: &str) -> f64 {
    overlap_of(&tokenize(guess), &tokenize(candidate))
}

fn overlap_of(guess_tokens: &[String], candidate_tokens: &[String]) -> f64 {
    let guess: HashSet<&str> = guess_tokens.iter().map(String::as_str).collect();
    let candidate: HashSet<&str> = candidate_tokens.iter().map(String::as_str).collect();
    if guess.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    let intersection = guess.intersection(&candidate).count();
    intersection as f64 / guess.len().min(candidate.len()) as f64
}

/// Words of length > 4 from the original query, used by the keyword rung.
fn query_keywords(query: &str) -> Vec<String> {
    query
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|w| w.len() > 4)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Apply rungs 1–4 of the ladder to a single guessed name.
///
/// Returns the index of the selected candidate and the rung that produced
/// it, or `None` when nothing matched (the caller decides whether rung 5
/// applies). `None` is also the "no candidates" sentinel for an empty set.
pub fn match_name(
    guess: &str,
    candidates: &[&str],
    query: &str,
    overlap_threshold: f64,
) -> Option<(usize, MatchPath)> {
    if candidates.is_empty() {
        return None;
    }
    let guess = guess.trim();

    // An empty guess would trivially substring-match every candidate, so
    // rungs 1-3 only run when the classifier actually named something.
    if !guess.is_empty() {
        if let Some(idx) = candidates.iter().position(|c| *c == guess) {
            return Some((idx, MatchPath::Exact));
        }

        let guess_lower = guess.to_lowercase();
        if let Some(idx) = candidates.iter().position(|c| {
            let cand = c.to_lowercase();
            cand.contains(&guess_lower) || guess_lower.contains(&cand)
        }) {
            return Some((idx, MatchPath::Substring));
        }

        let guess_tokens = tokenize(guess);
        if !guess_tokens.is_empty() {
            let mut best: Option<(usize, f64)> = None;
            for (idx, cand) in candidates.iter().enumerate() {
                let score = overlap_of(&guess_tokens, &tokenize(cand));
                // strictly greater keeps the first-seen candidate on ties
                if score > best.map_or(0.0, |(_, s)| s) {
                    best = Some((idx, score));
                }
            }
            if let Some((idx, score)) = best {
                if score >= overlap_threshold {
                    return Some((idx, MatchPath::Overlap));
                }
            }
        }
    }

    let keywords = query_keywords(query);
    if !keywords.is_empty() {
        for (idx, cand) in candidates.iter().enumerate() {
            let cand_lower = cand.to_lowercase();
            if keywords.iter().any(|k| cand_lower.contains(k)) {
                return Some((idx, MatchPath::Keyword));
            }
        }
    }

    None
}

/// Course stage: resolve a guessed course name against the catalog.
///
/// Always selects a member of the catalog unless the catalog itself is
/// empty. When every rung fails, the first course in catalog order is
/// selected and logged as the degenerate default.
pub fn resolve_course<'a>(
    guess: &str,
    courses: &'a CourseList,
    query: &str,
    overlap_threshold: f64,
) -> Option<(&'a Course, MatchPath)> {
    let names = courses.names();
    match match_name(guess, &names, query, overlap_threshold) {
        Some((idx, path)) => {
            let course = courses.iter().nth(idx)?;
            if path != MatchPath::Exact {
                debug!(guess, course = %course.name, %path, "course guess matched inexactly");
            }
            Some((course, path))
        }
        None => {
            let course = courses.first()?;
            warn!(guess, course = %course.name, "no course matched; defaulting to first in catalog order");
            Some((course, MatchPath::Default))
        }
    }
}

/// Module stage: union per-name matches with a query-keyword pass.
///
/// Each guessed name (up to [`MAX_MODULE_GUESSES`]) runs through rungs 1–4;
/// independently, any module whose name contains a query token joins the
/// union. Results are deduplicated in first-resolution order. An empty
/// union falls back to the first `fallback_count` modules in catalog order.
pub fn resolve_modules(
    guessed: &[String],
    modules: &[Module],
    query: &str,
    overlap_threshold: f64,
    fallback_count: usize,
) -> Vec<Module> {
    if modules.is_empty() {
        return Vec::new();
    }
    let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
    let mut selected: Vec<usize> = Vec::new();

    for guess in guessed.iter().take(MAX_MODULE_GUESSES) {
        if let Some((idx, path)) = match_name(guess, &names, query, overlap_threshold) {
            debug!(guess = guess.as_str(), module = names[idx], %path, "module guess matched");
            if !selected.contains(&idx) {
                selected.push(idx);
            }
        }
    }

    let tokens = tokenize(query);
    for (idx, name) in names.iter().enumerate() {
        if selected.contains(&idx) {
            continue;
        }
        let name_lower = name.to_lowercase();
        if tokens.iter().any(|t| name_lower.contains(t)) {
            debug!(module = *name, "module matched query keyword");
            selected.push(idx);
        }
    }

    if selected.is_empty() {
        let take = fallback_count.min(modules.len());
        warn!(take, "no module matched; falling back to catalog order");
        selected.extend(0..take);
    }

    selected.into_iter().map(|i| modules[i].clone()).collect()
}

/// Resource stage: validate guessed indices against the item list.
///
/// Out-of-range indices are dropped silently; a selected index missing its
/// positional relevance score gets 0.5. An unusable guess (`None`: the
/// reply failed to decode, or the oracle call failed outright) falls back
/// to the first `min(fallback_count, N)` items at `fallback_score`.
pub fn resolve_resources(
    guess: Option<ResourceGuess>,
    item_count: usize,
    fallback_count: usize,
    fallback_score: f64,
) -> Vec<(usize, f64)> {
    match guess {
        Some(g) => {
            let mut picks = Vec::new();
            for (pos, &idx) in g.resource_indices.iter().take(MAX_RESOURCE_GUESSES).enumerate() {
                if idx >= item_count {
                    debug!(idx, item_count, "dropping out-of-range resource index");
                    continue;
                }
                let score = g.relevance_scores.get(pos).copied().unwrap_or(0.5);
                picks.push((idx, score));
            }
            picks
        }
        None => (0..item_count.min(fallback_count))
            .map(|i| (i, fallback_score))
            .collect(),
    }
}
