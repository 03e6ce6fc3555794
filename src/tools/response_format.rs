//! Parsing the loosely-structured text a vision tool's underlying model
//! returns into a typed list (spec 4.10).
//!
//! Extracted as pure, independently testable functions: the tools that call
//! them (`ask`, `rank`, `compare`, ...) are themselves out of scope
//! (spec 1) since their bodies are CV/browser-backed, but the text-to-list
//! normalization a real implementation needs is self-contained and worth
//! keeping correct and tested on its own.

use std::sync::OnceLock;

use rand::seq::SliceRandom;
use regex::Regex;

/// Whether an `ask()` answer list should default its fallback entries to
/// booleans or integers (spec 4.10): the two answer shapes the original
/// tool distinguishes by `answer_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    /// Yes/no answers, defaulting to `false`.
    Bool,
    /// Numeric answers, defaulting to `0`.
    Int,
}

fn literal_list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\[\]]*\]").expect("literal-list regex is valid"))
}

/// Parse a bracketed list of booleans or integers out of free-form model
/// text (spec 4.10), falling back to an all-default list of `expected_len`
/// when no well-formed list of the right length is found — mirroring the
/// tolerant behaviour a hint-injected retry prompt depends on rather than a
/// hard parse failure.
pub fn parse_answer_list(text: &str, expected_len: usize, kind: AnswerKind) -> Vec<AnswerValue> {
    if let Some(found) = literal_list_re().find(text) {
        if let Some(values) = parse_literal_list(found.as_str(), kind) {
            if values.len() == expected_len {
                return values;
            }
        }
    }
    default_answers(expected_len, kind)
}

/// A single parsed answer entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnswerValue {
    /// A yes/no answer.
    Bool(bool),
    /// A numeric answer.
    Int(i64),
}

fn default_answers(len: usize, kind: AnswerKind) -> Vec<AnswerValue> {
    match kind {
        AnswerKind::Bool => vec![AnswerValue::Bool(false); len],
        AnswerKind::Int => vec![AnswerValue::Int(0); len],
    }
}

fn parse_literal_list(raw: &str, kind: AnswerKind) -> Option<Vec<AnswerValue>> {
    let inner = raw.trim().strip_prefix('[')?.strip_suffix(']')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    inner
        .split(',')
        .map(|entry| parse_answer_entry(entry.trim(), kind))
        .collect()
}

fn parse_answer_entry(entry: &str, kind: AnswerKind) -> Option<AnswerValue> {
    match kind {
        AnswerKind::Bool => match entry.to_ascii_lowercase().as_str() {
            "true" => Some(AnswerValue::Bool(true)),
            "false" => Some(AnswerValue::Bool(false)),
            _ => None,
        },
        AnswerKind::Int => entry.parse::<i64>().ok().map(AnswerValue::Int),
    }
}

fn rank_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"rank\((?:ids=)?(\[[\d,\s]*\])\)").expect("rank-call regex is valid")
    })
}

/// Parse a 0- or 1-indexed `rank(ids=[...])`/`rank([...])` call out of
/// free-form model text, normalizing to 0-indexed positions into a list of
/// `expected_len` candidates (spec 4.10).
///
/// Deduplicates (keeping first occurrence), drops out-of-range ids, and —
/// when nothing usable is found — falls back to `fallback_permutation`, a
/// caller-supplied source of a random `0..expected_len` permutation, so a
/// caller always receives a complete ranking rather than erroring outright
/// without this otherwise-pure function reaching for a thread-local RNG
/// itself.
pub fn parse_rank_ids(
    text: &str,
    expected_len: usize,
    fallback_permutation: impl FnOnce(usize) -> Vec<usize>,
) -> Vec<usize> {
    if let Some(caps) = rank_call_re().captures(text) {
        if let Some(ids) = parse_int_list(&caps[1]) {
            let normalized = normalize_rank_ids(&ids, expected_len);
            if !normalized.is_empty() {
                return normalized;
            }
        }
    }
    fallback_permutation(expected_len)
}

/// The default `fallback_permutation` source for [`parse_rank_ids`]: a
/// uniformly shuffled `0..len` built from the process-global RNG.
pub fn random_permutation(len: usize) -> Vec<usize> {
    let mut ids: Vec<usize> = (0..len).collect();
    ids.shuffle(&mut rand::thread_rng());
    ids
}

fn parse_int_list(raw: &str) -> Option<Vec<i64>> {
    let inner = raw.trim().strip_prefix('[')?.strip_suffix(']')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    inner.split(',').map(|entry| entry.trim().parse::<i64>().ok()).collect()
}

fn normalize_rank_ids(ids: &[i64], expected_len: usize) -> Vec<usize> {
    if ids.is_empty() || expected_len == 0 {
        return Vec::new();
    }

    let one_indexed = ids.iter().all(|&i| i >= 1) && ids.iter().any(|&i| i == i64::try_from(expected_len).unwrap_or(i64::MAX));
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for &raw in ids {
        let adjusted = if one_indexed {
            match raw.checked_sub(1) {
                Some(v) => v,
                None => continue,
            }
        } else {
            raw
        };
        let Ok(idx) = usize::try_from(adjusted) else {
            continue;
        };
        if idx < expected_len && seen.insert(idx) {
            out.push(idx);
        }
    }
    out
}
