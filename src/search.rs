//! Free-text artefact search
//!
//! Ranks catalog artefacts against a query typed by the user. A strict pass
//! scores prefix, substring and per-token matches; when nothing survives it a
//! fuzzy pass accepts queries whose letters appear in order in a name or id.

use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::Catalog;
use crate::models::Artefact;

/// Number of results a search returns at most
pub const MAX_RESULTS: usize = 10;

const PREFIX_SCORE: i32 = 120;
const SUBSTRING_SCORE: i32 = 60;
const ALL_TOKENS_SCORE: i32 = 50;
const TOKEN_EXACT_SCORE: i32 = 18;
const TOKEN_PREFIX_SCORE: i32 = 12;
const ID_TOKEN_SCORE: i32 = 10;
const LEADING_POSITION_SCORE: i32 = 15;
const EARLY_POSITION_SCORE: i32 = 8;
const EARLY_POSITION_LIMIT: usize = 6;
const LENGTH_PENALTY_DIVISOR: usize = 25;
const MAX_LENGTH_PENALTY: usize = 10;
const FUZZY_SCORE: i32 = 18;
const FUZZY_MIN_LEN: usize = 2;

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_-]+").expect("separator pattern is valid"));
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9 ]+").expect("disallowed pattern is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Lowercase, turn `_`/`-` runs into spaces, drop anything outside `[a-z0-9 ]`
/// and collapse whitespace.
pub fn normalize_text(input: &str) -> String {
    let lower = input.to_lowercase();
    let spaced = SEPARATORS.replace_all(&lower, " ");
    let stripped = DISALLOWED.replace_all(&spaced, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

pub fn tokenize(normalized: &str) -> Vec<&str> {
    normalized.split(' ').filter(|t| !t.is_empty()).collect()
}

/// True if every char of `needle` appears in `haystack` in the same order
pub fn is_subsequence(needle: &str, haystack: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut rest = haystack.chars();
    needle.chars().all(|c| rest.any(|h| h == c))
}

fn compact(normalized: &str) -> String {
    normalized.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Precomputed search keys for one artefact
#[derive(Debug, Clone)]
pub struct ArtefactIndex {
    pub normalized_name: String,
    pub normalized_id: String,
    pub name_tokens: Vec<String>,
    pub id_tokens: Vec<String>,
}

impl ArtefactIndex {
    pub fn new(artefact: &Artefact) -> Self {
        let normalized_name = normalize_text(&artefact.name);
        let normalized_id = normalize_text(&artefact.id);
        let name_tokens = tokenize(&normalized_name).into_iter().map(String::from).collect();
        let id_tokens = tokenize(&normalized_id).into_iter().map(String::from).collect();
        Self {
            normalized_name,
            normalized_id,
            name_tokens,
            id_tokens,
        }
    }

    fn score(&self, query: &Query, allow_fuzzy: bool) -> i32 {
        let q = query.normalized.as_str();
        if q.is_empty() {
            return 0;
        }

        let name = self.normalized_name.as_str();
        let id = self.normalized_id.as_str();
        let mut score = 0;

        if name.starts_with(q) || id.starts_with(q) {
            score += PREFIX_SCORE;
        }
        if name.contains(q) || id.contains(q) {
            score += SUBSTRING_SCORE;
        }
        if let Some(quality) = self.token_quality(&query.tokens) {
            score += ALL_TOKENS_SCORE + quality;
        }

        match name.find(q) {
            Some(0) => score += LEADING_POSITION_SCORE,
            Some(i) if i < EARLY_POSITION_LIMIT => score += EARLY_POSITION_SCORE,
            _ => {}
        }

        let penalty = (name.len() / LENGTH_PENALTY_DIVISOR).min(MAX_LENGTH_PENALTY);
        score -= penalty as i32;

        if score <= 0 && allow_fuzzy {
            let needle = compact(q);
            if needle.len() >= FUZZY_MIN_LEN
                && (is_subsequence(&needle, &compact(name)) || is_subsequence(&needle, &compact(id)))
            {
                score = FUZZY_SCORE;
            }
        }
        score
    }

    /// Summed per-token quality, or `None` if any query token matches nothing
    fn token_quality(&self, query_tokens: &[String]) -> Option<i32> {
        if query_tokens.is_empty() {
            return None;
        }
        query_tokens.iter().try_fold(0, |quality, token| {
            let token = token.as_str();
            if self.name_tokens.iter().any(|t| t == token) {
                Some(quality + TOKEN_EXACT_SCORE)
            } else if self.name_tokens.iter().any(|t| t.starts_with(token)) {
                Some(quality + TOKEN_PREFIX_SCORE)
            } else if self.id_tokens.iter().any(|t| t.starts_with(token)) {
                Some(quality + ID_TOKEN_SCORE)
            } else {
                None
            }
        })
    }
}

struct Query {
    normalized: String,
    tokens: Vec<String>,
}

impl Query {
    fn parse(raw: &str) -> Self {
        let normalized = normalize_text(raw);
        let tokens = tokenize(&normalized).into_iter().map(String::from).collect();
        Self { normalized, tokens }
    }
}

/// Search keys for every artefact in a catalog, in catalog order
pub struct SearchIndex<'a> {
    entries: Vec<(&'a Artefact, ArtefactIndex)>,
}

impl<'a> SearchIndex<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        let entries = catalog
            .artefacts()
            .iter()
            .map(|a| (a, ArtefactIndex::new(a)))
            .collect();
        Self { entries }
    }

    /// Best matches for `query`, highest score first; equal scores keep catalog order.
    pub fn rank(&self, query: &str) -> Vec<&'a Artefact> {
        let query = Query::parse(query);
        if query.normalized.is_empty() {
            return Vec::new();
        }

        let strict = self.scored(&query, false);
        let scored = if strict.is_empty() {
            self.scored(&query, true)
        } else {
            strict
        };

        scored
            .into_iter()
            .take(MAX_RESULTS)
            .map(|(artefact, _)| artefact)
            .collect()
    }

    fn scored(&self, query: &Query, allow_fuzzy: bool) -> Vec<(&'a Artefact, i32)> {
        let mut scored: Vec<_> = self
            .entries
            .iter()
            .map(|(artefact, index)| (*artefact, index.score(query, allow_fuzzy)))
            .filter(|(_, score)| *score > 0)
            .collect();
        // stable: ties stay in catalog order
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored
    }
}

/// Rank the catalog's artefacts against `query`
pub fn rank<'a>(catalog: &'a Catalog, query: &str) -> Vec<&'a Artefact> {
    SearchIndex::new(catalog).rank(query)
}

/// Like [`rank`], returning artefact ids
pub fn rank_ids<'a>(catalog: &'a Catalog, query: &str) -> Vec<&'a str> {
    rank(catalog, query).into_iter().map(|a| a.id.as_str()).collect()
}
