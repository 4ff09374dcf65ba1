//! Free-text academic branch resolution against a fixed canonical catalog.

use std::fmt::Debug;

use serde::Serialize;
use tracing::debug;

use crate::config::MatcherConfig;

pub const DEFAULT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_FALLBACK_BRANCH: &str = "Other";

/// Canonical branches in tie-break order.
pub const STANDARD_CATALOG: [&str; 8] = [
    "Computer Science",
    "Information Technology",
    "Electronics and Communication",
    "Electrical Engineering",
    "Mechanical Engineering",
    "Civil Engineering",
    "Chemical Engineering",
    "Biotechnology",
];

const STOPWORDS: [&str; 5] = ["and", "of", "the", "in", "for"];

/// Normalized similarity in `[0, 1]` between a free-text input and a catalog entry.
pub trait SimilarityMeasure: Send + Sync + Debug {
    fn score(&self, input: &str, candidate: &str) -> f64;
}

/// Selects one of the shipped measures from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureKind {
    TokenOverlap,
    EditDistance,
}

impl MeasureKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "token" | "token_overlap" => Some(Self::TokenOverlap),
            "edit" | "edit_distance" | "levenshtein" => Some(Self::EditDistance),
            _ => None,
        }
    }

    pub fn build(self) -> Box<dyn SimilarityMeasure> {
        match self {
            Self::TokenOverlap => Box::new(TokenOverlap),
            Self::EditDistance => Box::new(EditDistance),
        }
    }
}

/// Dice coefficient over abbreviation-aware token pairs, with a single-token
/// acronym rule (`cse`, `it`, `me`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOverlap;

impl SimilarityMeasure for TokenOverlap {
    fn score(&self, input: &str, candidate: &str) -> f64 {
        let left = tokens(input);
        let right = tokens(candidate);
        if left.is_empty() || right.is_empty() {
            return 0.0;
        }

        let mut used = vec![false; right.len()];
        let mut pairs = 0usize;
        for token in &left {
            let hit = right
                .iter()
                .enumerate()
                .find(|(idx, other)| !used[*idx] && abbreviates(token, other));
            if let Some((idx, _)) = hit {
                used[idx] = true;
                pairs += 1;
            }
        }

        let dice = (2 * pairs) as f64 / (left.len() + right.len()) as f64;
        dice.max(acronym_score(&left, &right))
    }
}

/// Normalized Levenshtein similarity over the normalized token strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditDistance;

impl SimilarityMeasure for EditDistance {
    fn score(&self, input: &str, candidate: &str) -> f64 {
        let left = tokens(input).join(" ");
        let right = tokens(candidate).join(" ");
        if left.is_empty() || right.is_empty() {
            return 0.0;
        }
        strsim::normalized_levenshtein(&left, &right)
    }
}

fn tokens(value: &str) -> Vec<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
        .collect()
}

/// Tokens match when they share a first character and the shorter one is a
/// subsequence of the longer (`engg` abbreviates `engineering`).
fn abbreviates(left: &str, right: &str) -> bool {
    if left == right {
        return true;
    }
    let (short, long) = if left.len() <= right.len() {
        (left, right)
    } else {
        (right, left)
    };
    if short.chars().count() < 2 || short.chars().next() != long.chars().next() {
        return false;
    }

    let mut remaining = long.chars();
    short
        .chars()
        .all(|needle| remaining.by_ref().any(|c| c == needle))
}

fn acronym_score(left: &[String], right: &[String]) -> f64 {
    let [token] = left else {
        return 0.0;
    };
    if right.len() < 2 || token.chars().count() < 2 {
        return 0.0;
    }

    let initials: String = right.iter().filter_map(|word| word.chars().next()).collect();
    if token.starts_with(&initials) {
        initials.chars().count() as f64 / token.chars().count() as f64
    } else {
        0.0
    }
}

/// Result of resolving one free-text branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchMatch {
    pub canonical: String,
    pub score: f64,
    /// False when the best score fell below the threshold and the fallback was used.
    pub accepted: bool,
}

/// Stateless resolver over an ordered catalog.
#[derive(Debug)]
pub struct BranchMatcher {
    catalog: Vec<String>,
    threshold: f64,
    fallback: String,
    measure: Box<dyn SimilarityMeasure>,
}

impl BranchMatcher {
    pub fn new<I, S>(catalog: I, config: &MatcherConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_measure(catalog, config, config.measure.build())
    }

    pub fn with_measure<I, S>(
        catalog: I,
        config: &MatcherConfig,
        measure: Box<dyn SimilarityMeasure>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            catalog: catalog.into_iter().map(Into::into).collect(),
            threshold: config.threshold,
            fallback: config.fallback.clone(),
            measure,
        }
    }

    pub fn standard(config: &MatcherConfig) -> Self {
        Self::new(STANDARD_CATALOG, config)
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    pub fn match_branch(&self, free_text: &str) -> BranchMatch {
        let mut best: Option<(&str, f64)> = None;
        for entry in &self.catalog {
            let score = self.measure.score(free_text, entry);
            debug!(input = free_text, candidate = %entry, score, "branch similarity");
            // Strict comparison keeps the earliest entry on ties.
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((entry.as_str(), score));
            }
        }

        match best {
            Some((entry, score)) if score >= self.threshold => BranchMatch {
                canonical: entry.to_string(),
                score,
                accepted: true,
            },
            other => BranchMatch {
                canonical: self.fallback.clone(),
                score: other.map_or(0.0, |(_, score)| score),
                accepted: false,
            },
        }
    }
}
