// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Catalog matcher — scores recognized text against every catalog entry and
// picks the closest one within the threshold.
//
// Scores are distances in [0, 1]: 0 is an exact match, 1 shares nothing.
// Comparison is case-insensitive.

use labelscan_core::error::Result;
use labelscan_core::{MatchCandidate, MatcherConfig, ScorerKind};
use tracing::{debug, instrument};

use crate::catalog::Catalog;

/// Fuzzy matcher over a [`Catalog`].
#[derive(Debug, Clone, Copy)]
pub struct CatalogMatcher {
    config: MatcherConfig,
}

impl Default for CatalogMatcher {
    fn default() -> Self {
        Self {
            config: MatcherConfig::default(),
        }
    }
}

impl CatalogMatcher {
    pub fn new(config: MatcherConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Distance between `text` and `candidate`.
    pub fn score(&self, text: &str, candidate: &str) -> f64 {
        let a = text.trim().to_lowercase();
        let b = candidate.trim().to_lowercase();
        let similarity = match self.config.scorer {
            ScorerKind::SorensenDice => strsim::sorensen_dice(&a, &b),
            ScorerKind::NormalizedLevenshtein => strsim::normalized_levenshtein(&a, &b),
            ScorerKind::JaroWinkler => strsim::jaro_winkler(&a, &b),
        };
        (1.0 - similarity).clamp(0.0, 1.0)
    }

    /// Every entry scoring at or below the threshold, best first.
    ///
    /// Entries with equal scores keep catalog order.
    #[instrument(skip(self, catalog), fields(entries = catalog.len()))]
    pub fn rank(&self, text: &str, catalog: &Catalog) -> Vec<MatchCandidate> {
        let mut candidates: Vec<MatchCandidate> = catalog
            .iter()
            .map(|entry| MatchCandidate {
                score: self.score(text, &entry.text),
                entry: entry.clone(),
            })
            .filter(|candidate| candidate.score <= self.config.threshold)
            .collect();

        // Stable sort: ties stay in catalog order.
        candidates.sort_by(|a, b| a.score.total_cmp(&b.score));
        debug!(
            survivors = candidates.len(),
            threshold = self.config.threshold,
            "Catalog ranked"
        );
        candidates
    }

    /// The best candidate, or `None` when nothing is within the threshold.
    pub fn best_match(&self, text: &str, catalog: &Catalog) -> Option<MatchCandidate> {
        self.rank(text, catalog).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiles() -> Catalog {
        Catalog::new(["Red Brick Tile", "Blue Ceramic Tile"])
    }

    #[test]
    fn misread_letter_still_matches() {
        let matcher = CatalogMatcher::default();
        let best = matcher.best_match("Red Brlck Tile", &tiles()).unwrap();
        assert_eq!(best.entry.text, "Red Brick Tile");
        assert_eq!(best.entry.index, 0);
        assert!(best.score < 0.6, "score {}", best.score);
    }

    #[test]
    fn unrelated_text_has_no_match() {
        let matcher = CatalogMatcher::default();
        assert!(matcher.rank("Green Slate Tile", &tiles()).is_empty());
        assert!(matcher.best_match("Green Slate Tile", &tiles()).is_none());
    }

    #[test]
    fn matching_ignores_case() {
        let matcher = CatalogMatcher::default();
        assert_eq!(matcher.score("RED BRICK TILE", "Red Brick Tile"), 0.0);
    }

    #[test]
    fn results_are_sorted_with_catalog_order_on_ties() {
        let catalog = Catalog::new([
            "Blue Ceramic Tile",
            "Red Brick Tile",
            "Red Brick Tiles",
            "Red Brick Tile",
        ]);
        let matcher = CatalogMatcher::new(MatcherConfig {
            threshold: 1.0,
            ..Default::default()
        })
        .unwrap();

        let ranked = matcher.rank("Red Brick Tile", &catalog);
        assert_eq!(ranked.len(), 4);
        for pair in ranked.windows(2) {
            assert!(pair[0].score <= pair[1].score);
        }
        // The two exact copies tie at 0 and keep their catalog order.
        assert_eq!(ranked[0].entry.index, 1);
        assert_eq!(ranked[1].entry.index, 3);
        assert_eq!(ranked[3].entry.index, 0);
    }

    #[test]
    fn nothing_above_threshold_is_returned() {
        let catalog = Catalog::new(["Red Brick Tile", "Blue Ceramic Tile", "Red Tile Grout"]);
        for threshold in [0.0, 0.2, 0.45, 0.6, 0.8] {
            let matcher = CatalogMatcher::new(MatcherConfig {
                threshold,
                ..Default::default()
            })
            .unwrap();
            for candidate in matcher.rank("Red Tile", &catalog) {
                assert!(candidate.score <= threshold);
            }
        }
    }

    #[test]
    fn tight_threshold_excludes_near_miss() {
        let matcher = CatalogMatcher::new(MatcherConfig {
            threshold: 0.1,
            ..Default::default()
        })
        .unwrap();
        assert!(matcher.best_match("Red Brlck Tile", &tiles()).is_none());
    }

    #[test]
    fn levenshtein_scorer_also_corrects_misread() {
        let matcher = CatalogMatcher::new(MatcherConfig {
            threshold: 0.6,
            scorer: ScorerKind::NormalizedLevenshtein,
        })
        .unwrap();
        let best = matcher.best_match("Red Brlck Tile", &tiles()).unwrap();
        assert_eq!(best.entry.text, "Red Brick Tile");
    }

    #[test]
    fn empty_catalog_never_matches() {
        let matcher = CatalogMatcher::default();
        assert!(matcher.best_match("Red Brick Tile", &Catalog::default()).is_none());
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        assert!(CatalogMatcher::new(MatcherConfig {
            threshold: f64::NAN,
            ..Default::default()
        })
        .is_err());
    }
}
