// src/engine/config.rs

use std::collections::HashMap;

use crate::models::{level::LevelState, section::SectionKind};

/// Tuning knobs of the adaptive engine. One instance is built at startup
/// and shared read-only across requests.
#[derive(Debug, Clone)]
pub struct AdaptiveConfig {
    /// Order in which sections are created and presented.
    pub section_order: Vec<SectionKind>,

    /// Per-section cap on questions served; a section at its cap is
    /// exhausted and serves nothing further.
    pub question_caps: HashMap<SectionKind, i32>,

    /// Per-section weights for the finalizer's weighted level.
    pub weights: HashMap<SectionKind, f64>,

    /// Parallel dependents per section: when the key section's level moves,
    /// each listed section is shifted by the paired step offset as long as
    /// it has not started. Cascades transitively.
    pub dependents: HashMap<SectionKind, Vec<(SectionKind, i32)>>,

    /// Consecutive same-outcome answers that trigger a 1-step move.
    pub step_streak: i32,

    /// Consecutive same-outcome answers that trigger a 2-step move.
    /// Checked before `step_streak`, so a run of exactly this length
    /// produces a single 2-step move.
    pub skip_streak: i32,

    /// Level used when a seed entry is missing or malformed.
    pub default_seed: LevelState,

    /// A section scoring at or above this percentage counts as a strength.
    pub strength_threshold: f64,

    /// A section scoring below this percentage counts as a focus area.
    pub focus_threshold: f64,

    /// Ordered band table: (inclusive lower bound of weighted level, name).
    /// A value below every bound falls back to the first band.
    pub level_bands: Vec<(f64, &'static str)>,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        let mut question_caps = HashMap::new();
        question_caps.insert(SectionKind::Reading, 20);
        question_caps.insert(SectionKind::Grammar, 15);
        question_caps.insert(SectionKind::Listening, 10);
        question_caps.insert(SectionKind::Dialog, 10);

        let mut weights = HashMap::new();
        weights.insert(SectionKind::Reading, 0.4);
        weights.insert(SectionKind::Grammar, 0.3);
        weights.insert(SectionKind::Listening, 0.2);
        weights.insert(SectionKind::Dialog, 0.1);

        // Reading runs first and drives the chain; listening and dialog
        // start one step easier than the section feeding them.
        let mut dependents = HashMap::new();
        dependents.insert(SectionKind::Reading, vec![(SectionKind::Grammar, 0)]);
        dependents.insert(SectionKind::Grammar, vec![(SectionKind::Listening, -1)]);
        dependents.insert(SectionKind::Listening, vec![(SectionKind::Dialog, 0)]);

        Self {
            section_order: vec![
                SectionKind::Reading,
                SectionKind::Grammar,
                SectionKind::Listening,
                SectionKind::Dialog,
            ],
            question_caps,
            weights,
            dependents,
            step_streak: 3,
            skip_streak: 5,
            default_seed: LevelState { level: 2, sublevel: 1 },
            strength_threshold: 80.0,
            focus_threshold: 70.0,
            level_bands: vec![
                (0.0, "Emerging Intermediate"),
                (3.4, "Intermediate"),
                (5.0, "Upper Intermediate"),
                (6.2, "Pre-Advanced"),
                (7.1, "Advanced"),
            ],
        }
    }
}

impl AdaptiveConfig {
    pub fn question_cap(&self, kind: SectionKind) -> i32 {
        self.question_caps.get(&kind).copied().unwrap_or(0)
    }

    pub fn weight(&self, kind: SectionKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    /// Maps a weighted level onto its named band. Values below every bound
    /// fall back to the lowest band rather than erroring.
    pub fn level_band(&self, value: f64) -> &'static str {
        let mut band = self
            .level_bands
            .first()
            .map(|(_, name)| *name)
            .unwrap_or("Unrated");
        for (bound, name) in &self.level_bands {
            if value >= *bound {
                band = name;
            } else {
                break;
            }
        }
        band
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_lookup_uses_half_open_ranges() {
        let cfg = AdaptiveConfig::default();
        assert_eq!(cfg.level_band(0.0), "Emerging Intermediate");
        assert_eq!(cfg.level_band(3.3), "Emerging Intermediate");
        assert_eq!(cfg.level_band(3.4), "Intermediate");
        assert_eq!(cfg.level_band(7.0), "Pre-Advanced");
        assert_eq!(cfg.level_band(7.3), "Advanced");
    }

    #[test]
    fn band_lookup_falls_back_to_lowest_band_below_range() {
        let cfg = AdaptiveConfig::default();
        assert_eq!(cfg.level_band(-1.0), "Emerging Intermediate");
    }
}
