// src/engine/adjuster.rs

use crate::engine::config::AdaptiveConfig;
use crate::models::{level::LevelState, section::SectionRow};

/// A level change produced by the adjuster. `to` is already written back
/// to the section; the caller hands it to the propagator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelMove {
    pub from: LevelState,
    pub to: LevelState,
}

/// Applies one answer outcome to a section: updates the served/correct
/// counters and the streaks, then fires at most one level move.
///
/// The skip threshold dominates the plain threshold: an open run that
/// reaches the skip length fires a 2-step move immediately, so the plain
/// 1-step move only fires when a run of at least the plain length is
/// broken by the opposite outcome. A run of 5 consecutive correct answers
/// therefore performs a single 2-step move on the 5th answer, with no
/// intermediate move at the 3rd. A run of 3 or 4 that the student then
/// breaks fires its single step on the breaking answer.
pub fn record_answer(
    section: &mut SectionRow,
    correct: bool,
    cfg: &AdaptiveConfig,
) -> Option<LevelMove> {
    section.questions_served += 1;

    let from = section.level;
    let mut steps: i32 = 0;

    if correct {
        section.correct_count += 1;
        // A broken incorrect run past the plain threshold fires its
        // deferred 1-step move now.
        if section.consecutive_incorrect >= cfg.step_streak {
            steps = -1;
        }
        section.consecutive_incorrect = 0;
        section.consecutive_correct += 1;
        if section.consecutive_correct >= cfg.skip_streak {
            steps = 2;
            section.consecutive_correct = 0;
        }
    } else {
        if section.consecutive_correct >= cfg.step_streak {
            steps = 1;
        }
        section.consecutive_correct = 0;
        section.consecutive_incorrect += 1;
        if section.consecutive_incorrect >= cfg.skip_streak {
            steps = -2;
            section.consecutive_incorrect = 0;
        }
    }

    if steps == 0 {
        return None;
    }
    section.level = from.shift_by(steps);

    // A saturated move at the lattice edge leaves nothing to propagate.
    if section.level == from {
        return None;
    }
    Some(LevelMove { from, to: section.level })
}

/// A section at its question cap serves no further questions regardless of
/// streak state.
pub fn is_exhausted(section: &SectionRow, cfg: &AdaptiveConfig) -> bool {
    section.questions_served >= cfg.question_cap(section.kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::section::SectionKind;

    fn section_at(level: &str) -> SectionRow {
        SectionRow::seeded(1, SectionKind::Reading, level.parse().unwrap())
    }

    fn answer_n(
        section: &mut SectionRow,
        correct: bool,
        n: usize,
        cfg: &AdaptiveConfig,
    ) -> Vec<LevelMove> {
        (0..n)
            .filter_map(|_| record_answer(section, correct, cfg))
            .collect()
    }

    #[test]
    fn two_correct_in_a_row_changes_nothing() {
        let cfg = AdaptiveConfig::default();
        let mut section = section_at("2.1");
        assert!(answer_n(&mut section, true, 2, &cfg).is_empty());
        assert_eq!(section.level.to_string(), "2.1");
        assert_eq!(section.consecutive_correct, 2);
    }

    #[test]
    fn broken_streak_of_exactly_three_fires_exactly_one_up_step() {
        let cfg = AdaptiveConfig::default();
        let mut section = section_at("2.1");
        assert!(answer_n(&mut section, true, 3, &cfg).is_empty());
        // The wrong answer breaks the run and releases its single step.
        let mv = record_answer(&mut section, false, &cfg).unwrap();
        assert_eq!(mv.from.to_string(), "2.1");
        assert_eq!(mv.to.to_string(), "2.2");
        assert_eq!(section.consecutive_correct, 0);
        assert_eq!(section.consecutive_incorrect, 1);
    }

    #[test]
    fn five_consecutive_correct_is_a_single_two_step_jump() {
        let cfg = AdaptiveConfig::default();
        let mut section = section_at("2.1");
        let moves = answer_n(&mut section, true, 5, &cfg);
        // No intermediate move at the 3rd answer; one 2-step jump on the 5th.
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].from.to_string(), "2.1");
        assert_eq!(moves[0].to.to_string(), "2.3");
        assert_eq!(section.consecutive_correct, 0);
    }

    #[test]
    fn ten_consecutive_correct_jumps_twice() {
        let cfg = AdaptiveConfig::default();
        let mut section = section_at("2.1");
        let moves = answer_n(&mut section, true, 10, &cfg);
        assert_eq!(moves.len(), 2);
        assert_eq!(section.level.to_string(), "3.2");
    }

    #[test]
    fn broken_streak_of_two_changes_nothing() {
        let cfg = AdaptiveConfig::default();
        let mut section = section_at("2.1");
        answer_n(&mut section, true, 2, &cfg);
        assert!(record_answer(&mut section, false, &cfg).is_none());
        assert_eq!(section.level.to_string(), "2.1");
    }

    #[test]
    fn broken_incorrect_streak_of_three_steps_down_once() {
        let cfg = AdaptiveConfig::default();
        let mut section = section_at("3.1");
        assert!(answer_n(&mut section, false, 3, &cfg).is_empty());
        let mv = record_answer(&mut section, true, &cfg).unwrap();
        assert_eq!(mv.to.to_string(), "2.3");
        assert_eq!(section.consecutive_incorrect, 0);
        assert_eq!(section.consecutive_correct, 1);
    }

    #[test]
    fn five_consecutive_incorrect_drops_two_steps() {
        let cfg = AdaptiveConfig::default();
        let mut section = section_at("3.1");
        let moves = answer_n(&mut section, false, 5, &cfg);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].to.to_string(), "2.2");
    }

    #[test]
    fn level_never_leaves_the_lattice() {
        let cfg = AdaptiveConfig::default();
        let mut section = section_at("1.1");
        answer_n(&mut section, false, 20, &cfg);
        assert_eq!(section.level, LevelState::MIN);

        let mut section = section_at("7.3");
        answer_n(&mut section, true, 20, &cfg);
        assert_eq!(section.level, LevelState::MAX);
    }

    #[test]
    fn saturated_jump_at_the_top_still_resets_the_streak() {
        let cfg = AdaptiveConfig::default();
        let mut section = section_at("7.3");
        let moves = answer_n(&mut section, true, 5, &cfg);
        assert!(moves.is_empty());
        assert_eq!(section.consecutive_correct, 0);
    }

    #[test]
    fn counters_track_served_and_correct() {
        let cfg = AdaptiveConfig::default();
        let mut section = section_at("2.1");
        answer_n(&mut section, true, 2, &cfg);
        answer_n(&mut section, false, 1, &cfg);
        assert_eq!(section.questions_served, 3);
        assert_eq!(section.correct_count, 2);
    }

    #[test]
    fn section_exhausts_at_its_cap() {
        let cfg = AdaptiveConfig::default();
        let mut section = SectionRow::seeded(1, SectionKind::Listening, cfg.default_seed);
        for _ in 0..10 {
            assert!(!is_exhausted(&section, &cfg));
            record_answer(&mut section, true, &cfg);
        }
        assert!(is_exhausted(&section, &cfg));
    }
}
