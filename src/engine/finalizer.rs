// src/engine/finalizer.rs

use crate::engine::config::AdaptiveConfig;
use crate::error::AppError;
use crate::models::{
    feedback::FeedbackRecord,
    section::{SectionKind, SectionRow},
    test::{FinalizeResponse, TestRow, TestStatus, TestType},
};
use crate::store::{Clock, FeedbackSink, TestStore};

/// Per-section result of the aggregation step.
#[derive(Debug, Clone)]
pub struct SectionOutcome {
    pub kind: SectionKind,
    /// Percentage 0-100, one decimal. 0 when nothing was served.
    pub score: f64,
    /// The recorded final level if present, else the current level.
    pub level_value: f64,
}

/// Test-wide aggregate over all section rows.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub outcomes: Vec<SectionOutcome>,
    /// Weighted average of section levels; absent (not zero) when the
    /// configured weights over the present sections sum to 0.
    pub weighted_level: Option<f64>,
    /// Mean of the per-section scores, one decimal.
    pub total_score: f64,
    /// Overall correct/served percentage, one decimal.
    pub accuracy: f64,
}

pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Aggregates section rows into scores and the weighted overall level.
pub fn compute(sections: &[SectionRow], cfg: &AdaptiveConfig) -> Aggregate {
    let mut outcomes = Vec::with_capacity(sections.len());
    let mut weight_sum = 0.0;
    let mut weighted_sum = 0.0;
    let mut total_correct = 0i64;
    let mut total_served = 0i64;

    for row in sections {
        let score = if row.questions_served > 0 {
            round1(row.correct_count as f64 / row.questions_served as f64 * 100.0)
        } else {
            0.0
        };
        let level_value = row.final_level.unwrap_or(row.level).as_value();

        let weight = cfg.weight(row.kind);
        weight_sum += weight;
        weighted_sum += weight * level_value;
        total_correct += row.correct_count as i64;
        total_served += row.questions_served as i64;

        outcomes.push(SectionOutcome { kind: row.kind, score, level_value });
    }

    let weighted_level = if weight_sum > 0.0 {
        Some(round1(weighted_sum / weight_sum))
    } else {
        None
    };
    let total_score = if outcomes.is_empty() {
        0.0
    } else {
        round1(outcomes.iter().map(|o| o.score).sum::<f64>() / outcomes.len() as f64)
    };
    let accuracy = if total_served > 0 {
        round1(total_correct as f64 / total_served as f64 * 100.0)
    } else {
        0.0
    };

    Aggregate { outcomes, weighted_level, total_score, accuracy }
}

/// Builds the narrative feedback for an entrance test: the named band of
/// the weighted level plus strengths (sections at or above the strength
/// threshold) and focus areas (sections below the focus threshold). The
/// two sets are independent; a section can appear in neither.
pub fn build_feedback(
    test_id: i64,
    weighted_level: f64,
    aggregate: &Aggregate,
    cfg: &AdaptiveConfig,
) -> FeedbackRecord {
    let band = cfg.level_band(weighted_level);
    let strengths: Vec<SectionKind> = aggregate
        .outcomes
        .iter()
        .filter(|o| o.score >= cfg.strength_threshold)
        .map(|o| o.kind)
        .collect();
    let focus_areas: Vec<SectionKind> = aggregate
        .outcomes
        .iter()
        .filter(|o| o.score < cfg.focus_threshold)
        .map(|o| o.kind)
        .collect();

    let join = |kinds: &[SectionKind]| {
        kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut summary = format!(
        "Placed at {} (level {:.1}). Overall score {:.1} with {:.1}% accuracy.",
        band, weighted_level, aggregate.total_score, aggregate.accuracy
    );
    if !strengths.is_empty() {
        summary.push_str(&format!(" Strong performance in {}.", join(&strengths)));
    }
    if !focus_areas.is_empty() {
        summary.push_str(&format!(" Recommended focus areas: {}.", join(&focus_areas)));
    }

    FeedbackRecord {
        test_id,
        level_band: band.to_string(),
        summary,
        strengths,
        focus_areas,
    }
}

/// Finalizes a test: aggregates the current section rows, persists the
/// per-section scores and the test-level outcome, and for entrance tests
/// upserts the narrative feedback.
///
/// Safe to call again on an already completed test; it recomputes from the
/// rows as stored. Score and level persistence is the primary contract;
/// a feedback upsert failure is logged and does not fail the call.
pub async fn finalize_test(
    store: &dyn TestStore,
    sink: &dyn FeedbackSink,
    clock: &dyn Clock,
    test: &TestRow,
    cfg: &AdaptiveConfig,
) -> Result<FinalizeResponse, AppError> {
    let sections = store.get_sections(test.id).await?;
    let aggregate = compute(&sections, cfg);
    let now = clock.now();

    // Prefer the heartbeat-maintained elapsed time; derive from the start
    // stamp only when no heartbeat ever landed.
    let elapsed_ms = if test.elapsed_ms > 0 {
        test.elapsed_ms
    } else {
        let began = test.started_at.unwrap_or(test.assigned_at);
        (now - began).num_milliseconds().clamp(0, test.time_limit_ms())
    };

    for (row, outcome) in sections.iter().zip(&aggregate.outcomes) {
        let mut row = row.clone();
        row.completed = true;
        row.score = Some(outcome.score);
        if row.final_level.is_none() {
            row.final_level = Some(row.level);
        }
        store.put_section(&row).await?;
    }

    let mut updated = test.clone();
    if updated.status.can_transition(TestStatus::Completed) {
        updated.status = TestStatus::Completed;
    }
    updated.completed_at = Some(now);
    updated.elapsed_ms = elapsed_ms;
    updated.total_score = Some(aggregate.total_score);
    updated.weighted_level = aggregate.weighted_level;
    store.put_test(&updated).await?;

    if updated.test_type == TestType::Entrance {
        if let Some(weighted_level) = aggregate.weighted_level {
            let record = build_feedback(test.id, weighted_level, &aggregate, cfg);
            if let Err(e) = sink.upsert_feedback(&record).await {
                tracing::error!("Failed to upsert feedback for test {}: {}", test.id, e);
            }
        }
    }

    Ok(FinalizeResponse {
        weighted_level: aggregate.weighted_level,
        total_score: aggregate.total_score,
    })
}
