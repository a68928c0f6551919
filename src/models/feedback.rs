// src/models/feedback.rs

use serde::{Deserialize, Serialize};

use crate::models::section::SectionKind;

/// Narrative outcome of an entrance test, keyed by test id.
/// Re-finalizing replaces, not duplicates, the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub test_id: i64,

    /// Named band the weighted level maps onto, e.g. "Advanced".
    pub level_band: String,

    /// Prose summary shown to teachers and students.
    pub summary: String,

    /// Sections scoring at or above the strength threshold.
    pub strengths: Vec<SectionKind>,

    /// Sections scoring below the focus threshold.
    pub focus_areas: Vec<SectionKind>,
}
