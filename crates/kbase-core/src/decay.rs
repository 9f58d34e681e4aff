//! Confidence decay (§4.5): a pure function, no store access.

use chrono::{DateTime, Utc};

use crate::model::{Entry, EntryType};

/// Below this effective confidence, a result is excluded unless
/// `include_stale` is set.
pub const FILTER_THRESHOLD: f32 = 0.3;

/// Below this (but at/above the filter threshold), a staleness warning is
/// attached to the result.
pub const WARN_THRESHOLD: f32 = 0.5;

/// `effective = base * 2^(-age_days / half_life(type))`, anchored to
/// `max(updated_at, last_accessed)`.
pub fn effective_confidence(
    base_confidence: f32,
    entry_type: EntryType,
    updated_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f32 {
    let anchor = updated_at.max(last_accessed);
    let age_days = (now - anchor).num_milliseconds() as f64 / 86_400_000.0;
    let half_life = entry_type.half_life_days();
    let decay = 2f64.powf(-age_days.max(0.0) / half_life);
    (base_confidence as f64 * decay) as f32
}

pub fn effective_confidence_for(entry: &Entry, now: DateTime<Utc>) -> f32 {
    effective_confidence(
        entry.base_confidence,
        entry.entry_type,
        entry.updated_at,
        entry.last_accessed,
        now,
    )
}

pub fn is_stale(confidence: f32) -> bool {
    confidence < FILTER_THRESHOLD
}

pub fn needs_warning(confidence: f32) -> bool {
    (FILTER_THRESHOLD..WARN_THRESHOLD).contains(&confidence)
}
