//! Work list selection: kind filter, resume filter, and chronological ordering.
//!
//! Downloads proceed oldest first so that, if a run is interrupted, the resume marker
//! reflects genuine historical progress rather than an arbitrary position.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::history::HistoryEvent;
use crate::types::{RecordingId, WorkItem, WorkItemLayout};

/// Filters applied to the raw event list
#[derive(Clone, Debug, Default)]
pub struct SelectionCriteria {
    /// Keep only events of this kind (case-insensitive, exact)
    pub kind: Option<String>,
    /// Keep only events newer than this previously completed recording
    pub resume_from: Option<RecordingId>,
}

/// Ordered work list plus what the filters did, for logging
#[derive(Clone, Debug)]
pub struct Selection {
    /// Work items, oldest first
    pub items: Vec<WorkItem>,
    /// Timestamp of the resume marker when the resume filter was applied
    pub resume_cutoff: Option<DateTime<Utc>>,
    /// Events dropped for lacking a usable timestamp or identifier
    pub dropped_undated: usize,
}

impl Selection {
    /// Nothing left to download
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn kind_matches(event: &HistoryEvent, wanted: &str) -> bool {
    event
        .kind
        .as_deref()
        .is_some_and(|kind| kind.to_lowercase() == wanted.to_lowercase())
}

/// Turn raw history events into the ordered work list
pub fn select_work_items(
    events: Vec<HistoryEvent>,
    criteria: &SelectionCriteria,
    layout: &WorkItemLayout,
) -> Selection {
    let mut events = events;

    if let Some(wanted) = criteria.kind.as_deref().filter(|k| !k.is_empty()) {
        events.retain(|event| kind_matches(event, wanted));
    }

    // Resume only applies when the marker is found in the (kind-filtered) list;
    // an unknown marker leaves the list untouched.
    let resume_cutoff = criteria.resume_from.and_then(|marker| {
        events
            .iter()
            .find(|event| event.recording_id() == Some(marker))
            .and_then(HistoryEvent::created_at_utc)
    });
    if let Some(cutoff) = resume_cutoff {
        events.retain(|event| event.created_at_utc().is_some_and(|at| at > cutoff));
    }

    let mut seen = HashSet::with_capacity(events.len());
    let mut dropped_undated = 0;
    let mut items = Vec::with_capacity(events.len());
    for event in events {
        let (Some(id), Some(created_at)) = (event.recording_id(), event.created_at_utc()) else {
            dropped_undated += 1;
            continue;
        };
        if !seen.insert(id) {
            tracing::debug!(recording_id = %id, "Dropping repeated history event");
            continue;
        }
        items.push(WorkItem::new(
            id,
            created_at,
            event.kind.unwrap_or_default(),
            layout,
        ));
    }

    items.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(&b.id()))
    });

    if dropped_undated > 0 {
        tracing::debug!(
            dropped = dropped_undated,
            "Dropped history events without a usable timestamp or id"
        );
    }

    Selection {
        items,
        resume_cutoff,
        dropped_undated,
    }
}
