//! Slot placement and plan ordering.
//!
//! Every function here is pure and in-memory. Operations that change a slot
//! (`shift_task`) finish with [`sort_chronologically`]; operations that only
//! reorder for display (`schedule_plan`, `resequence_for_mood`) deliberately
//! leave the plan out of chronological order until the caller sorts it.

use crate::domain::models::{Mood, Priority, Task, DEFAULT_DURATION_MINUTES};
use crate::domain::slot::{on_anchor_day, Placement, ScheduleError, Slot, WorkWindow};
use chrono::Duration;
use std::cmp::Reverse;

pub const SCAN_GRANULARITY_MINUTES: i64 = 15;
pub const CLAMP_MINUTES: i64 = 30;
pub const EVENING_LEAD_MINUTES: i64 = 90;
pub const MIN_BREAK_MINUTES: i64 = 5;
pub const FALLBACK_BREAK_MINUTES: i64 = 10;

/// Scans the window in 15 minute steps for a gap of `duration_minutes`.
///
/// When no gap exists the slot ending at `window.end` is returned even if it
/// overlaps a booking. A zero duration means the 30 minute default.
pub fn find_free_slot(booked: &[Slot], window: &WorkWindow, duration_minutes: u32) -> Slot {
    let minutes = if duration_minutes == 0 {
        DEFAULT_DURATION_MINUTES
    } else {
        duration_minutes
    };
    let duration = Duration::minutes(i64::from(minutes));
    let granularity = Duration::minutes(SCAN_GRANULARITY_MINUTES);
    let window_start = on_anchor_day(window.start());
    let window_end = on_anchor_day(window.end());

    let mut cursor = window_start;
    while cursor + duration <= window_end {
        let Ok(candidate) = Slot::from_anchored(cursor, cursor + duration) else {
            break;
        };
        if !booked.iter().any(|slot| slot.overlaps(&candidate)) {
            return candidate;
        }
        cursor += granularity;
    }

    fallback_slot(window, duration)
}

fn fallback_slot(window: &WorkWindow, duration: Duration) -> Slot {
    let window_start = on_anchor_day(window.start());
    let window_end = on_anchor_day(window.end());
    let start = (window_end - duration).max(window_start);
    Slot::from_anchored(start, window_end).unwrap_or_else(|_| window.as_slot())
}

/// Clamps an untrusted slot into the window, resizing clamped edges to 30 minutes.
pub fn clamp_to_window(candidate: &Slot, window: &WorkWindow) -> Result<Slot, ScheduleError> {
    let clamp = Duration::minutes(CLAMP_MINUTES);
    let window_start = on_anchor_day(window.start());
    let window_end = on_anchor_day(window.end());
    let mut start = on_anchor_day(candidate.start());
    let mut end = on_anchor_day(candidate.end());

    if start < window_start {
        start = window_start;
        end = start + clamp;
    }
    if end > window_end {
        end = window_end;
        start = end - clamp;
    }
    if start < window_start || end > window_end {
        return Err(ScheduleError::InvalidSlot(format!(
            "work window {} is shorter than {CLAMP_MINUTES} minutes",
            window.as_slot()
        )));
    }

    Slot::from_anchored(start, end)
}

pub fn validate_candidate(raw: &str, window: &WorkWindow) -> Result<Slot, ScheduleError> {
    let candidate = raw.trim().parse::<Slot>()?;
    clamp_to_window(&candidate, window)
}

/// Slots held by every task except `index`.
pub fn conflict_set(tasks: &[Task], index: usize) -> Vec<Slot> {
    tasks
        .iter()
        .enumerate()
        .filter(|(position, _)| *position != index)
        .filter_map(|(_, task)| task.slot.slot().copied())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub break_minutes: i64,
    pub scheduled: usize,
    pub unscheduled: usize,
}

pub fn break_minutes(tasks: &[Task], window: &WorkWindow) -> i64 {
    let total_task_minutes = tasks
        .iter()
        .map(|task| i64::from(task.duration_minutes))
        .sum::<i64>();
    let total_window_minutes = window.total_minutes();
    if !tasks.is_empty() && total_window_minutes > total_task_minutes {
        ((total_window_minutes - total_task_minutes) / tasks.len() as i64).max(MIN_BREAK_MINUTES)
    } else {
        FALLBACK_BREAK_MINUTES
    }
}

/// Non-evening tasks first, then by descending priority; ties keep input order.
pub fn priority_order(tasks: &[Task]) -> Vec<usize> {
    let mut order = (0..tasks.len()).collect::<Vec<_>>();
    order.sort_by_key(|&index| {
        let task = &tasks[index];
        (task.is_evening(), Reverse(task.priority.rank()))
    });
    order
}

/// Lays the whole plan out across the window in one pass.
///
/// On return the plan is in placement (priority) order, not chronological
/// order. Tasks that do not fit before the window closes become Unscheduled
/// and do not advance the cursor.
pub fn schedule_plan(tasks: &mut Vec<Task>, window: &WorkWindow) -> BatchSummary {
    let break_minutes = break_minutes(tasks, window);
    let gap = Duration::minutes(break_minutes);
    let order = priority_order(tasks);
    let window_start = on_anchor_day(window.start());
    let window_end = on_anchor_day(window.end());
    let evening_floor = window_end - Duration::minutes(EVENING_LEAD_MINUTES);

    let mut cursor = window_start;
    let mut summary = BatchSummary {
        break_minutes,
        scheduled: 0,
        unscheduled: 0,
    };

    for &index in &order {
        let task = &mut tasks[index];
        if task.is_evening() && cursor < evening_floor {
            cursor = cursor.max(evening_floor);
        }

        let candidate_end = cursor + Duration::minutes(i64::from(task.duration_minutes));
        let placed = if candidate_end > window_end {
            None
        } else {
            Slot::from_anchored(cursor, candidate_end).ok()
        };

        match placed {
            Some(slot) => {
                task.slot = Placement::Scheduled(slot);
                summary.scheduled += 1;
                cursor = candidate_end + gap;
            }
            None => {
                task.slot = Placement::Unscheduled;
                summary.unscheduled += 1;
            }
        }
    }

    let mut reordered = Vec::with_capacity(tasks.len());
    let mut originals = std::mem::take(tasks).into_iter().map(Some).collect::<Vec<_>>();
    for index in order {
        if let Some(task) = originals[index].take() {
            reordered.push(task);
        }
    }
    *tasks = reordered;
    summary
}

/// Stable sort by slot start; Unscheduled entries go last in their prior order.
pub fn sort_chronologically(tasks: &mut [Task]) {
    tasks.sort_by_key(|task| task.slot.sort_key());
}

pub fn shifted_slot(slot: &Slot) -> Result<Slot, ScheduleError> {
    let shift = slot.duration() * 3 / 10;
    Slot::from_anchored(
        on_anchor_day(slot.start()) + shift,
        on_anchor_day(slot.end()) + shift,
    )
    .map_err(|_| {
        ScheduleError::InvalidOperation(format!(
            "Shifting {slot} by 30% would cross midnight."
        ))
    })
}

/// Delays a task by 30% of its own duration without checking neighbours, then re-sorts.
pub fn shift_task(tasks: &mut [Task], index: usize) -> Result<Slot, ScheduleError> {
    let Some(task) = tasks.get_mut(index) else {
        return Err(ScheduleError::InvalidOperation(format!(
            "Task index {index} is invalid."
        )));
    };
    let Placement::Scheduled(slot) = task.slot else {
        return Err(ScheduleError::InvalidOperation(format!(
            "Task '{}' is unscheduled and cannot be shifted.",
            task.description
        )));
    };

    let shifted = shifted_slot(&slot)?;
    task.slot = Placement::Scheduled(shifted);
    sort_chronologically(tasks);
    Ok(shifted)
}

pub fn resequence_for_mood(tasks: &mut Vec<Task>, mood: Mood) {
    let goes_first: fn(&Task) -> bool = match mood {
        Mood::Low => |task: &Task| task.is_break_or_low() || task.priority == Priority::Low,
        Mood::Great => |task: &Task| task.priority == Priority::High,
        Mood::Neutral => return,
    };
    let (first, rest): (Vec<_>, Vec<_>) = tasks.drain(..).partition(goes_first);
    tasks.extend(first);
    tasks.extend(rest);
}
