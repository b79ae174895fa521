//! Gantt timeline layout.
//!
//! Bars are positioned on a shared day axis spanning all due dates padded by
//! `GANTT_PADDING_DAYS` on both sides. Offsets and widths are percentages of
//! the axis length.

use super::list_ranks;
use crate::model::project::{ProjectSnapshot, ProjectTask, TaskId, TaskListId};
use serde::Serialize;
use time::{Date, Duration};

/// Days added before the earliest and after the latest due date.
pub const GANTT_PADDING_DAYS: i64 = 5;
/// Axis length when no task has a due date.
pub const GANTT_DEFAULT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GanttStatus {
    Completed,
    /// Due date before today and not completed.
    Overdue,
    OnTrack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GanttAxis {
    pub start: Date,
    pub end: Date,
    pub total_days: i64,
}

impl GanttAxis {
    fn percent_of(&self, days: i64) -> f64 {
        days as f64 / self.total_days as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GanttBar {
    pub task_id: TaskId,
    pub title: String,
    pub list_id: TaskListId,
    pub start: Date,
    pub due: Date,
    /// `true` when `start` was derived as `due - GANTT_PADDING_DAYS`.
    pub synthetic_start: bool,
    pub offset_percent: f64,
    pub width_percent: f64,
    pub status: GanttStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GanttView {
    pub axis: GanttAxis,
    pub bars: Vec<GanttBar>,
    /// Tasks without a due date, in table order.
    pub unscheduled: Vec<TaskId>,
}

/// Lays out every task with a due date on a shared axis.
pub fn gantt_view(snapshot: &ProjectSnapshot, today: Date) -> GanttView {
    let ranks = list_ranks(&snapshot.lists);
    let mut tasks: Vec<&ProjectTask> = snapshot.tasks.iter().collect();
    tasks.sort_by(|a, b| {
        let a_rank = ranks.get(&a.list_id).copied().unwrap_or(usize::MAX);
        let b_rank = ranks.get(&b.list_id).copied().unwrap_or(usize::MAX);
        a_rank
            .cmp(&b_rank)
            .then_with(|| a.order.cmp(&b.order))
            .then_with(|| a.id.cmp(&b.id))
    });

    let (scheduled, unscheduled): (Vec<&ProjectTask>, Vec<&ProjectTask>) =
        tasks.into_iter().partition(|task| task.due_date.is_some());

    let spans: Vec<(&ProjectTask, Date, Date, bool)> = scheduled
        .into_iter()
        .filter_map(|task| {
            let due = task.due_date?;
            let (start, synthetic) = match task.start_date {
                Some(start) => (start, false),
                None => (days_before(due, GANTT_PADDING_DAYS), true),
            };
            Some((task, start, due, synthetic))
        })
        .collect();

    let axis = compute_axis(&spans, today);
    let mut bars: Vec<GanttBar> = spans
        .into_iter()
        .map(|(task, start, due, synthetic_start)| GanttBar {
            task_id: task.id,
            title: task.title.clone(),
            list_id: task.list_id,
            start,
            due,
            synthetic_start,
            offset_percent: axis.percent_of((start - axis.start).whole_days()),
            width_percent: axis.percent_of((due - start).whole_days().max(0)),
            status: status_of(task, due, today),
        })
        .collect();
    // Stable: equal (start, due) keep list/order/id order from above.
    bars.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.due.cmp(&b.due)));

    GanttView {
        axis,
        bars,
        unscheduled: unscheduled.into_iter().map(|task| task.id).collect(),
    }
}

fn compute_axis(spans: &[(&ProjectTask, Date, Date, bool)], today: Date) -> GanttAxis {
    let min_due = spans.iter().map(|(_, _, due, _)| *due).min();
    let max_due = spans.iter().map(|(_, _, due, _)| *due).max();

    let (start, end) = match (min_due, max_due) {
        (Some(min_due), Some(max_due)) => {
            let padded_start = days_before(min_due, GANTT_PADDING_DAYS);
            // Explicit start dates earlier than the padded axis widen it.
            let earliest_explicit = spans
                .iter()
                .filter(|(_, _, _, synthetic)| !synthetic)
                .map(|(_, start, _, _)| *start)
                .min();
            let start =
                earliest_explicit.map_or(padded_start, |explicit| explicit.min(padded_start));
            (start, days_after(max_due, GANTT_PADDING_DAYS))
        }
        _ => (today, days_after(today, GANTT_DEFAULT_WINDOW_DAYS)),
    };

    GanttAxis {
        start,
        end,
        total_days: (end - start).whole_days().max(1),
    }
}

fn status_of(task: &ProjectTask, due: Date, today: Date) -> GanttStatus {
    if task.completed {
        GanttStatus::Completed
    } else if due < today {
        GanttStatus::Overdue
    } else {
        GanttStatus::OnTrack
    }
}

fn days_before(date: Date, days: i64) -> Date {
    date.saturating_sub(Duration::days(days))
}

fn days_after(date: Date, days: i64) -> Date {
    date.saturating_add(Duration::days(days))
}
