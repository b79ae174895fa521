//! Calendar projection: one all-day event per task due date.

use crate::model::project::{ProjectSnapshot, TaskId, TaskListId};
use serde::Serialize;
use std::collections::HashMap;
use time::Date;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub task_id: TaskId,
    pub title: String,
    /// Single-day event date (the task due date).
    pub date: Date,
    pub list_id: TaskListId,
    /// Color of the owning list; `None` for uncolored or missing lists.
    pub list_color: Option<String>,
    pub completed: bool,
}

/// Projects tasks with a due date into events sorted by date, order, id.
///
/// Tasks without a due date are left out.
pub fn calendar_view(snapshot: &ProjectSnapshot) -> Vec<CalendarEvent> {
    let colors: HashMap<TaskListId, Option<&str>> = snapshot
        .lists
        .iter()
        .map(|list| (list.id, list.color.as_deref()))
        .collect();

    let mut tasks: Vec<_> = snapshot
        .tasks
        .iter()
        .filter_map(|task| task.due_date.map(|due| (due, task)))
        .collect();
    tasks.sort_by(|(a_due, a), (b_due, b)| {
        a_due
            .cmp(b_due)
            .then_with(|| a.order.cmp(&b.order))
            .then_with(|| a.id.cmp(&b.id))
    });

    tasks
        .into_iter()
        .map(|(date, task)| CalendarEvent {
            task_id: task.id,
            title: task.title.clone(),
            date,
            list_id: task.list_id,
            list_color: colors
                .get(&task.list_id)
                .copied()
                .flatten()
                .map(str::to_string),
            completed: task.completed,
        })
        .collect()
}

/// Events within `[from, to]`, inclusive, e.g. one displayed month.
pub fn events_between(events: &[CalendarEvent], from: Date, to: Date) -> Vec<&CalendarEvent> {
    events
        .iter()
        .filter(|event| event.date >= from && event.date <= to)
        .collect()
}
