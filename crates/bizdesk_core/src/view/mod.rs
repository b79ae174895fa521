//! Read-only projections over one project snapshot.
//!
//! # Responsibility
//! - Derive board, table, calendar and gantt views from flat task/list data.
//!
//! # Invariants
//! - Views are pure functions of `(snapshot, today)`: no store access, no
//!   caching, no mutation of the snapshot.
//! - Every ordering ends with an id tie-break, so recomputation on unchanged
//!   input yields identical output.
//! - Unresolvable references (list, collaborator, label) never fail a view
//!   and never drop the owning task; only the calendar filters tasks, and
//!   only by missing due date.

pub mod board;
pub mod calendar;
pub mod gantt;
pub mod table;

use crate::model::project::{ProjectTask, TaskList, TaskListId};
use std::cmp::Ordering;
use std::collections::HashMap;

pub use board::{board_view, BoardCard, BoardColumn, BoardView};
pub use calendar::{calendar_view, events_between, CalendarEvent};
pub use gantt::{gantt_view, GanttAxis, GanttBar, GanttStatus, GanttView};
pub use table::{table_view, AssigneeDisplay, LabelBadge, TableRow};

/// Position of each list in board order; lists missing here are orphans.
pub(crate) fn list_ranks(lists: &[TaskList]) -> HashMap<TaskListId, usize> {
    sorted_lists(lists)
        .into_iter()
        .enumerate()
        .map(|(rank, list)| (list.id, rank))
        .collect()
}

/// Lists ordered by `order`, then id.
pub(crate) fn sorted_lists(lists: &[TaskList]) -> Vec<&TaskList> {
    let mut sorted: Vec<&TaskList> = lists.iter().collect();
    sorted.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
    sorted
}

/// Task order inside one list: `order`, then id.
pub(crate) fn compare_tasks(a: &ProjectTask, b: &ProjectTask) -> Ordering {
    a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id))
}
