//! Kanban board grouping.

use super::{compare_tasks, sorted_lists};
use crate::model::project::{ChecklistProgress, ProjectSnapshot, ProjectTask, TaskListId};
use log::warn;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardCard {
    pub task: ProjectTask,
    pub checklist: ChecklistProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardColumn {
    pub list_id: TaskListId,
    pub title: String,
    pub color: Option<String>,
    pub cards: Vec<BoardCard>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardView {
    pub columns: Vec<BoardColumn>,
    /// Tasks whose `list_id` matches no list of the project.
    pub unassigned: Vec<BoardCard>,
}

impl BoardView {
    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|column| column.cards.len()).sum::<usize>() + self.unassigned.len()
    }
}

/// Groups tasks into one column per list.
///
/// Every task lands in exactly one bucket: its list's column, or
/// `unassigned` when the list no longer exists.
pub fn board_view(snapshot: &ProjectSnapshot) -> BoardView {
    let lists = sorted_lists(&snapshot.lists);
    let mut grouped: HashMap<TaskListId, Vec<&ProjectTask>> = lists
        .iter()
        .map(|list| (list.id, Vec::new()))
        .collect();
    let mut orphans: Vec<&ProjectTask> = Vec::new();

    for task in &snapshot.tasks {
        match grouped.get_mut(&task.list_id) {
            Some(bucket) => bucket.push(task),
            None => {
                warn!(
                    "event=board_orphan_task module=view status=warn task_id={} list_id={}",
                    task.id, task.list_id
                );
                orphans.push(task);
            }
        }
    }

    let columns = lists
        .into_iter()
        .map(|list| {
            let tasks = grouped.remove(&list.id).unwrap_or_default();
            BoardColumn {
                list_id: list.id,
                title: list.title.clone(),
                color: list.color.clone(),
                cards: into_cards(tasks),
            }
        })
        .collect();

    BoardView {
        columns,
        unassigned: into_cards(orphans),
    }
}

fn into_cards(mut tasks: Vec<&ProjectTask>) -> Vec<BoardCard> {
    tasks.sort_by(|a, b| compare_tasks(a, b));
    tasks
        .into_iter()
        .map(|task| BoardCard {
            checklist: task.checklist_progress(),
            task: task.clone(),
        })
        .collect()
}
