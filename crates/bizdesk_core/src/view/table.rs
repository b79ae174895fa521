//! Flat, denormalized task table.

use super::{compare_tasks, list_ranks};
use crate::model::project::{
    ChecklistProgress, Collaborator, CollaboratorId, LabelDefinition, ProjectSnapshot, TaskId,
    TaskListId,
};
use serde::Serialize;
use std::collections::HashMap;
use time::Date;

/// Resolved assignee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssigneeDisplay {
    pub id: CollaboratorId,
    pub display_name: String,
    pub email: Option<String>,
    /// Up to two uppercase initials for avatar chips.
    pub initials: String,
}

/// Label as rendered in a row. Undefined labels keep their name, no color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelBadge {
    pub name: String,
    pub color: Option<String>,
    pub defined: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub task_id: TaskId,
    pub title: String,
    pub list_id: TaskListId,
    /// `None` when the list no longer exists.
    pub list_title: Option<String>,
    pub order: i64,
    pub start_date: Option<Date>,
    pub due_date: Option<Date>,
    pub completed: bool,
    pub checklist: ChecklistProgress,
    pub assignees: Vec<AssigneeDisplay>,
    /// Assignee ids with no matching collaborator; never listed in `assignees`.
    pub unresolved_assignee_count: usize,
    pub labels: Vec<LabelBadge>,
}

/// One row per task, ordered by list position, task order, id.
///
/// Rows of tasks whose list is missing come last.
pub fn table_view(snapshot: &ProjectSnapshot) -> Vec<TableRow> {
    let ranks = list_ranks(&snapshot.lists);
    let list_titles: HashMap<TaskListId, &str> = snapshot
        .lists
        .iter()
        .map(|list| (list.id, list.title.as_str()))
        .collect();
    let collaborators: HashMap<CollaboratorId, &Collaborator> = snapshot
        .collaborators
        .iter()
        .map(|collaborator| (collaborator.id, collaborator))
        .collect();
    let label_defs: HashMap<&str, &LabelDefinition> = snapshot
        .labels
        .iter()
        .map(|label| (label.name.as_str(), label))
        .collect();

    let mut tasks: Vec<_> = snapshot.tasks.iter().collect();
    tasks.sort_by(|a, b| {
        let a_rank = ranks.get(&a.list_id).copied().unwrap_or(usize::MAX);
        let b_rank = ranks.get(&b.list_id).copied().unwrap_or(usize::MAX);
        a_rank
            .cmp(&b_rank)
            .then_with(|| a.list_id.cmp(&b.list_id))
            .then_with(|| compare_tasks(a, b))
    });

    tasks
        .into_iter()
        .map(|task| {
            let mut assignees = Vec::with_capacity(task.assignees.len());
            let mut unresolved_assignee_count = 0;
            for id in &task.assignees {
                match collaborators.get(id) {
                    Some(collaborator) => assignees.push(AssigneeDisplay {
                        id: *id,
                        display_name: collaborator.display_name.clone(),
                        email: collaborator.email.clone(),
                        initials: initials(&collaborator.display_name),
                    }),
                    None => unresolved_assignee_count += 1,
                }
            }

            let labels = task
                .labels
                .iter()
                .map(|name| match label_defs.get(name.as_str()) {
                    Some(definition) => LabelBadge {
                        name: name.clone(),
                        color: Some(definition.color.clone()),
                        defined: true,
                    },
                    None => LabelBadge {
                        name: name.clone(),
                        color: None,
                        defined: false,
                    },
                })
                .collect();

            TableRow {
                task_id: task.id,
                title: task.title.clone(),
                list_id: task.list_id,
                list_title: list_titles.get(&task.list_id).map(|title| title.to_string()),
                order: task.order,
                start_date: task.start_date,
                due_date: task.due_date,
                completed: task.completed,
                checklist: task.checklist_progress(),
                assignees,
                unresolved_assignee_count,
                labels,
            }
        })
        .collect()
}

fn initials(display_name: &str) -> String {
    display_name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::initials;

    #[test]
    fn initials_use_first_two_words() {
        assert_eq!(initials("ana marija petrović"), "AM");
        assert_eq!(initials("Mika"), "M");
        assert_eq!(initials("   "), "");
    }
}
