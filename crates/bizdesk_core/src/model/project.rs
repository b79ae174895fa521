//! Project board domain model.
//!
//! # Responsibility
//! - Define projects, task lists, tasks, collaborators and label definitions.
//! - Provide the snapshot shape consumed by every derived view.
//!
//! # Invariants
//! - A task belongs to exactly one list through `list_id` (back-reference).
//! - A list belongs to exactly one project.
//! - `start_date` must not be after `due_date` when both are set.
//! - Task labels reference label definitions by name only; definitions may be
//!   missing and consumers must degrade instead of failing.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::Date;
use uuid::Uuid;

pub type ProjectId = Uuid;
pub type TaskListId = Uuid;
pub type TaskId = Uuid;
pub type CollaboratorId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

/// Ordered column of a project board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: TaskListId,
    pub project_id: ProjectId,
    pub title: String,
    /// Display order inside the project, ascending.
    pub order: i64,
    /// CSS-like color token, e.g. `#3b82f6`.
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    pub completed: bool,
}

impl ChecklistItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
        }
    }
}

/// Completed/total counts for one checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChecklistProgress {
    pub completed: usize,
    pub total: usize,
}

impl ChecklistProgress {
    pub fn of(items: &[ChecklistItem]) -> Self {
        Self {
            completed: items.iter().filter(|item| item.completed).count(),
            total: items.len(),
        }
    }

    /// Whole percentage, rounded down. Empty checklists report 0.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed * 100) / self.total) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

/// Project task card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTask {
    pub id: TaskId,
    pub list_id: TaskListId,
    pub title: String,
    /// Free-text description.
    pub content: Option<String>,
    /// Display order inside the owning list, ascending.
    pub order: i64,
    pub start_date: Option<Date>,
    pub due_date: Option<Date>,
    pub completed: bool,
    pub checklist: Vec<ChecklistItem>,
    /// Label names, resolved against `LabelDefinition` on read.
    pub labels: Vec<String>,
    pub assignees: Vec<CollaboratorId>,
}

impl ProjectTask {
    /// Creates a task with a generated id and empty optional fields.
    pub fn new(list_id: TaskListId, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            list_id,
            title: title.into(),
            content: None,
            order: 0,
            start_date: None,
            due_date: None,
            completed: false,
            checklist: Vec::new(),
            labels: Vec::new(),
            assignees: Vec::new(),
        }
    }

    pub fn checklist_progress(&self) -> ChecklistProgress {
        ChecklistProgress::of(&self.checklist)
    }

    /// Validates field-level invariants before persistence.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.id.is_nil() {
            return Err(TaskValidationError::NilId);
        }
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        if let (Some(start), Some(due)) = (self.start_date, self.due_date) {
            if start > due {
                return Err(TaskValidationError::StartAfterDue { start, due });
            }
        }
        if self.checklist.iter().any(|item| item.text.trim().is_empty()) {
            return Err(TaskValidationError::EmptyChecklistItem);
        }
        if self.labels.iter().any(|label| label.trim().is_empty()) {
            return Err(TaskValidationError::EmptyLabel);
        }
        Ok(())
    }
}

/// Validation failures for `ProjectTask`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    NilId,
    EmptyTitle,
    StartAfterDue { start: Date, due: Date },
    EmptyChecklistItem,
    EmptyLabel,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "task id must not be nil"),
            Self::EmptyTitle => write!(f, "task title must not be blank"),
            Self::StartAfterDue { start, due } => {
                write!(f, "task start date {start} is after due date {due}")
            }
            Self::EmptyChecklistItem => write!(f, "checklist item text must not be blank"),
            Self::EmptyLabel => write!(f, "label name must not be blank"),
        }
    }
}

impl Error for TaskValidationError {}

/// Project member that tasks can be assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: CollaboratorId,
    pub project_id: ProjectId,
    pub display_name: String,
    pub email: Option<String>,
}

/// Named label with display metadata, owned by a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDefinition {
    pub project_id: ProjectId,
    pub name: String,
    pub color: String,
}

/// Everything the derived views need for one project, read in one go.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub lists: Vec<TaskList>,
    pub tasks: Vec<ProjectTask>,
    pub collaborators: Vec<Collaborator>,
    pub labels: Vec<LabelDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn checklist_progress_counts_completed_items() {
        let mut task = ProjectTask::new(Uuid::new_v4(), "Ship release");
        assert_eq!(task.checklist_progress().percent(), 0);
        assert!(!task.checklist_progress().is_complete());

        task.checklist = vec![
            ChecklistItem::new("build"),
            ChecklistItem {
                text: "tag".to_string(),
                completed: true,
            },
            ChecklistItem::new("announce"),
        ];
        let progress = task.checklist_progress();
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.total, 3);
        assert_eq!(progress.percent(), 33);
    }

    #[test]
    fn validate_rejects_reversed_dates_and_blank_title() {
        let mut task = ProjectTask::new(Uuid::new_v4(), "  ");
        assert_eq!(task.validate(), Err(TaskValidationError::EmptyTitle));

        task.title = "Plan".to_string();
        task.start_date = Some(date!(2024 - 05 - 10));
        task.due_date = Some(date!(2024 - 05 - 01));
        assert!(matches!(
            task.validate(),
            Err(TaskValidationError::StartAfterDue { .. })
        ));

        task.start_date = Some(date!(2024 - 05 - 01));
        assert_eq!(task.validate(), Ok(()));
    }
}
