//! Project board use-case service.
//!
//! # Responsibility
//! - Provide project, list, task, label and collaborator use-cases.
//! - Enforce that every touched list/task/collaborator belongs to the
//!   project the caller names.
//! - Expose the four derived views over a freshly loaded snapshot.
//!
//! # Invariants
//! - Titles, names and label names are trimmed and must be non-empty.
//! - Task label lists are deduplicated, first occurrence wins.
//! - Assignee lists are deduplicated and must reference project collaborators.

use crate::model::project::{
    ChecklistItem, Collaborator, CollaboratorId, LabelDefinition, Project, ProjectId,
    ProjectSnapshot, ProjectTask, TaskId, TaskList, TaskListId, TaskValidationError,
};
use crate::repo::project_repo::{ProjectRepoError, ProjectRepository};
use crate::view::{
    board_view, calendar_view, gantt_view, table_view, BoardView, CalendarEvent, GanttView,
    TableRow,
};
use log::info;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::Date;
use uuid::Uuid;

/// Errors from project use-cases.
#[derive(Debug)]
pub enum ProjectServiceError {
    /// Blank project name, list title or collaborator name. Holds the field.
    InvalidName(&'static str),
    InvalidLabel(String),
    ProjectNotFound(ProjectId),
    ListNotFound(TaskListId),
    TaskNotFound(TaskId),
    CollaboratorNotFound(CollaboratorId),
    LabelNotFound(String),
    DuplicateLabel(String),
    /// List exists but is owned by another project.
    ListNotInProject {
        list_id: TaskListId,
        project_id: ProjectId,
    },
    ChecklistIndexOutOfRange {
        index: usize,
        len: usize,
    },
    Validation(TaskValidationError),
    Repo(ProjectRepoError),
}

impl Display for ProjectServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(field) => write!(f, "{field} must not be blank"),
            Self::InvalidLabel(value) => write!(f, "invalid label: `{value}`"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::ListNotFound(id) => write!(f, "task list not found: {id}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::CollaboratorNotFound(id) => write!(f, "collaborator not found: {id}"),
            Self::LabelNotFound(name) => write!(f, "label not found: `{name}`"),
            Self::DuplicateLabel(name) => write!(f, "label already exists: `{name}`"),
            Self::ListNotInProject {
                list_id,
                project_id,
            } => write!(f, "task list {list_id} does not belong to project {project_id}"),
            Self::ChecklistIndexOutOfRange { index, len } => {
                write!(f, "checklist index {index} out of range for {len} items")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProjectServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProjectRepoError> for ProjectServiceError {
    fn from(value: ProjectRepoError) -> Self {
        match value {
            ProjectRepoError::ProjectNotFound(id) => Self::ProjectNotFound(id),
            ProjectRepoError::ListNotFound(id) => Self::ListNotFound(id),
            ProjectRepoError::TaskNotFound(id) => Self::TaskNotFound(id),
            ProjectRepoError::CollaboratorNotFound(id) => Self::CollaboratorNotFound(id),
            ProjectRepoError::LabelNotFound(name) => Self::LabelNotFound(name),
            ProjectRepoError::DuplicateLabel(name) => Self::DuplicateLabel(name),
            ProjectRepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<TaskValidationError> for ProjectServiceError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

pub type ProjectServiceResult<T> = Result<T, ProjectServiceError>;

/// Input for task creation. The task is appended at the end of `list_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub list_id: TaskListId,
    pub title: String,
    pub content: Option<String>,
    pub start_date: Option<Date>,
    pub due_date: Option<Date>,
    pub checklist: Vec<ChecklistItem>,
    pub labels: Vec<String>,
    pub assignees: Vec<CollaboratorId>,
}

impl NewTask {
    pub fn new(list_id: TaskListId, title: impl Into<String>) -> Self {
        Self {
            list_id,
            title: title.into(),
            content: None,
            start_date: None,
            due_date: None,
            checklist: Vec::new(),
            labels: Vec::new(),
            assignees: Vec::new(),
        }
    }
}

/// Project service facade.
pub struct ProjectService<R: ProjectRepository> {
    repo: R,
}

impl<R: ProjectRepository> ProjectService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_project(&self, name: &str) -> ProjectServiceResult<Project> {
        let name = required(name, "project name")?;
        let project = self.repo.create_project(name)?;
        info!(
            "event=project_create module=project status=ok project_id={}",
            project.id
        );
        Ok(project)
    }

    pub fn list_projects(&self) -> ProjectServiceResult<Vec<Project>> {
        Ok(self.repo.list_projects()?)
    }

    /// Appends a list at the end of the project's board.
    pub fn create_list(
        &self,
        project_id: ProjectId,
        title: &str,
        color: Option<&str>,
    ) -> ProjectServiceResult<TaskList> {
        let title = required(title, "list title")?;
        let list = self.repo.create_list(project_id, title, optional(color))?;
        info!(
            "event=list_create module=project status=ok project_id={} list_id={}",
            project_id, list.id
        );
        Ok(list)
    }

    pub fn rename_list(
        &self,
        project_id: ProjectId,
        list_id: TaskListId,
        title: &str,
    ) -> ProjectServiceResult<TaskList> {
        let mut list = self.list_in_project(project_id, list_id)?;
        list.title = required(title, "list title")?.to_string();
        self.repo.update_list(&list)?;
        Ok(list)
    }

    /// Sets or clears (`None` or blank) the list color.
    pub fn recolor_list(
        &self,
        project_id: ProjectId,
        list_id: TaskListId,
        color: Option<&str>,
    ) -> ProjectServiceResult<TaskList> {
        let mut list = self.list_in_project(project_id, list_id)?;
        list.color = optional(color).map(str::to_string);
        self.repo.update_list(&list)?;
        Ok(list)
    }

    /// Deletes a list and every task inside it.
    pub fn delete_list(
        &self,
        project_id: ProjectId,
        list_id: TaskListId,
    ) -> ProjectServiceResult<()> {
        self.list_in_project(project_id, list_id)?;
        self.repo.delete_list(list_id)?;
        info!(
            "event=list_delete module=project status=ok project_id={} list_id={}",
            project_id, list_id
        );
        Ok(())
    }

    pub fn create_task(
        &self,
        project_id: ProjectId,
        input: NewTask,
    ) -> ProjectServiceResult<ProjectTask> {
        self.list_in_project(project_id, input.list_id)?;
        let assignees = self.checked_assignees(project_id, input.assignees)?;

        let task = ProjectTask {
            id: Uuid::new_v4(),
            list_id: input.list_id,
            title: required(&input.title, "task title")?.to_string(),
            content: input.content,
            order: self.repo.next_task_order(input.list_id)?,
            start_date: input.start_date,
            due_date: input.due_date,
            completed: false,
            checklist: input.checklist,
            labels: normalize_labels(input.labels)?,
            assignees,
        };
        self.repo.insert_task(project_id, &task)?;
        info!(
            "event=task_create module=project status=ok project_id={} list_id={} task_id={}",
            project_id, task.list_id, task.id
        );
        Ok(task)
    }

    pub fn get_task(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
    ) -> ProjectServiceResult<ProjectTask> {
        self.task_in_project(project_id, task_id)
    }

    /// Replaces every field of an existing task.
    ///
    /// Changing `list_id` here keeps `order` as given; use `move_task` to
    /// reposition a card among its new siblings.
    pub fn update_task(
        &self,
        project_id: ProjectId,
        mut task: ProjectTask,
    ) -> ProjectServiceResult<ProjectTask> {
        self.task_in_project(project_id, task.id)?;
        self.list_in_project(project_id, task.list_id)?;
        task.title = required(&task.title, "task title")?.to_string();
        task.labels = normalize_labels(task.labels)?;
        task.assignees = self.checked_assignees(project_id, task.assignees)?;
        self.repo.update_task(&task)?;
        info!(
            "event=task_update module=project status=ok project_id={} task_id={}",
            project_id, task.id
        );
        Ok(task)
    }

    /// Moves a task to `target_index` of `list_id` (end when `None`).
    pub fn move_task(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        list_id: TaskListId,
        target_index: Option<usize>,
    ) -> ProjectServiceResult<ProjectTask> {
        self.task_in_project(project_id, task_id)?;
        self.list_in_project(project_id, list_id)?;
        self.repo.move_task(task_id, list_id, target_index)?;
        info!(
            "event=task_move module=project status=ok project_id={} task_id={} list_id={}",
            project_id, task_id, list_id
        );
        self.task_in_project(project_id, task_id)
    }

    pub fn delete_task(&self, project_id: ProjectId, task_id: TaskId) -> ProjectServiceResult<()> {
        self.task_in_project(project_id, task_id)?;
        self.repo.delete_task(task_id)?;
        info!(
            "event=task_delete module=project status=ok project_id={} task_id={}",
            project_id, task_id
        );
        Ok(())
    }

    pub fn set_checklist(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        items: Vec<ChecklistItem>,
    ) -> ProjectServiceResult<ProjectTask> {
        self.modify_task(project_id, task_id, |task| {
            task.checklist = items;
            Ok(())
        })
    }

    /// Flips the completion flag of one checklist item.
    pub fn toggle_checklist_item(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        index: usize,
    ) -> ProjectServiceResult<ProjectTask> {
        self.modify_task(project_id, task_id, |task| {
            let len = task.checklist.len();
            let item = task
                .checklist
                .get_mut(index)
                .ok_or(ProjectServiceError::ChecklistIndexOutOfRange { index, len })?;
            item.completed = !item.completed;
            Ok(())
        })
    }

    pub fn set_task_completed(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        completed: bool,
    ) -> ProjectServiceResult<ProjectTask> {
        self.modify_task(project_id, task_id, |task| {
            task.completed = completed;
            Ok(())
        })
    }

    /// Replaces task labels. Names need no definition; undefined ones render
    /// without color.
    pub fn set_labels(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        labels: Vec<String>,
    ) -> ProjectServiceResult<ProjectTask> {
        let labels = normalize_labels(labels)?;
        self.modify_task(project_id, task_id, |task| {
            task.labels = labels;
            Ok(())
        })
    }

    pub fn set_assignees(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        assignees: Vec<CollaboratorId>,
    ) -> ProjectServiceResult<ProjectTask> {
        let assignees = self.checked_assignees(project_id, assignees)?;
        self.modify_task(project_id, task_id, |task| {
            task.assignees = assignees;
            Ok(())
        })
    }

    /// Defines a label, or recolors it when the name already exists.
    pub fn define_label(
        &self,
        project_id: ProjectId,
        name: &str,
        color: &str,
    ) -> ProjectServiceResult<LabelDefinition> {
        let label = LabelDefinition {
            project_id,
            name: label_name(name)?,
            color: color.trim().to_string(),
        };
        self.repo.upsert_label(&label)?;
        Ok(label)
    }

    pub fn labels(&self, project_id: ProjectId) -> ProjectServiceResult<Vec<LabelDefinition>> {
        Ok(self.repo.list_labels(project_id)?)
    }

    /// Renames a label definition and every task reference to it.
    ///
    /// Returns the number of tasks whose label list changed.
    pub fn rename_label(
        &self,
        project_id: ProjectId,
        old_name: &str,
        new_name: &str,
    ) -> ProjectServiceResult<usize> {
        let old_name = label_name(old_name)?;
        let new_name = label_name(new_name)?;
        let touched = self.repo.rename_label(project_id, &old_name, &new_name)?;
        info!(
            "event=label_rename module=project status=ok project_id={} tasks={}",
            project_id, touched
        );
        Ok(touched)
    }

    /// Deletes a label definition and strips it from every task.
    pub fn delete_label(&self, project_id: ProjectId, name: &str) -> ProjectServiceResult<usize> {
        let name = label_name(name)?;
        let touched = self.repo.delete_label(project_id, &name)?;
        info!(
            "event=label_delete module=project status=ok project_id={} tasks={}",
            project_id, touched
        );
        Ok(touched)
    }

    pub fn tasks_with_label(
        &self,
        project_id: ProjectId,
        name: &str,
    ) -> ProjectServiceResult<Vec<TaskId>> {
        Ok(self.repo.tasks_with_label(project_id, &label_name(name)?)?)
    }

    pub fn add_collaborator(
        &self,
        project_id: ProjectId,
        display_name: &str,
        email: Option<&str>,
    ) -> ProjectServiceResult<Collaborator> {
        let collaborator = Collaborator {
            id: Uuid::new_v4(),
            project_id,
            display_name: required(display_name, "collaborator name")?.to_string(),
            email: optional(email).map(str::to_string),
        };
        self.repo.add_collaborator(&collaborator)?;
        info!(
            "event=collaborator_add module=project status=ok project_id={} collaborator_id={}",
            project_id, collaborator.id
        );
        Ok(collaborator)
    }

    pub fn collaborators(&self, project_id: ProjectId) -> ProjectServiceResult<Vec<Collaborator>> {
        Ok(self.repo.list_collaborators(project_id)?)
    }

    /// Removes a collaborator and unassigns it everywhere.
    ///
    /// Returns the number of tasks it was unassigned from.
    pub fn remove_collaborator(
        &self,
        project_id: ProjectId,
        collaborator_id: CollaboratorId,
    ) -> ProjectServiceResult<usize> {
        let known = self
            .repo
            .list_collaborators(project_id)?
            .iter()
            .any(|collaborator| collaborator.id == collaborator_id);
        if !known {
            return Err(ProjectServiceError::CollaboratorNotFound(collaborator_id));
        }
        let unassigned = self.repo.remove_collaborator(collaborator_id)?;
        info!(
            "event=collaborator_remove module=project status=ok project_id={} tasks={}",
            project_id, unassigned
        );
        Ok(unassigned)
    }

    pub fn load_snapshot(&self, project_id: ProjectId) -> ProjectServiceResult<ProjectSnapshot> {
        Ok(self.repo.load_snapshot(project_id)?)
    }

    pub fn board(&self, project_id: ProjectId) -> ProjectServiceResult<BoardView> {
        Ok(board_view(&self.load_snapshot(project_id)?))
    }

    pub fn table(&self, project_id: ProjectId) -> ProjectServiceResult<Vec<TableRow>> {
        Ok(table_view(&self.load_snapshot(project_id)?))
    }

    pub fn calendar(&self, project_id: ProjectId) -> ProjectServiceResult<Vec<CalendarEvent>> {
        Ok(calendar_view(&self.load_snapshot(project_id)?))
    }

    pub fn gantt(&self, project_id: ProjectId, today: Date) -> ProjectServiceResult<GanttView> {
        Ok(gantt_view(&self.load_snapshot(project_id)?, today))
    }

    fn list_in_project(
        &self,
        project_id: ProjectId,
        list_id: TaskListId,
    ) -> ProjectServiceResult<TaskList> {
        let list = self
            .repo
            .get_list(list_id)?
            .ok_or(ProjectServiceError::ListNotFound(list_id))?;
        if list.project_id != project_id {
            return Err(ProjectServiceError::ListNotInProject {
                list_id,
                project_id,
            });
        }
        Ok(list)
    }

    /// Tasks of other projects are reported as not found.
    fn task_in_project(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
    ) -> ProjectServiceResult<ProjectTask> {
        if self.repo.task_project(task_id)? != Some(project_id) {
            return Err(ProjectServiceError::TaskNotFound(task_id));
        }
        self.repo
            .get_task(task_id)?
            .ok_or(ProjectServiceError::TaskNotFound(task_id))
    }

    fn modify_task<F>(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        change: F,
    ) -> ProjectServiceResult<ProjectTask>
    where
        F: FnOnce(&mut ProjectTask) -> ProjectServiceResult<()>,
    {
        let mut task = self.task_in_project(project_id, task_id)?;
        change(&mut task)?;
        self.repo.update_task(&task)?;
        info!(
            "event=task_update module=project status=ok project_id={} task_id={}",
            project_id, task_id
        );
        Ok(task)
    }

    fn checked_assignees(
        &self,
        project_id: ProjectId,
        assignees: Vec<CollaboratorId>,
    ) -> ProjectServiceResult<Vec<CollaboratorId>> {
        if assignees.is_empty() {
            return Ok(assignees);
        }
        let known: HashSet<CollaboratorId> = self
            .repo
            .list_collaborators(project_id)?
            .into_iter()
            .map(|collaborator| collaborator.id)
            .collect();

        let mut seen = HashSet::new();
        let mut checked = Vec::with_capacity(assignees.len());
        for id in assignees {
            if !known.contains(&id) {
                return Err(ProjectServiceError::CollaboratorNotFound(id));
            }
            if seen.insert(id) {
                checked.push(id);
            }
        }
        Ok(checked)
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> ProjectServiceResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ProjectServiceError::InvalidName(field));
    }
    Ok(trimmed)
}

fn optional(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn label_name(value: &str) -> ProjectServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ProjectServiceError::InvalidLabel(value.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Trims and deduplicates label names, keeping first-seen order.
pub fn normalize_labels(labels: Vec<String>) -> ProjectServiceResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(labels.len());
    for label in labels {
        let name = label_name(&label)?;
        if seen.insert(name.clone()) {
            normalized.push(name);
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db_in_memory;
    use crate::repo::project_repo::SqliteProjectRepository;

    #[test]
    fn normalize_labels_trims_and_dedupes() {
        let labels = normalize_labels(vec![
            " urgent ".to_string(),
            "client".to_string(),
            "urgent".to_string(),
        ])
        .unwrap();
        assert_eq!(labels, vec!["urgent", "client"]);

        let err = normalize_labels(vec!["  ".to_string()]).unwrap_err();
        assert!(matches!(err, ProjectServiceError::InvalidLabel(_)));
    }

    #[test]
    fn tasks_of_other_projects_are_invisible() {
        let conn = open_db_in_memory().unwrap();
        let service = ProjectService::new(SqliteProjectRepository::try_new(&conn).unwrap());
        let ours = service.create_project("Ours").unwrap();
        let theirs = service.create_project("Theirs").unwrap();
        let list = service.create_list(theirs.id, "Todo", None).unwrap();
        let task = service
            .create_task(theirs.id, NewTask::new(list.id, "Secret"))
            .unwrap();

        assert!(matches!(
            service.get_task(ours.id, task.id),
            Err(ProjectServiceError::TaskNotFound(_))
        ));
        assert!(matches!(
            service.create_task(ours.id, NewTask::new(list.id, "Sneaky")),
            Err(ProjectServiceError::ListNotInProject { .. })
        ));
    }

    #[test]
    fn toggle_checklist_rejects_out_of_range_index() {
        let conn = open_db_in_memory().unwrap();
        let service = ProjectService::new(SqliteProjectRepository::try_new(&conn).unwrap());
        let project = service.create_project("Site").unwrap();
        let list = service.create_list(project.id, "Todo", Some("#22c55e")).unwrap();
        let mut input = NewTask::new(list.id, "Survey");
        input.checklist = vec![ChecklistItem::new("measure"), ChecklistItem::new("photos")];
        let task = service.create_task(project.id, input).unwrap();

        let toggled = service.toggle_checklist_item(project.id, task.id, 1).unwrap();
        assert_eq!(toggled.checklist_progress().completed, 1);

        let err = service
            .toggle_checklist_item(project.id, task.id, 2)
            .unwrap_err();
        assert!(matches!(
            err,
            ProjectServiceError::ChecklistIndexOutOfRange { index: 2, len: 2 }
        ));
    }
}
