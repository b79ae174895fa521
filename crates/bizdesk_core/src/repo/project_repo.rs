//! Project board repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist projects, task lists, tasks (with checklist, labels and
//!   assignees), label definitions and collaborators.
//! - Keep ordering, label sweeps and task moves atomic inside the store.
//!
//! # Invariants
//! - Every query is scoped by an explicit project id; there is no implicit
//!   "current project".
//! - List and task listings are deterministic: `sort_order ASC, uuid ASC`.
//! - `task_labels` is the label -> task back-index; label rename/delete
//!   rewrite it in the same transaction as the definition.
//! - Task writes call `ProjectTask::validate()` before SQL mutations.

use crate::db::schema::{ensure_schema_ready, TableRequirement};
use crate::db::DbError;
use crate::model::project::{
    ChecklistItem, Collaborator, CollaboratorId, LabelDefinition, Project, ProjectId,
    ProjectSnapshot, ProjectTask, TaskId, TaskList, TaskListId, TaskValidationError,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::macros::format_description;
use time::Date;
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    task_uuid,
    list_uuid,
    title,
    content,
    sort_order,
    start_date,
    due_date,
    is_completed
FROM tasks";

const REQUIRED_TABLES: &[TableRequirement] = &[
    TableRequirement {
        table: "projects",
        columns: &["project_uuid", "name", "created_at"],
    },
    TableRequirement {
        table: "task_lists",
        columns: &["list_uuid", "project_uuid", "title", "sort_order", "color"],
    },
    TableRequirement {
        table: "tasks",
        columns: &[
            "task_uuid",
            "project_uuid",
            "list_uuid",
            "title",
            "content",
            "sort_order",
            "start_date",
            "due_date",
            "is_completed",
        ],
    },
    TableRequirement {
        table: "task_checklist_items",
        columns: &["task_uuid", "position", "text", "is_completed"],
    },
    TableRequirement {
        table: "task_labels",
        columns: &["task_uuid", "project_uuid", "label_name", "position"],
    },
    TableRequirement {
        table: "task_assignees",
        columns: &["task_uuid", "collaborator_uuid", "position"],
    },
    TableRequirement {
        table: "label_definitions",
        columns: &["project_uuid", "name", "color"],
    },
    TableRequirement {
        table: "collaborators",
        columns: &["collaborator_uuid", "project_uuid", "display_name", "email"],
    },
];

pub type ProjectRepoResult<T> = Result<T, ProjectRepoError>;

/// Errors from project board persistence.
#[derive(Debug)]
pub enum ProjectRepoError {
    Db(DbError),
    Validation(TaskValidationError),
    ProjectNotFound(ProjectId),
    ListNotFound(TaskListId),
    TaskNotFound(TaskId),
    CollaboratorNotFound(CollaboratorId),
    LabelNotFound(String),
    /// Label name already defined in the project.
    DuplicateLabel(String),
    InvalidData(String),
}

impl Display for ProjectRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::ListNotFound(id) => write!(f, "task list not found: {id}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::CollaboratorNotFound(id) => write!(f, "collaborator not found: {id}"),
            Self::LabelNotFound(name) => write!(f, "label not found: `{name}`"),
            Self::DuplicateLabel(name) => write!(f, "label already exists: `{name}`"),
            Self::InvalidData(message) => write!(f, "invalid project data: {message}"),
        }
    }
}

impl Error for ProjectRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ProjectRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ProjectRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<TaskValidationError> for ProjectRepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Repository interface for project boards.
pub trait ProjectRepository {
    fn create_project(&self, name: &str) -> ProjectRepoResult<Project>;
    fn get_project(&self, project_id: ProjectId) -> ProjectRepoResult<Option<Project>>;
    /// Lists projects by creation time, oldest first.
    fn list_projects(&self) -> ProjectRepoResult<Vec<Project>>;

    /// Appends a list at the end of the project's list order.
    fn create_list(
        &self,
        project_id: ProjectId,
        title: &str,
        color: Option<&str>,
    ) -> ProjectRepoResult<TaskList>;
    fn get_list(&self, list_id: TaskListId) -> ProjectRepoResult<Option<TaskList>>;
    fn list_lists(&self, project_id: ProjectId) -> ProjectRepoResult<Vec<TaskList>>;
    /// Updates title and color of one list.
    fn update_list(&self, list: &TaskList) -> ProjectRepoResult<()>;
    /// Deletes one list together with the tasks it contains.
    fn delete_list(&self, list_id: TaskListId) -> ProjectRepoResult<()>;

    fn insert_task(&self, project_id: ProjectId, task: &ProjectTask) -> ProjectRepoResult<()>;
    /// Full replacement of task fields, checklist, labels and assignees.
    fn update_task(&self, task: &ProjectTask) -> ProjectRepoResult<()>;
    fn get_task(&self, task_id: TaskId) -> ProjectRepoResult<Option<ProjectTask>>;
    /// Owning project of a task, if the task exists.
    fn task_project(&self, task_id: TaskId) -> ProjectRepoResult<Option<ProjectId>>;
    fn list_tasks(&self, project_id: ProjectId) -> ProjectRepoResult<Vec<ProjectTask>>;
    fn delete_task(&self, task_id: TaskId) -> ProjectRepoResult<()>;
    /// Next free order value at the end of one list.
    fn next_task_order(&self, list_id: TaskListId) -> ProjectRepoResult<i64>;
    /// Moves a task into `list_id` at `target_index` (end when `None`) and
    /// renumbers source and destination lists densely from 0.
    fn move_task(
        &self,
        task_id: TaskId,
        list_id: TaskListId,
        target_index: Option<usize>,
    ) -> ProjectRepoResult<()>;

    /// Inserts or recolors one label definition.
    fn upsert_label(&self, label: &LabelDefinition) -> ProjectRepoResult<()>;
    fn list_labels(&self, project_id: ProjectId) -> ProjectRepoResult<Vec<LabelDefinition>>;
    /// Renames a label and every task reference. Returns touched task count.
    fn rename_label(
        &self,
        project_id: ProjectId,
        old_name: &str,
        new_name: &str,
    ) -> ProjectRepoResult<usize>;
    /// Deletes a label and every task reference. Returns touched task count.
    fn delete_label(&self, project_id: ProjectId, name: &str) -> ProjectRepoResult<usize>;
    /// Back-index lookup: tasks referencing a label name.
    fn tasks_with_label(
        &self,
        project_id: ProjectId,
        name: &str,
    ) -> ProjectRepoResult<Vec<TaskId>>;

    fn add_collaborator(&self, collaborator: &Collaborator) -> ProjectRepoResult<()>;
    fn list_collaborators(&self, project_id: ProjectId) -> ProjectRepoResult<Vec<Collaborator>>;
    /// Removes a collaborator and unassigns it. Returns unassigned task count.
    fn remove_collaborator(&self, collaborator_id: CollaboratorId) -> ProjectRepoResult<usize>;

    /// Reads lists, tasks, collaborators and labels of one project.
    fn load_snapshot(&self, project_id: ProjectId) -> ProjectRepoResult<ProjectSnapshot>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> ProjectRepoResult<Self> {
        ensure_schema_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, name: &str) -> ProjectRepoResult<Project> {
        let project_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO projects (project_uuid, name) VALUES (?1, ?2);",
            params![project_id.to_string(), name],
        )?;
        self.get_project(project_id)?
            .ok_or(ProjectRepoError::ProjectNotFound(project_id))
    }

    fn get_project(&self, project_id: ProjectId) -> ProjectRepoResult<Option<Project>> {
        self.conn
            .query_row(
                "SELECT project_uuid, name, created_at FROM projects WHERE project_uuid = ?1;",
                [project_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?
            .map(|(id, name, created_at)| -> ProjectRepoResult<Project> {
                Ok(Project {
                    id: parse_uuid(&id, "projects.project_uuid")?,
                    name,
                    created_at,
                })
            })
            .transpose()
    }

    fn list_projects(&self) -> ProjectRepoResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            "SELECT project_uuid, name, created_at
             FROM projects
             ORDER BY created_at ASC, project_uuid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            projects.push(Project {
                id: parse_uuid(&id, "projects.project_uuid")?,
                name: row.get(1)?,
                created_at: row.get(2)?,
            });
        }
        Ok(projects)
    }

    fn create_list(
        &self,
        project_id: ProjectId,
        title: &str,
        color: Option<&str>,
    ) -> ProjectRepoResult<TaskList> {
        ensure_project_exists(self.conn, project_id)?;
        let list = TaskList {
            id: Uuid::new_v4(),
            project_id,
            title: title.to_string(),
            order: next_list_order(self.conn, project_id)?,
            color: color.map(str::to_string),
        };
        self.conn.execute(
            "INSERT INTO task_lists (list_uuid, project_uuid, title, sort_order, color)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                list.id.to_string(),
                project_id.to_string(),
                list.title.as_str(),
                list.order,
                list.color.as_deref(),
            ],
        )?;
        Ok(list)
    }

    fn get_list(&self, list_id: TaskListId) -> ProjectRepoResult<Option<TaskList>> {
        let mut stmt = self.conn.prepare(
            "SELECT list_uuid, project_uuid, title, sort_order, color
             FROM task_lists
             WHERE list_uuid = ?1;",
        )?;
        let mut rows = stmt.query([list_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_list_row(row)?));
        }
        Ok(None)
    }

    fn list_lists(&self, project_id: ProjectId) -> ProjectRepoResult<Vec<TaskList>> {
        let mut stmt = self.conn.prepare(
            "SELECT list_uuid, project_uuid, title, sort_order, color
             FROM task_lists
             WHERE project_uuid = ?1
             ORDER BY sort_order ASC, list_uuid ASC;",
        )?;
        let mut rows = stmt.query([project_id.to_string()])?;
        let mut lists = Vec::new();
        while let Some(row) = rows.next()? {
            lists.push(parse_list_row(row)?);
        }
        Ok(lists)
    }

    fn update_list(&self, list: &TaskList) -> ProjectRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE task_lists SET title = ?2, color = ?3 WHERE list_uuid = ?1;",
            params![list.id.to_string(), list.title.as_str(), list.color.as_deref()],
        )?;
        if changed == 0 {
            return Err(ProjectRepoError::ListNotFound(list.id));
        }
        Ok(())
    }

    fn delete_list(&self, list_id: TaskListId) -> ProjectRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM tasks WHERE list_uuid = ?1;",
            [list_id.to_string()],
        )?;
        let changed = tx.execute(
            "DELETE FROM task_lists WHERE list_uuid = ?1;",
            [list_id.to_string()],
        )?;
        if changed == 0 {
            return Err(ProjectRepoError::ListNotFound(list_id));
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_task(&self, project_id: ProjectId, task: &ProjectTask) -> ProjectRepoResult<()> {
        task.validate()?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_project_exists(&tx, project_id)?;
        tx.execute(
            "INSERT INTO tasks (
                task_uuid,
                project_uuid,
                list_uuid,
                title,
                content,
                sort_order,
                start_date,
                due_date,
                is_completed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                task.id.to_string(),
                project_id.to_string(),
                task.list_id.to_string(),
                task.title.as_str(),
                task.content.as_deref(),
                task.order,
                task.start_date.map(format_date).transpose()?,
                task.due_date.map(format_date).transpose()?,
                bool_to_int(task.completed),
            ],
        )?;
        write_task_children(&tx, project_id, task)?;
        tx.commit()?;
        Ok(())
    }

    fn update_task(&self, task: &ProjectTask) -> ProjectRepoResult<()> {
        task.validate()?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let project_id = task_project_id(&tx, task.id)?;
        tx.execute(
            "UPDATE tasks
             SET list_uuid = ?2,
                 title = ?3,
                 content = ?4,
                 sort_order = ?5,
                 start_date = ?6,
                 due_date = ?7,
                 is_completed = ?8,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE task_uuid = ?1;",
            params![
                task.id.to_string(),
                task.list_id.to_string(),
                task.title.as_str(),
                task.content.as_deref(),
                task.order,
                task.start_date.map(format_date).transpose()?,
                task.due_date.map(format_date).transpose()?,
                bool_to_int(task.completed),
            ],
        )?;
        for table in ["task_checklist_items", "task_labels", "task_assignees"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE task_uuid = ?1;"),
                [task.id.to_string()],
            )?;
        }
        write_task_children(&tx, project_id, task)?;
        tx.commit()?;
        Ok(())
    }

    fn get_task(&self, task_id: TaskId) -> ProjectRepoResult<Option<ProjectTask>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE task_uuid = ?1;"))?;
        let mut rows = stmt.query([task_id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut task = parse_task_row(row)?;
        let task_key = task_id.to_string();

        task.checklist = load_checklists(self.conn, "task_uuid = ?1", &task_key)?
            .remove(&task_id)
            .unwrap_or_default();
        task.labels = load_labels(self.conn, "task_uuid = ?1", &task_key)?
            .remove(&task_id)
            .unwrap_or_default();
        task.assignees = load_assignees(self.conn, "task_uuid = ?1", &task_key)?
            .remove(&task_id)
            .unwrap_or_default();
        Ok(Some(task))
    }

    fn task_project(&self, task_id: TaskId) -> ProjectRepoResult<Option<ProjectId>> {
        match task_project_id(self.conn, task_id) {
            Ok(project_id) => Ok(Some(project_id)),
            Err(ProjectRepoError::TaskNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn list_tasks(&self, project_id: ProjectId) -> ProjectRepoResult<Vec<ProjectTask>> {
        let project_key = project_id.to_string();
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE project_uuid = ?1
             ORDER BY sort_order ASC, task_uuid ASC;"
        ))?;
        let mut rows = stmt.query([project_key.as_str()])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }

        let by_project = "task_uuid IN (SELECT task_uuid FROM tasks WHERE project_uuid = ?1)";
        let mut checklists = load_checklists(self.conn, by_project, &project_key)?;
        let mut labels = load_labels(self.conn, by_project, &project_key)?;
        let mut assignees = load_assignees(self.conn, by_project, &project_key)?;
        for task in &mut tasks {
            task.checklist = checklists.remove(&task.id).unwrap_or_default();
            task.labels = labels.remove(&task.id).unwrap_or_default();
            task.assignees = assignees.remove(&task.id).unwrap_or_default();
        }
        Ok(tasks)
    }

    fn delete_task(&self, task_id: TaskId) -> ProjectRepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE task_uuid = ?1;", [task_id.to_string()])?;
        if changed == 0 {
            return Err(ProjectRepoError::TaskNotFound(task_id));
        }
        Ok(())
    }

    fn next_task_order(&self, list_id: TaskListId) -> ProjectRepoResult<i64> {
        let next = self.conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM tasks WHERE list_uuid = ?1;",
            [list_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    fn move_task(
        &self,
        task_id: TaskId,
        list_id: TaskListId,
        target_index: Option<usize>,
    ) -> ProjectRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let source_list: String = tx
            .query_row(
                "SELECT list_uuid FROM tasks WHERE task_uuid = ?1;",
                [task_id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(ProjectRepoError::TaskNotFound(task_id))?;
        let source_list = parse_uuid(&source_list, "tasks.list_uuid")?;

        let mut destination = list_task_ids(&tx, list_id)?;
        destination.retain(|id| *id != task_id);
        let index = target_index
            .unwrap_or(destination.len())
            .min(destination.len());
        destination.insert(index, task_id);

        tx.execute(
            "UPDATE tasks
             SET list_uuid = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE task_uuid = ?1;",
            params![task_id.to_string(), list_id.to_string()],
        )?;
        renumber_tasks(&tx, &destination)?;

        if source_list != list_id {
            let remaining = list_task_ids(&tx, source_list)?;
            renumber_tasks(&tx, &remaining)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn upsert_label(&self, label: &LabelDefinition) -> ProjectRepoResult<()> {
        ensure_project_exists(self.conn, label.project_id)?;
        self.conn.execute(
            "INSERT INTO label_definitions (project_uuid, name, color)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(project_uuid, name) DO UPDATE SET color = excluded.color;",
            params![
                label.project_id.to_string(),
                label.name.as_str(),
                label.color.as_str()
            ],
        )?;
        Ok(())
    }

    fn list_labels(&self, project_id: ProjectId) -> ProjectRepoResult<Vec<LabelDefinition>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, color
             FROM label_definitions
             WHERE project_uuid = ?1
             ORDER BY name ASC;",
        )?;
        let mut rows = stmt.query([project_id.to_string()])?;
        let mut labels = Vec::new();
        while let Some(row) = rows.next()? {
            labels.push(LabelDefinition {
                project_id,
                name: row.get(0)?,
                color: row.get(1)?,
            });
        }
        Ok(labels)
    }

    fn rename_label(
        &self,
        project_id: ProjectId,
        old_name: &str,
        new_name: &str,
    ) -> ProjectRepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !label_exists(&tx, project_id, old_name)? {
            return Err(ProjectRepoError::LabelNotFound(old_name.to_string()));
        }
        if old_name == new_name {
            return Ok(0);
        }
        if label_exists(&tx, project_id, new_name)? {
            return Err(ProjectRepoError::DuplicateLabel(new_name.to_string()));
        }

        let touched = count_label_refs(&tx, project_id, old_name)?;
        tx.execute(
            "UPDATE label_definitions SET name = ?3 WHERE project_uuid = ?1 AND name = ?2;",
            params![project_id.to_string(), old_name, new_name],
        )?;
        // Tasks already carrying an undefined `new_name` keep a single ref.
        tx.execute(
            "DELETE FROM task_labels
             WHERE project_uuid = ?1
               AND label_name = ?2
               AND task_uuid IN (
                 SELECT task_uuid FROM task_labels WHERE project_uuid = ?1 AND label_name = ?3
               );",
            params![project_id.to_string(), old_name, new_name],
        )?;
        tx.execute(
            "UPDATE task_labels SET label_name = ?3 WHERE project_uuid = ?1 AND label_name = ?2;",
            params![project_id.to_string(), old_name, new_name],
        )?;
        tx.commit()?;
        Ok(touched)
    }

    fn delete_label(&self, project_id: ProjectId, name: &str) -> ProjectRepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "DELETE FROM label_definitions WHERE project_uuid = ?1 AND name = ?2;",
            params![project_id.to_string(), name],
        )?;
        if changed == 0 {
            return Err(ProjectRepoError::LabelNotFound(name.to_string()));
        }
        let touched = tx.execute(
            "DELETE FROM task_labels WHERE project_uuid = ?1 AND label_name = ?2;",
            params![project_id.to_string(), name],
        )?;
        tx.commit()?;
        Ok(touched)
    }

    fn tasks_with_label(
        &self,
        project_id: ProjectId,
        name: &str,
    ) -> ProjectRepoResult<Vec<TaskId>> {
        let mut stmt = self.conn.prepare(
            "SELECT task_uuid
             FROM task_labels
             WHERE project_uuid = ?1 AND label_name = ?2
             ORDER BY task_uuid ASC;",
        )?;
        let mut rows = stmt.query(params![project_id.to_string(), name])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "task_labels.task_uuid")?);
        }
        Ok(ids)
    }

    fn add_collaborator(&self, collaborator: &Collaborator) -> ProjectRepoResult<()> {
        ensure_project_exists(self.conn, collaborator.project_id)?;
        self.conn.execute(
            "INSERT INTO collaborators (collaborator_uuid, project_uuid, display_name, email)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                collaborator.id.to_string(),
                collaborator.project_id.to_string(),
                collaborator.display_name.as_str(),
                collaborator.email.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn list_collaborators(&self, project_id: ProjectId) -> ProjectRepoResult<Vec<Collaborator>> {
        let mut stmt = self.conn.prepare(
            "SELECT collaborator_uuid, display_name, email
             FROM collaborators
             WHERE project_uuid = ?1
             ORDER BY display_name ASC, collaborator_uuid ASC;",
        )?;
        let mut rows = stmt.query([project_id.to_string()])?;
        let mut collaborators = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            collaborators.push(Collaborator {
                id: parse_uuid(&id, "collaborators.collaborator_uuid")?,
                project_id,
                display_name: row.get(1)?,
                email: row.get(2)?,
            });
        }
        Ok(collaborators)
    }

    fn remove_collaborator(&self, collaborator_id: CollaboratorId) -> ProjectRepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "DELETE FROM collaborators WHERE collaborator_uuid = ?1;",
            [collaborator_id.to_string()],
        )?;
        if changed == 0 {
            return Err(ProjectRepoError::CollaboratorNotFound(collaborator_id));
        }
        let unassigned = tx.execute(
            "DELETE FROM task_assignees WHERE collaborator_uuid = ?1;",
            [collaborator_id.to_string()],
        )?;
        tx.commit()?;
        Ok(unassigned)
    }

    fn load_snapshot(&self, project_id: ProjectId) -> ProjectRepoResult<ProjectSnapshot> {
        ensure_project_exists(self.conn, project_id)?;
        Ok(ProjectSnapshot {
            lists: self.list_lists(project_id)?,
            tasks: self.list_tasks(project_id)?,
            collaborators: self.list_collaborators(project_id)?,
            labels: self.list_labels(project_id)?,
        })
    }
}

fn write_task_children(
    conn: &Connection,
    project_id: ProjectId,
    task: &ProjectTask,
) -> ProjectRepoResult<()> {
    let task_key = task.id.to_string();
    for (position, item) in task.checklist.iter().enumerate() {
        conn.execute(
            "INSERT INTO task_checklist_items (task_uuid, position, text, is_completed)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                task_key,
                position as i64,
                item.text.as_str(),
                bool_to_int(item.completed)
            ],
        )?;
    }
    for (position, label) in task.labels.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO task_labels (task_uuid, project_uuid, label_name, position)
             VALUES (?1, ?2, ?3, ?4);",
            params![task_key, project_id.to_string(), label.as_str(), position as i64],
        )?;
    }
    for (position, assignee) in task.assignees.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO task_assignees (task_uuid, collaborator_uuid, position)
             VALUES (?1, ?2, ?3);",
            params![task_key, assignee.to_string(), position as i64],
        )?;
    }
    Ok(())
}

fn load_checklists(
    conn: &Connection,
    filter: &str,
    key: &str,
) -> ProjectRepoResult<HashMap<TaskId, Vec<ChecklistItem>>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT task_uuid, text, is_completed
         FROM task_checklist_items
         WHERE {filter}
         ORDER BY task_uuid ASC, position ASC;"
    ))?;
    let mut rows = stmt.query([key])?;
    let mut grouped: HashMap<TaskId, Vec<ChecklistItem>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let task_id: String = row.get(0)?;
        grouped
            .entry(parse_uuid(&task_id, "task_checklist_items.task_uuid")?)
            .or_default()
            .push(ChecklistItem {
                text: row.get(1)?,
                completed: int_to_bool(row.get(2)?, "task_checklist_items.is_completed")?,
            });
    }
    Ok(grouped)
}

fn load_labels(
    conn: &Connection,
    filter: &str,
    key: &str,
) -> ProjectRepoResult<HashMap<TaskId, Vec<String>>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT task_uuid, label_name
         FROM task_labels
         WHERE {filter}
         ORDER BY task_uuid ASC, position ASC, label_name ASC;"
    ))?;
    let mut rows = stmt.query([key])?;
    let mut grouped: HashMap<TaskId, Vec<String>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let task_id: String = row.get(0)?;
        grouped
            .entry(parse_uuid(&task_id, "task_labels.task_uuid")?)
            .or_default()
            .push(row.get(1)?);
    }
    Ok(grouped)
}

fn load_assignees(
    conn: &Connection,
    filter: &str,
    key: &str,
) -> ProjectRepoResult<HashMap<TaskId, Vec<CollaboratorId>>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT task_uuid, collaborator_uuid
         FROM task_assignees
         WHERE {filter}
         ORDER BY task_uuid ASC, position ASC;"
    ))?;
    let mut rows = stmt.query([key])?;
    let mut grouped: HashMap<TaskId, Vec<CollaboratorId>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let task_id: String = row.get(0)?;
        let collaborator_id: String = row.get(1)?;
        grouped
            .entry(parse_uuid(&task_id, "task_assignees.task_uuid")?)
            .or_default()
            .push(parse_uuid(
                &collaborator_id,
                "task_assignees.collaborator_uuid",
            )?);
    }
    Ok(grouped)
}

fn list_task_ids(conn: &Connection, list_id: TaskListId) -> ProjectRepoResult<Vec<TaskId>> {
    let mut stmt = conn.prepare(
        "SELECT task_uuid
         FROM tasks
         WHERE list_uuid = ?1
         ORDER BY sort_order ASC, task_uuid ASC;",
    )?;
    let mut rows = stmt.query([list_id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "tasks.task_uuid")?);
    }
    Ok(ids)
}

fn renumber_tasks(conn: &Connection, ordered: &[TaskId]) -> ProjectRepoResult<()> {
    for (index, id) in ordered.iter().enumerate() {
        conn.execute(
            "UPDATE tasks SET sort_order = ?2 WHERE task_uuid = ?1;",
            params![id.to_string(), index as i64],
        )?;
    }
    Ok(())
}

fn next_list_order(conn: &Connection, project_id: ProjectId) -> ProjectRepoResult<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM task_lists WHERE project_uuid = ?1;",
        [project_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(next)
}

fn ensure_project_exists(conn: &Connection, project_id: ProjectId) -> ProjectRepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM projects WHERE project_uuid = ?1);",
        [project_id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(ProjectRepoError::ProjectNotFound(project_id))
    }
}

fn task_project_id(conn: &Connection, task_id: TaskId) -> ProjectRepoResult<ProjectId> {
    let value: String = conn
        .query_row(
            "SELECT project_uuid FROM tasks WHERE task_uuid = ?1;",
            [task_id.to_string()],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(ProjectRepoError::TaskNotFound(task_id))?;
    parse_uuid(&value, "tasks.project_uuid")
}

fn label_exists(conn: &Connection, project_id: ProjectId, name: &str) -> ProjectRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM label_definitions WHERE project_uuid = ?1 AND name = ?2
        );",
        params![project_id.to_string(), name],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn count_label_refs(
    conn: &Connection,
    project_id: ProjectId,
    name: &str,
) -> ProjectRepoResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM task_labels WHERE project_uuid = ?1 AND label_name = ?2;",
        params![project_id.to_string(), name],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn parse_list_row(row: &Row<'_>) -> ProjectRepoResult<TaskList> {
    let id: String = row.get("list_uuid")?;
    let project_id: String = row.get("project_uuid")?;
    Ok(TaskList {
        id: parse_uuid(&id, "task_lists.list_uuid")?,
        project_id: parse_uuid(&project_id, "task_lists.project_uuid")?,
        title: row.get("title")?,
        order: row.get("sort_order")?,
        color: row.get("color")?,
    })
}

fn parse_task_row(row: &Row<'_>) -> ProjectRepoResult<ProjectTask> {
    let id: String = row.get("task_uuid")?;
    let list_id: String = row.get("list_uuid")?;
    Ok(ProjectTask {
        id: parse_uuid(&id, "tasks.task_uuid")?,
        list_id: parse_uuid(&list_id, "tasks.list_uuid")?,
        title: row.get("title")?,
        content: row.get("content")?,
        order: row.get("sort_order")?,
        start_date: parse_optional_date(row.get("start_date")?, "tasks.start_date")?,
        due_date: parse_optional_date(row.get("due_date")?, "tasks.due_date")?,
        completed: int_to_bool(row.get("is_completed")?, "tasks.is_completed")?,
        checklist: Vec::new(),
        labels: Vec::new(),
        assignees: Vec::new(),
    })
}

fn format_date(date: Date) -> ProjectRepoResult<String> {
    date.format(format_description!("[year]-[month]-[day]"))
        .map_err(|err| ProjectRepoError::InvalidData(format!("cannot format date {date}: {err}")))
}

fn parse_optional_date(
    value: Option<String>,
    column: &'static str,
) -> ProjectRepoResult<Option<Date>> {
    value
        .map(|raw| {
            Date::parse(&raw, format_description!("[year]-[month]-[day]")).map_err(|_| {
                ProjectRepoError::InvalidData(format!("invalid date `{raw}` in {column}"))
            })
        })
        .transpose()
}

fn parse_uuid(value: &str, column: &'static str) -> ProjectRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| ProjectRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn int_to_bool(value: i64, column: &'static str) -> ProjectRepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ProjectRepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
