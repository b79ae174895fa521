//! Core domain logic for bizdesk: sequenced business documents and project
//! boards with derived views.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod view;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_from_config, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::document::{
    DocumentKind, DocumentNumber, DocumentNumberError, SequenceBucket, SequencedDocument,
};
pub use model::project::{
    ChecklistItem, ChecklistProgress, Collaborator, CollaboratorId, LabelDefinition, Project,
    ProjectId, ProjectSnapshot, ProjectTask, TaskId, TaskList, TaskListId,
};
pub use repo::document_repo::{DocumentRepoError, DocumentRepository, SqliteDocumentRepository};
pub use repo::project_repo::{ProjectRepoError, ProjectRepository, SqliteProjectRepository};
pub use service::document_service::{DocumentService, DocumentServiceError};
pub use service::project_service::{NewTask, ProjectService, ProjectServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
