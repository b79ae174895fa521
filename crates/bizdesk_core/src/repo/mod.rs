//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for documents and
//!   project boards.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repositories verify the borrowed connection schema on construction.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`,
//!   corruption) in addition to DB transport errors.

pub mod document_repo;
pub mod project_repo;
