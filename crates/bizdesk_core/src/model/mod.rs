//! Domain model for sequenced business documents and project boards.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep identifier formatting rules next to the types they describe.
//!
//! # Invariants
//! - Document identity is the formatted document number, nothing else.
//! - Derived board/table/calendar/gantt views are never modeled here; they are
//!   computed on read by `crate::view`.

pub mod document;
pub mod project;
