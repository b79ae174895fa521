//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep callers (CLI, embedding apps) decoupled from storage details.

pub mod document_service;
pub mod project_service;
