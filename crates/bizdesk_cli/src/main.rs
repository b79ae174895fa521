//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `bizdesk_core` wiring end to end: config, store, allocator.
//! - Keep output deterministic enough for quick local sanity checks.
//!
//! Usage: `bizdesk_cli [config.json]`. Without a config file an in-memory
//! store is used and nothing is persisted.

use bizdesk_core::{
    core_version, init_logging_from_config, open_db_from_config, CoreConfig, DocumentKind,
    DocumentService, SqliteDocumentRepository,
};
use std::error::Error;
use std::process::ExitCode;
use time::OffsetDateTime;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("bizdesk_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => CoreConfig::from_file(path)?,
        None => CoreConfig::default(),
    };
    init_logging_from_config(&config)?;

    let conn = open_db_from_config(&config)?;
    let service = DocumentService::with_config(SqliteDocumentRepository::try_new(&conn)?, &config);

    println!("bizdesk_core version={}", core_version());
    let now = OffsetDateTime::now_utc();
    for kind in DocumentKind::ALL {
        let next = service.preview_next_number(kind, now)?;
        println!("next {}={}", kind.as_str(), next);
    }

    let invoice = service.create_document(DocumentKind::Invoice, "smoke-check", now)?;
    println!("allocated invoice={}", invoice.number);
    Ok(())
}
