use bizdesk_core::db::{open_db, open_db_in_memory};
use bizdesk_core::model::document::DocumentNumberError;
use bizdesk_core::{
    DocumentKind, DocumentNumber, DocumentRepoError, DocumentRepository, DocumentService,
    DocumentServiceError, SequenceBucket, SequencedDocument, SqliteDocumentRepository,
};
use rusqlite::Connection;
use std::collections::HashSet;
use time::macros::datetime;
use time::OffsetDateTime;

const MARCH: OffsetDateTime = datetime!(2024-03-15 10:30 UTC);
const APRIL: OffsetDateTime = datetime!(2024-04-02 08:00 UTC);

#[test]
fn sequential_creations_are_dense_and_ordered() {
    let conn = open_db_in_memory().unwrap();
    let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());

    let numbers: Vec<String> = (0..12)
        .map(|_| {
            service
                .create_document(DocumentKind::Invoice, "Acme", MARCH)
                .unwrap()
                .number
                .to_string()
        })
        .collect();

    let expected: Vec<String> = (1..=12).map(|n| format!("P-SV-{n:03}-03-24")).collect();
    assert_eq!(numbers, expected);
}

#[test]
fn next_number_follows_highest_and_new_month_restarts() {
    let conn = open_db_in_memory().unwrap();
    let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());

    service
        .create_document(DocumentKind::Invoice, "Acme", MARCH)
        .unwrap();
    service
        .create_document(DocumentKind::Invoice, "Acme", MARCH)
        .unwrap();
    let third = service
        .create_document(DocumentKind::Invoice, "Acme", MARCH)
        .unwrap();
    assert_eq!(third.number.to_string(), "P-SV-003-03-24");

    let april = service
        .create_document(DocumentKind::Invoice, "Acme", APRIL)
        .unwrap();
    assert_eq!(april.number.to_string(), "P-SV-001-04-24");
}

#[test]
fn kinds_have_independent_sequences() {
    let conn = open_db_in_memory().unwrap();
    let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());

    service
        .create_document(DocumentKind::Invoice, "Acme", MARCH)
        .unwrap();
    let order = service
        .create_document(DocumentKind::PurchaseOrder, "Supplier", MARCH)
        .unwrap();
    let note = service
        .create_document(DocumentKind::DeliveryNote, "Acme", MARCH)
        .unwrap();

    assert_eq!(order.number.to_string(), "C-SV-001-03-24");
    assert_eq!(note.number.to_string(), "L-SV-001-03-24");
}

#[test]
fn deleted_number_is_not_reused() {
    let conn = open_db_in_memory().unwrap();
    let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());

    for _ in 0..2 {
        service
            .create_document(DocumentKind::Invoice, "Acme", MARCH)
            .unwrap();
    }
    service.delete_document("P-SV-002-03-24").unwrap();

    let next = service
        .create_document(DocumentKind::Invoice, "Acme", MARCH)
        .unwrap();
    assert_eq!(next.number.to_string(), "P-SV-003-03-24");
    assert!(service.get_document("P-SV-002-03-24").unwrap().is_none());
}

#[test]
fn imported_numbers_advance_the_sequence() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDocumentRepository::try_new(&conn).unwrap();
    repo.insert_document(&SequencedDocument {
        number: DocumentNumber::parse("P-SV-010-03-24").unwrap(),
        counterparty: "Legacy".to_string(),
        created_at: 0,
    })
    .unwrap();

    let service = DocumentService::new(repo);
    let next = service
        .create_document(DocumentKind::Invoice, "Acme", MARCH)
        .unwrap();
    assert_eq!(next.number.to_string(), "P-SV-011-03-24");
}

#[test]
fn deleted_import_number_is_not_reused() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDocumentRepository::try_new(&conn).unwrap();
    repo.insert_document(&SequencedDocument {
        number: DocumentNumber::parse("P-SV-002-03-24").unwrap(),
        counterparty: "Legacy".to_string(),
        created_at: 0,
    })
    .unwrap();

    let service = DocumentService::new(repo);
    service.delete_document("P-SV-002-03-24").unwrap();

    let allocated: Vec<String> = (0..2)
        .map(|_| {
            service
                .create_document(DocumentKind::Invoice, "Acme", MARCH)
                .unwrap()
                .number
                .to_string()
        })
        .collect();
    assert_eq!(allocated, vec!["P-SV-003-03-24", "P-SV-004-03-24"]);
}

#[test]
fn corrupt_stored_number_is_surfaced() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO documents (document_number, kind, bucket, sequence)
         VALUES ('P-SV-0x9-03-24', 'invoice', '03-24', 9);",
        [],
    )
    .unwrap();
    let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());

    let err = service
        .create_document(DocumentKind::Invoice, "Acme", MARCH)
        .unwrap_err();
    match err {
        DocumentServiceError::Repo(DocumentRepoError::CorruptDocumentNumber { value, .. }) => {
            assert_eq!(value, "P-SV-0x9-03-24");
        }
        other => panic!("unexpected error: {other}"),
    }

    // Other buckets are unaffected.
    let april = service
        .create_document(DocumentKind::Invoice, "Acme", APRIL)
        .unwrap();
    assert_eq!(april.number.to_string(), "P-SV-001-04-24");
}

#[test]
fn full_bucket_reports_exhaustion() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDocumentRepository::try_new(&conn).unwrap();
    repo.insert_document(&SequencedDocument {
        number: DocumentNumber::parse("L-SV-999-03-24").unwrap(),
        counterparty: String::new(),
        created_at: 0,
    })
    .unwrap();
    let service = DocumentService::new(repo);

    let err = service
        .create_document(DocumentKind::DeliveryNote, "Acme", MARCH)
        .unwrap_err();
    assert!(matches!(
        err,
        DocumentServiceError::Repo(DocumentRepoError::Number(
            DocumentNumberError::SequenceExhausted { .. }
        ))
    ));
}

#[test]
fn preview_does_not_reserve() {
    let conn = open_db_in_memory().unwrap();
    let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());

    let preview = service
        .preview_next_number(DocumentKind::PurchaseOrder, MARCH)
        .unwrap();
    assert_eq!(preview.to_string(), "C-SV-001-03-24");
    assert_eq!(
        service
            .preview_next_number(DocumentKind::PurchaseOrder, MARCH)
            .unwrap(),
        preview
    );

    let created = service
        .create_document(DocumentKind::PurchaseOrder, "Supplier", MARCH)
        .unwrap();
    assert_eq!(created.number, preview);
}

#[test]
fn list_documents_is_chronological() {
    let conn = open_db_in_memory().unwrap();
    let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());

    service
        .create_document(DocumentKind::Invoice, "A", datetime!(2025-01-10 00:00 UTC))
        .unwrap();
    service
        .create_document(DocumentKind::Invoice, "B", datetime!(2024-12-10 00:00 UTC))
        .unwrap();
    service
        .create_document(DocumentKind::Invoice, "C", datetime!(2024-12-11 00:00 UTC))
        .unwrap();

    let all: Vec<String> = service
        .list_documents(DocumentKind::Invoice, None)
        .unwrap()
        .into_iter()
        .map(|document| document.number.to_string())
        .collect();
    assert_eq!(
        all,
        vec!["P-SV-001-12-24", "P-SV-002-12-24", "P-SV-001-01-25"]
    );

    let january = service
        .list_documents(
            DocumentKind::Invoice,
            Some(SequenceBucket::new(1, 25).unwrap()),
        )
        .unwrap();
    assert_eq!(january.len(), 1);
    assert_eq!(january[0].counterparty, "A");
}

#[test]
fn bucket_uses_utc_month() {
    let conn = open_db_in_memory().unwrap();
    let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());

    // 23:30 on March 31st at UTC-2 is already April 1st in UTC.
    let document = service
        .create_document(
            DocumentKind::Invoice,
            "Acme",
            datetime!(2024-03-31 23:30 -2),
        )
        .unwrap();
    assert_eq!(document.number.to_string(), "P-SV-001-04-24");
}

#[test]
fn sequence_survives_reopen_of_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("documents.db");

    {
        let conn = open_db(&path).unwrap();
        let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());
        for _ in 0..3 {
            service
                .create_document(DocumentKind::Invoice, "Acme", MARCH)
                .unwrap();
        }
        service.delete_document("P-SV-003-03-24").unwrap();
    }

    let conn = open_db(&path).unwrap();
    let service = DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());
    let next = service
        .create_document(DocumentKind::Invoice, "Acme", MARCH)
        .unwrap();
    assert_eq!(next.number.to_string(), "P-SV-004-03-24");
}

#[test]
fn concurrent_writers_never_share_a_number() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("concurrent.db");
    drop(open_db(&path).unwrap());

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            std::thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service =
                    DocumentService::new(SqliteDocumentRepository::try_new(&conn).unwrap());
                (0..10)
                    .map(|_| {
                        service
                            .create_document(DocumentKind::Invoice, "Acme", MARCH)
                            .unwrap()
                            .number
                            .sequence
                    })
                    .collect::<Vec<u16>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for worker in workers {
        for sequence in worker.join().unwrap() {
            assert!(seen.insert(sequence), "sequence {sequence} allocated twice");
        }
    }
    assert_eq!(seen, (1..=40).collect::<HashSet<u16>>());

    let conn = Connection::open(&path).unwrap();
    let counter: i64 = conn
        .query_row(
            "SELECT last_sequence FROM document_sequences WHERE kind = 'invoice' AND bucket = '03-24';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(counter, 40);
}
