//! Sequenced document repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist document headers keyed by their formatted number.
//! - Allocate the next number of a (kind, month, year) bucket and insert the
//!   document in the same IMMEDIATE transaction.
//!
//! # Invariants
//! - The bucket counter in `document_sequences` never decreases, so numbers
//!   freed by deletion are not handed out again.
//! - The highest stored number of a bucket is found by a lexicographic range
//!   query; a stored number that fails to parse is reported as corruption,
//!   never treated as "no documents".
//! - Allocation reads and the insert share one write lock; no number is
//!   reserved outside the transaction that stores the document.

use crate::db::schema::{ensure_schema_ready, TableRequirement};
use crate::db::DbError;
use crate::model::document::{
    next_after_sequence, next_document_number, DocumentKind, DocumentNumber, DocumentNumberError,
    SequenceBucket, SequencedDocument,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const DOCUMENT_SELECT_SQL: &str = "SELECT
    document_number,
    kind,
    counterparty,
    created_at
FROM documents";

const REQUIRED_TABLES: &[TableRequirement] = &[
    TableRequirement {
        table: "documents",
        columns: &[
            "document_number",
            "kind",
            "bucket",
            "sequence",
            "counterparty",
            "created_at",
        ],
    },
    TableRequirement {
        table: "document_sequences",
        columns: &["kind", "bucket", "last_sequence"],
    },
];

pub type DocumentRepoResult<T> = Result<T, DocumentRepoError>;

/// Errors from document persistence and allocation.
#[derive(Debug)]
pub enum DocumentRepoError {
    /// Underlying SQLite/bootstrap error, propagated unchanged.
    Db(DbError),
    NotFound(DocumentNumber),
    /// A stored number in the queried bucket cannot be parsed.
    CorruptDocumentNumber {
        value: String,
        reason: DocumentNumberError,
    },
    /// The computed number already exists (a writer bypassed the counter).
    Conflict(DocumentNumber),
    /// Number computation failed, e.g. the bucket is exhausted.
    Number(DocumentNumberError),
    InvalidData(String),
}

impl Display for DocumentRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(number) => write!(f, "document not found: {number}"),
            Self::CorruptDocumentNumber { value, reason } => {
                write!(f, "corrupt stored document number `{value}`: {reason}")
            }
            Self::Conflict(number) => write!(f, "document number already in use: {number}"),
            Self::Number(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted document data: {message}"),
        }
    }
}

impl Error for DocumentRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::CorruptDocumentNumber { reason, .. } => Some(reason),
            Self::Number(err) => Some(err),
            Self::NotFound(_) | Self::Conflict(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for DocumentRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for DocumentRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<DocumentNumberError> for DocumentRepoError {
    fn from(value: DocumentNumberError) -> Self {
        Self::Number(value)
    }
}

/// Repository interface for sequenced documents.
pub trait DocumentRepository {
    /// Allocates the next bucket number and stores the document atomically.
    fn allocate_and_insert(
        &self,
        kind: DocumentKind,
        bucket: SequenceBucket,
        counterparty: &str,
        created_at: i64,
    ) -> DocumentRepoResult<SequencedDocument>;
    /// Computes the number the next allocation would get, without reserving it.
    fn peek_next_number(
        &self,
        kind: DocumentKind,
        bucket: SequenceBucket,
    ) -> DocumentRepoResult<DocumentNumber>;
    /// Stores a document with an externally assigned number (imports).
    ///
    /// The bucket counter is raised to the imported sequence, so the number
    /// stays retired even if the document is deleted later.
    fn insert_document(&self, document: &SequencedDocument) -> DocumentRepoResult<()>;
    fn get_document(
        &self,
        number: &DocumentNumber,
    ) -> DocumentRepoResult<Option<SequencedDocument>>;
    /// Lists documents of one kind, optionally limited to a bucket, ascending.
    fn list_documents(
        &self,
        kind: DocumentKind,
        bucket: Option<SequenceBucket>,
    ) -> DocumentRepoResult<Vec<SequencedDocument>>;
    /// Hard-deletes one document. The bucket counter is left untouched.
    fn delete_document(&self, number: &DocumentNumber) -> DocumentRepoResult<()>;
}

/// SQLite-backed document repository.
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> DocumentRepoResult<Self> {
        ensure_schema_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn allocate_and_insert(
        &self,
        kind: DocumentKind,
        bucket: SequenceBucket,
        counterparty: &str,
        created_at: i64,
    ) -> DocumentRepoResult<SequencedDocument> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let number = compute_next_number(&tx, kind, bucket)?;
        let document = SequencedDocument {
            number,
            counterparty: counterparty.to_string(),
            created_at,
        };

        insert_document_row(&tx, &document)?;
        raise_counter(&tx, &number)?;
        tx.commit()?;
        Ok(document)
    }

    fn peek_next_number(
        &self,
        kind: DocumentKind,
        bucket: SequenceBucket,
    ) -> DocumentRepoResult<DocumentNumber> {
        compute_next_number(self.conn, kind, bucket)
    }

    fn insert_document(&self, document: &SequencedDocument) -> DocumentRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        insert_document_row(&tx, document)?;
        raise_counter(&tx, &document.number)?;
        tx.commit()?;
        Ok(())
    }

    fn get_document(
        &self,
        number: &DocumentNumber,
    ) -> DocumentRepoResult<Option<SequencedDocument>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DOCUMENT_SELECT_SQL} WHERE document_number = ?1;"))?;
        let mut rows = stmt.query([number.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_document_row(row)?));
        }
        Ok(None)
    }

    fn list_documents(
        &self,
        kind: DocumentKind,
        bucket: Option<SequenceBucket>,
    ) -> DocumentRepoResult<Vec<SequencedDocument>> {
        let mut stmt = self.conn.prepare(&format!(
            "{DOCUMENT_SELECT_SQL}
             WHERE kind = ?1
               AND (?2 IS NULL OR bucket = ?2)
             ORDER BY substr(bucket, 4, 2) ASC, substr(bucket, 1, 2) ASC, document_number ASC;"
        ))?;
        let mut rows = stmt.query(params![kind.as_str(), bucket.map(|value| value.key())])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(row)?);
        }
        Ok(documents)
    }

    fn delete_document(&self, number: &DocumentNumber) -> DocumentRepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM documents WHERE document_number = ?1;",
            [number.to_string()],
        )?;
        if changed == 0 {
            return Err(DocumentRepoError::NotFound(*number));
        }
        Ok(())
    }
}

fn compute_next_number(
    conn: &Connection,
    kind: DocumentKind,
    bucket: SequenceBucket,
) -> DocumentRepoResult<DocumentNumber> {
    let counter: Option<i64> = conn
        .query_row(
            "SELECT last_sequence
             FROM document_sequences
             WHERE kind = ?1 AND bucket = ?2;",
            params![kind.as_str(), bucket.key()],
            |row| row.get(0),
        )
        .optional()?;
    let counter = match counter {
        Some(value) => u16::try_from(value).map_err(|_| {
            DocumentRepoError::InvalidData(format!(
                "invalid last_sequence `{value}` in document_sequences"
            ))
        })?,
        None => 0,
    };

    let next = match highest_number_in_bucket(conn, kind, bucket)? {
        Some(highest) if highest.sequence >= counter => {
            next_document_number(kind, bucket, Some(&highest))?
        }
        _ => next_after_sequence(kind, bucket, counter)?,
    };
    Ok(next)
}

/// Moves the bucket counter up to `number`; it never moves down.
fn raise_counter(conn: &Connection, number: &DocumentNumber) -> DocumentRepoResult<()> {
    conn.execute(
        "INSERT INTO document_sequences (kind, bucket, last_sequence)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(kind, bucket) DO UPDATE SET
            last_sequence = MAX(last_sequence, excluded.last_sequence),
            updated_at = (strftime('%s', 'now') * 1000);",
        params![
            number.kind.as_str(),
            number.bucket.key(),
            i64::from(number.sequence)
        ],
    )?;
    Ok(())
}

fn highest_number_in_bucket(
    conn: &Connection,
    kind: DocumentKind,
    bucket: SequenceBucket,
) -> DocumentRepoResult<Option<DocumentNumber>> {
    let prefix = kind.prefix();
    let suffix = bucket.suffix();
    let value: Option<String> = conn
        .query_row(
            "SELECT document_number
             FROM documents
             WHERE document_number >= ?1
               AND document_number < ?2
               AND document_number LIKE ?3
             ORDER BY document_number DESC
             LIMIT 1;",
            params![
                prefix,
                prefix_upper_bound(prefix),
                format!("{prefix}%{suffix}")
            ],
            |row| row.get(0),
        )
        .optional()?;

    let Some(value) = value else {
        return Ok(None);
    };
    match DocumentNumber::parse(&value) {
        Ok(number) if number.kind == kind && number.bucket == bucket => Ok(Some(number)),
        Ok(_) => Err(DocumentRepoError::CorruptDocumentNumber {
            reason: DocumentNumberError::BucketMismatch(value.clone()),
            value,
        }),
        Err(reason) => Err(DocumentRepoError::CorruptDocumentNumber { value, reason }),
    }
}

/// Smallest string greater than every string starting with `prefix`.
fn prefix_upper_bound(prefix: &str) -> String {
    let mut bytes = prefix.as_bytes().to_vec();
    // Prefixes are ASCII and end with '-', so the last byte never overflows.
    if let Some(last) = bytes.last_mut() {
        *last += 1;
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn insert_document_row(conn: &Connection, document: &SequencedDocument) -> DocumentRepoResult<()> {
    let number = document.number;
    let result = conn.execute(
        "INSERT INTO documents (
            document_number,
            kind,
            bucket,
            sequence,
            counterparty,
            created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            number.to_string(),
            number.kind.as_str(),
            number.bucket.key(),
            i64::from(number.sequence),
            document.counterparty.as_str(),
            document.created_at,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(err) => {
            let err = DbError::from(err);
            if err.is_unique_violation() {
                Err(DocumentRepoError::Conflict(number))
            } else {
                Err(err.into())
            }
        }
    }
}

fn parse_document_row(row: &Row<'_>) -> DocumentRepoResult<SequencedDocument> {
    let value: String = row.get("document_number")?;
    let number = DocumentNumber::parse(&value).map_err(|reason| {
        DocumentRepoError::CorruptDocumentNumber {
            value: value.clone(),
            reason,
        }
    })?;

    let kind_text: String = row.get("kind")?;
    if DocumentKind::parse_str(&kind_text) != Some(number.kind) {
        return Err(DocumentRepoError::InvalidData(format!(
            "kind `{kind_text}` does not match document number `{value}`"
        )));
    }

    Ok(SequencedDocument {
        number,
        counterparty: row.get("counterparty")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::prefix_upper_bound;

    #[test]
    fn prefix_upper_bound_bumps_last_byte() {
        assert_eq!(prefix_upper_bound("P-SV-"), "P-SV.");
        assert!("P-SV-999-12-99" < prefix_upper_bound("P-SV-").as_str());
        assert!("P-SV-" <= "P-SV-001-01-24");
    }
}
