//! Sequenced document use-case service.
//!
//! # Responsibility
//! - Create invoices, purchase orders and delivery notes with the next
//!   human-readable number of their (kind, month, year) bucket.
//! - Retry allocation when the store reports a number collision.
//!
//! # Invariants
//! - The bucket is always derived from the creation timestamp, never passed in.
//! - A failed creation leaves nothing reserved; callers simply retry.
//! - Store errors other than collisions propagate unchanged, without retry.

use crate::config::{CoreConfig, DEFAULT_ALLOCATOR_MAX_ATTEMPTS};
use crate::model::document::{
    DocumentKind, DocumentNumber, DocumentNumberError, SequenceBucket, SequencedDocument,
};
use crate::repo::document_repo::{DocumentRepoError, DocumentRepository};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::OffsetDateTime;

/// Errors from document use-cases.
#[derive(Debug)]
pub enum DocumentServiceError {
    /// Caller-supplied document number does not parse.
    InvalidNumber(DocumentNumberError),
    NotFound(DocumentNumber),
    /// Every allocation attempt collided with an existing number.
    AllocationConflict {
        kind: DocumentKind,
        bucket: SequenceBucket,
        attempts: u32,
    },
    Repo(DocumentRepoError),
}

impl Display for DocumentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber(err) => write!(f, "{err}"),
            Self::NotFound(number) => write!(f, "document not found: {number}"),
            Self::AllocationConflict {
                kind,
                bucket,
                attempts,
            } => write!(
                f,
                "could not allocate {} number in bucket {} after {attempts} attempts",
                kind.as_str(),
                bucket.key()
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DocumentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidNumber(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DocumentRepoError> for DocumentServiceError {
    fn from(value: DocumentRepoError) -> Self {
        match value {
            DocumentRepoError::NotFound(number) => Self::NotFound(number),
            other => Self::Repo(other),
        }
    }
}

/// Document service facade.
pub struct DocumentService<R: DocumentRepository> {
    repo: R,
    max_attempts: u32,
}

impl<R: DocumentRepository> DocumentService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            max_attempts: DEFAULT_ALLOCATOR_MAX_ATTEMPTS,
        }
    }

    /// Creates service with the allocator retry policy from `config`.
    pub fn with_config(repo: R, config: &CoreConfig) -> Self {
        Self {
            repo,
            max_attempts: config.allocator_max_attempts.max(1),
        }
    }

    /// Creates a document stamped with the current UTC time.
    pub fn create_document_now(
        &self,
        kind: DocumentKind,
        counterparty: &str,
    ) -> Result<SequencedDocument, DocumentServiceError> {
        self.create_document(kind, counterparty, OffsetDateTime::now_utc())
    }

    /// Creates a document with the next number of the bucket of `at`.
    ///
    /// # Errors
    /// - `AllocationConflict` after `max_attempts` colliding inserts.
    /// - `Repo(CorruptDocumentNumber)` when the bucket holds an unparsable id.
    /// - `Repo(Number(SequenceExhausted))` when the bucket is full.
    pub fn create_document(
        &self,
        kind: DocumentKind,
        counterparty: &str,
        at: OffsetDateTime,
    ) -> Result<SequencedDocument, DocumentServiceError> {
        let bucket = SequenceBucket::from_timestamp(at);
        let created_at = epoch_millis(at);
        let counterparty = counterparty.trim();

        for attempt in 1..=self.max_attempts {
            match self
                .repo
                .allocate_and_insert(kind, bucket, counterparty, created_at)
            {
                Ok(document) => {
                    info!(
                        "event=document_allocate module=document status=ok kind={} number={} attempt={}",
                        kind.as_str(),
                        document.number,
                        attempt
                    );
                    return Ok(document);
                }
                Err(DocumentRepoError::Conflict(number)) => {
                    warn!(
                        "event=document_allocate module=document status=conflict kind={} number={} attempt={}",
                        kind.as_str(),
                        number,
                        attempt
                    );
                }
                Err(err) => {
                    error!(
                        "event=document_allocate module=document status=error kind={} bucket={} error={}",
                        kind.as_str(),
                        bucket.key(),
                        err
                    );
                    return Err(err.into());
                }
            }
        }

        Err(DocumentServiceError::AllocationConflict {
            kind,
            bucket,
            attempts: self.max_attempts,
        })
    }

    /// Number the next creation at `at` would receive. Nothing is reserved.
    pub fn preview_next_number(
        &self,
        kind: DocumentKind,
        at: OffsetDateTime,
    ) -> Result<DocumentNumber, DocumentServiceError> {
        let bucket = SequenceBucket::from_timestamp(at);
        Ok(self.repo.peek_next_number(kind, bucket)?)
    }

    pub fn get_document(
        &self,
        number: &str,
    ) -> Result<Option<SequencedDocument>, DocumentServiceError> {
        let number = parse_number(number)?;
        Ok(self.repo.get_document(&number)?)
    }

    pub fn list_documents(
        &self,
        kind: DocumentKind,
        bucket: Option<SequenceBucket>,
    ) -> Result<Vec<SequencedDocument>, DocumentServiceError> {
        Ok(self.repo.list_documents(kind, bucket)?)
    }

    /// Deletes one document. Its number is not handed out again.
    pub fn delete_document(&self, number: &str) -> Result<(), DocumentServiceError> {
        let number = parse_number(number)?;
        self.repo.delete_document(&number)?;
        info!(
            "event=document_delete module=document status=ok number={}",
            number
        );
        Ok(())
    }
}

fn parse_number(value: &str) -> Result<DocumentNumber, DocumentServiceError> {
    DocumentNumber::parse(value.trim()).map_err(DocumentServiceError::InvalidNumber)
}

fn epoch_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::next_after_sequence;
    use crate::repo::document_repo::DocumentRepoResult;
    use std::cell::Cell;
    use time::macros::datetime;

    /// Repository stub that collides a fixed number of times.
    struct CollidingRepo {
        collisions_left: Cell<u32>,
        calls: Cell<u32>,
    }

    impl CollidingRepo {
        fn new(collisions: u32) -> Self {
            Self {
                collisions_left: Cell::new(collisions),
                calls: Cell::new(0),
            }
        }
    }

    impl DocumentRepository for &CollidingRepo {
        fn allocate_and_insert(
            &self,
            kind: DocumentKind,
            bucket: SequenceBucket,
            counterparty: &str,
            created_at: i64,
        ) -> DocumentRepoResult<SequencedDocument> {
            self.calls.set(self.calls.get() + 1);
            let number = next_after_sequence(kind, bucket, self.calls.get() as u16 - 1)?;
            if self.collisions_left.get() > 0 {
                self.collisions_left.set(self.collisions_left.get() - 1);
                return Err(DocumentRepoError::Conflict(number));
            }
            Ok(SequencedDocument {
                number,
                counterparty: counterparty.to_string(),
                created_at,
            })
        }

        fn peek_next_number(
            &self,
            kind: DocumentKind,
            bucket: SequenceBucket,
        ) -> DocumentRepoResult<DocumentNumber> {
            Ok(next_after_sequence(kind, bucket, 0)?)
        }

        fn insert_document(&self, _document: &SequencedDocument) -> DocumentRepoResult<()> {
            Ok(())
        }

        fn get_document(
            &self,
            _number: &DocumentNumber,
        ) -> DocumentRepoResult<Option<SequencedDocument>> {
            Ok(None)
        }

        fn list_documents(
            &self,
            _kind: DocumentKind,
            _bucket: Option<SequenceBucket>,
        ) -> DocumentRepoResult<Vec<SequencedDocument>> {
            Ok(Vec::new())
        }

        fn delete_document(&self, number: &DocumentNumber) -> DocumentRepoResult<()> {
            Err(DocumentRepoError::NotFound(*number))
        }
    }

    #[test]
    fn retries_after_collision_until_success() {
        let repo = CollidingRepo::new(2);
        let service = DocumentService::new(&repo);

        let document = service
            .create_document(
                DocumentKind::Invoice,
                "  Acme d.o.o. ",
                datetime!(2024-03-15 09:00 UTC),
            )
            .unwrap();

        assert_eq!(repo.calls.get(), 3);
        assert_eq!(document.number.to_string(), "P-SV-003-03-24");
        assert_eq!(document.counterparty, "Acme d.o.o.");
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let repo = CollidingRepo::new(10);
        let config = CoreConfig {
            allocator_max_attempts: 2,
            ..CoreConfig::default()
        };
        let service = DocumentService::with_config(&repo, &config);

        let err = service
            .create_document(DocumentKind::DeliveryNote, "", datetime!(2024-04-01 00:00 UTC))
            .unwrap_err();

        assert!(matches!(
            err,
            DocumentServiceError::AllocationConflict { attempts: 2, .. }
        ));
        assert_eq!(repo.calls.get(), 2);
    }

    #[test]
    fn malformed_input_number_is_rejected_before_store_access() {
        let repo = CollidingRepo::new(0);
        let service = DocumentService::new(&repo);
        let err = service.delete_document("INV-1").unwrap_err();
        assert!(matches!(err, DocumentServiceError::InvalidNumber(_)));

        let err = service.delete_document("P-SV-001-03-24").unwrap_err();
        assert!(matches!(err, DocumentServiceError::NotFound(_)));
    }
}
