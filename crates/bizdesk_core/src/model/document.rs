//! Sequenced document identifiers (invoice, purchase order, delivery note).
//!
//! # Responsibility
//! - Map document kinds to their fixed identifier prefixes.
//! - Parse and format `<PREFIX><NNN>-<MM>-<YY>` identifiers.
//! - Compute the next identifier of a bucket from the highest one seen.
//!
//! # Invariants
//! - The textual identifier is the sole identity of a sequenced document.
//! - Sequence numbers are fixed-width (3 digits), so plain ASCII ordering of
//!   identifiers inside one bucket equals numeric ordering.
//! - Sequence numbers start at 1 in every (kind, month, year) bucket.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use time::OffsetDateTime;

/// Largest sequence number representable in the 3-digit identifier field.
pub const MAX_SEQUENCE: u16 = 999;

static DOCUMENT_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<prefix>[A-Z]-SV-)(?P<seq>\d{3})-(?P<month>\d{2})-(?P<year>\d{2})$")
        .expect("valid document number regex")
});

/// Kind of sequenced business document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Proforma / invoice, prefix `P-SV-`.
    Invoice,
    /// Purchase order, prefix `C-SV-`.
    PurchaseOrder,
    /// Delivery note, prefix `L-SV-`.
    DeliveryNote,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 3] = [
        DocumentKind::Invoice,
        DocumentKind::PurchaseOrder,
        DocumentKind::DeliveryNote,
    ];

    /// Identifier prefix including the trailing dash.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Invoice => "P-SV-",
            Self::PurchaseOrder => "C-SV-",
            Self::DeliveryNote => "L-SV-",
        }
    }

    /// Stable storage key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::PurchaseOrder => "purchase_order",
            Self::DeliveryNote => "delivery_note",
        }
    }

    pub fn parse_str(value: &str) -> Option<Self> {
        match value {
            "invoice" => Some(Self::Invoice),
            "purchase_order" => Some(Self::PurchaseOrder),
            "delivery_note" => Some(Self::DeliveryNote),
            _ => None,
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }
}

/// Calendar (month, year) partition in which sequence numbers restart at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceBucket {
    /// 1..=12
    pub month: u8,
    /// Two-digit year (`year % 100`).
    pub year: u8,
}

impl SequenceBucket {
    pub fn new(month: u8, year: u8) -> Result<Self, DocumentNumberError> {
        if !(1..=12).contains(&month) {
            return Err(DocumentNumberError::InvalidMonth(month));
        }
        if year > 99 {
            return Err(DocumentNumberError::InvalidYear(year));
        }
        Ok(Self { month, year })
    }

    /// Derives the bucket from a creation timestamp, normalized to UTC.
    pub fn from_timestamp(at: OffsetDateTime) -> Self {
        let utc = at.to_offset(time::UtcOffset::UTC);
        Self {
            month: u8::from(utc.month()),
            year: utc.year().rem_euclid(100) as u8,
        }
    }

    /// Identifier suffix, e.g. `-03-24`.
    pub fn suffix(&self) -> String {
        format!("-{:02}-{:02}", self.month, self.year)
    }

    /// Storage key without the leading dash, e.g. `03-24`.
    pub fn key(&self) -> String {
        format!("{:02}-{:02}", self.month, self.year)
    }
}

/// Parsed human-readable document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentNumber {
    pub kind: DocumentKind,
    pub sequence: u16,
    pub bucket: SequenceBucket,
}

impl DocumentNumber {
    pub fn new(
        kind: DocumentKind,
        sequence: u16,
        bucket: SequenceBucket,
    ) -> Result<Self, DocumentNumberError> {
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(DocumentNumberError::SequenceOutOfRange(u32::from(sequence)));
        }
        Ok(Self {
            kind,
            sequence,
            bucket,
        })
    }

    /// Parses the bit-exact identifier format.
    pub fn parse(value: &str) -> Result<Self, DocumentNumberError> {
        let captures = DOCUMENT_NUMBER_RE
            .captures(value)
            .ok_or_else(|| DocumentNumberError::Malformed(value.to_string()))?;

        let prefix = &captures["prefix"];
        let kind = DocumentKind::from_prefix(prefix)
            .ok_or_else(|| DocumentNumberError::UnknownPrefix(prefix.to_string()))?;
        let malformed = || DocumentNumberError::Malformed(value.to_string());
        let sequence: u16 = captures["seq"].parse().map_err(|_| malformed())?;
        let month: u8 = captures["month"].parse().map_err(|_| malformed())?;
        let year: u8 = captures["year"].parse().map_err(|_| malformed())?;

        Self::new(kind, sequence, SequenceBucket::new(month, year)?)
    }
}

impl Display for DocumentNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{:03}{}",
            self.kind.prefix(),
            self.sequence,
            self.bucket.suffix()
        )
    }
}

impl FromStr for DocumentNumber {
    type Err = DocumentNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DocumentNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocumentNumber {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Stored sequenced document header.
///
/// Line items and totals live with the owning invoice/order payload outside
/// this crate; only the identity-relevant header is modeled here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedDocument {
    pub number: DocumentNumber,
    /// Client or supplier display name.
    pub counterparty: String,
    /// Unix epoch milliseconds of the allocation.
    pub created_at: i64,
}

/// Computes the identifier following `last_seen` in one bucket.
///
/// `last_seen` is the highest identifier currently known for the bucket, or
/// `None` when the bucket is empty (the sequence then starts at 1).
///
/// # Errors
/// - `BucketMismatch` when `last_seen` belongs to another kind or bucket.
/// - `SequenceExhausted` when the bucket already reached `MAX_SEQUENCE`.
pub fn next_document_number(
    kind: DocumentKind,
    bucket: SequenceBucket,
    last_seen: Option<&DocumentNumber>,
) -> Result<DocumentNumber, DocumentNumberError> {
    let last_sequence = match last_seen {
        Some(last) if last.kind != kind || last.bucket != bucket => {
            return Err(DocumentNumberError::BucketMismatch(last.to_string()));
        }
        Some(last) => last.sequence,
        None => 0,
    };
    next_after_sequence(kind, bucket, last_sequence)
}

/// Same as [`next_document_number`] but starting from a raw counter value.
pub fn next_after_sequence(
    kind: DocumentKind,
    bucket: SequenceBucket,
    last_sequence: u16,
) -> Result<DocumentNumber, DocumentNumberError> {
    if last_sequence >= MAX_SEQUENCE {
        return Err(DocumentNumberError::SequenceExhausted {
            kind,
            bucket: bucket.key(),
        });
    }
    DocumentNumber::new(kind, last_sequence + 1, bucket)
}

/// Errors from parsing or computing document identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentNumberError {
    /// Identifier does not match `<PREFIX><NNN>-<MM>-<YY>`.
    Malformed(String),
    /// Prefix is well-formed but not mapped to a document kind.
    UnknownPrefix(String),
    InvalidMonth(u8),
    InvalidYear(u8),
    /// Sequence is 0 or does not fit in three digits.
    SequenceOutOfRange(u32),
    /// Bucket already holds `MAX_SEQUENCE` documents.
    SequenceExhausted { kind: DocumentKind, bucket: String },
    /// Reference identifier belongs to a different kind or bucket.
    BucketMismatch(String),
}

impl Display for DocumentNumberError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(value) => write!(f, "malformed document number `{value}`"),
            Self::UnknownPrefix(prefix) => write!(f, "unknown document prefix `{prefix}`"),
            Self::InvalidMonth(month) => write!(f, "invalid month {month}; expected 1..=12"),
            Self::InvalidYear(year) => write!(f, "invalid two-digit year {year}"),
            Self::SequenceOutOfRange(seq) => {
                write!(f, "sequence {seq} out of range 1..={MAX_SEQUENCE}")
            }
            Self::SequenceExhausted { kind, bucket } => write!(
                f,
                "sequence exhausted for {} in bucket {bucket}",
                kind.as_str()
            ),
            Self::BucketMismatch(value) => {
                write!(f, "document number `{value}` belongs to another bucket")
            }
        }
    }
}

impl Error for DocumentNumberError {}
