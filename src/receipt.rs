//! Scope keys and the receipt number grammar: `PREFIX SP digit{3} '-' digit{4}`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "REC";

/// One independent numbering stream: an owner within a calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    pub owner_id: String,
    pub year: i32,
}

impl ScopeKey {
    pub fn new(owner_id: impl Into<String>, year: i32) -> Self {
        Self {
            owner_id: owner_id.into(),
            year,
        }
    }

    /// Scope for an owner at the given instant (UTC calendar year).
    pub fn at(owner_id: impl Into<String>, instant: DateTime<Utc>) -> Self {
        Self::new(owner_id, instant.year())
    }

    /// Scope for an owner in the current wall-clock year.
    pub fn current(owner_id: impl Into<String>) -> Self {
        Self::at(owner_id, Utc::now())
    }

    /// Key of the counter document backing this scope.
    pub fn document_id(&self) -> String {
        format!("{}_{}", self.owner_id, self.year)
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiptParseError {
    #[error("malformed receipt number: {0:?}")]
    Malformed(String),
    #[error("receipt number has a zero sequence: {0:?}")]
    ZeroSequence(String),
}

/// A formatted receipt identifier such as `REC 007-2025`.
///
/// Sequences above 999 keep growing in width (`REC 1000-2025`); parsing
/// accepts three or more digits for the sequence and exactly four for the year.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptNumber {
    prefix: String,
    seq: u32,
    year: i32,
}

impl ReceiptNumber {
    pub fn new(prefix: impl Into<String>, seq: u32, year: i32) -> Self {
        Self {
            prefix: prefix.into(),
            seq,
            year,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn parse(s: &str) -> Result<Self, ReceiptParseError> {
        let malformed = || ReceiptParseError::Malformed(s.to_string());

        let (prefix, tail) = s.rsplit_once(' ').ok_or_else(malformed)?;
        if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
            return Err(malformed());
        }

        let (seq, year) = tail.split_once('-').ok_or_else(malformed)?;
        if seq.len() < 3 || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }

        let seq: u32 = seq.parse().map_err(|_| malformed())?;
        if seq == 0 {
            return Err(ReceiptParseError::ZeroSequence(s.to_string()));
        }
        let year: i32 = year.parse().map_err(|_| malformed())?;

        Ok(Self {
            prefix: prefix.to_string(),
            seq,
            year,
        })
    }
}

impl fmt::Display for ReceiptNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:03}-{}", self.prefix, self.seq, self.year)
    }
}

impl FromStr for ReceiptNumber {
    type Err = ReceiptParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
