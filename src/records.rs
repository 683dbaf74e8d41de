//! Numbered records (orders) and the narrow slice of record storage the
//! numbering subsystem needs.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RetryConfig;
use crate::receipt::{ReceiptNumber, ReceiptParseError};
use crate::store::{run_transaction, DocumentStore, StoreError};
use crate::Document;

/// An order as seen by the numbering subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Document)]
#[document(collection = "orders")]
pub struct Record {
    pub id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    /// Business date of the order, when it differs from the creation instant.
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub receipt_number: Option<String>,
}

impl Record {
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            created_at,
            order_date: None,
            receipt_number: None,
        }
    }

    pub fn with_order_date(mut self, order_date: NaiveDate) -> Self {
        self.order_date = Some(order_date);
        self
    }

    pub fn with_receipt_number(mut self, number: impl Into<String>) -> Self {
        self.receipt_number = Some(number.into());
        self
    }

    /// Year this record is numbered under during repair: the order date's
    /// year, or the creation year when no order date is recorded.
    pub fn attribution_year(&self) -> i32 {
        self.order_date
            .map(|d| d.year())
            .unwrap_or_else(|| self.created_at.year())
    }

    /// Parse the stored receipt number. `None` when the record has none.
    pub fn parsed_receipt(&self) -> Option<Result<ReceiptNumber, ReceiptParseError>> {
        self.receipt_number.as_deref().map(ReceiptNumber::parse)
    }
}

/// Typed access to the record collection of a [`DocumentStore`].
pub struct Records<'a, S> {
    store: &'a S,
    retry: &'a RetryConfig,
}

impl<'a, S: DocumentStore> Records<'a, S> {
    pub fn new(store: &'a S, retry: &'a RetryConfig) -> Self {
        Self { store, retry }
    }

    pub fn insert(&self, record: &Record) -> Result<(), StoreError> {
        self.store.insert(record).map(|_| ())
    }

    pub fn get(&self, id: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.store.get::<Record>(id)?.map(|v| v.data))
    }

    /// Every record of an owner, across all years, in store order.
    pub fn query_by_owner(&self, owner_id: &str) -> Result<Vec<Record>, StoreError> {
        let found = self.store.find::<Record>(&|r: &Record| r.owner_id == owner_id)?;
        Ok(found.into_iter().map(|v| v.data).collect())
    }

    /// Rewrite one record's receipt number, leaving its other fields as
    /// they are in the store at write time.
    pub fn set_receipt_number(&self, id: &str, number: &ReceiptNumber) -> Result<(), StoreError> {
        let formatted = number.to_string();
        run_transaction(self.store, id, self.retry, |current: Option<Record>| {
            let mut record = current.ok_or_else(|| StoreError::not_found::<Record>(id))?;
            record.receipt_number = Some(formatted.clone());
            Ok(record)
        })
        .map(|_| ())
    }
}
