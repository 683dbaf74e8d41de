//! Consistency scanner: read-only diagnosis of one scope.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::config::NumberingConfig;
use crate::counter::Counters;
use crate::receipt::{ReceiptNumber, ScopeKey};
use crate::records::{Record, Records};
use crate::store::{DocumentStore, StoreError};

/// Records sharing one exact receipt number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub number: String,
    pub record_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosisReport {
    pub scope: ScopeKey,
    pub duplicates: Vec<DuplicateGroup>,
    /// Records whose receipt number parses into this scope's year.
    pub total_records: usize,
    pub is_dense: bool,
    /// The dense run `1..=total_records` this scope should be numbered with.
    pub expected_sequence: Vec<String>,
    /// Values of the expected run that no record carries.
    pub missing: Vec<u32>,
    /// Records (any year) whose receipt number does not parse.
    pub unparsable: Vec<String>,
    /// Records attributed to this year that carry no receipt number.
    pub unnumbered: Vec<String>,
    /// Records numbered lower than some record created before them.
    pub out_of_order: Vec<String>,
    /// Current counter value, `None` if the counter was never created.
    pub counter: Option<u32>,
}

impl DiagnosisReport {
    pub fn is_consistent(&self) -> bool {
        self.is_dense && self.duplicates.is_empty() && self.out_of_order.is_empty()
    }

    /// The counter differs from the number of in-year numbered records,
    /// treating a missing counter as zero.
    pub fn counter_drift(&self) -> bool {
        self.counter.unwrap_or(0) as usize != self.total_records
    }
}

/// Produces [`DiagnosisReport`]s. Has no side effects.
pub struct Scanner<'a, S> {
    store: &'a S,
    config: &'a NumberingConfig,
}

impl<'a, S: DocumentStore> Scanner<'a, S> {
    pub fn new(store: &'a S, config: &'a NumberingConfig) -> Self {
        Self { store, config }
    }

    pub fn diagnose(&self, scope: &ScopeKey) -> Result<DiagnosisReport, StoreError> {
        let records = Records::new(self.store, &self.config.retry).query_by_owner(&scope.owner_id)?;
        let counter = Counters::new(self.store, &self.config.retry)
            .get(scope)?
            .map(|c| c.last_number);

        let mut in_scope: Vec<(&Record, ReceiptNumber)> = Vec::new();
        let mut unparsable = Vec::new();
        let mut unnumbered = Vec::new();

        for record in &records {
            match record.parsed_receipt() {
                Some(Ok(number)) if number.year() == scope.year => in_scope.push((record, number)),
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(record = %record.id, error = %err, "unparsable receipt number");
                    unparsable.push(record.id.clone());
                }
                None if record.attribution_year() == scope.year => {
                    unnumbered.push(record.id.clone())
                }
                None => {}
            }
        }

        let total_records = in_scope.len();

        let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (record, _) in &in_scope {
            if let Some(raw) = record.receipt_number.as_deref() {
                groups.entry(raw).or_default().push(record.id.clone());
            }
        }
        let duplicates: Vec<DuplicateGroup> = groups
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(number, record_ids)| DuplicateGroup {
                number: number.to_string(),
                record_ids,
            })
            .collect();

        let present: BTreeSet<u32> = in_scope.iter().map(|(_, n)| n.seq()).collect();
        let expected = 1..=total_records as u32;
        let missing: Vec<u32> = expected.clone().filter(|seq| !present.contains(seq)).collect();
        let expected_sequence = expected
            .map(|seq| ReceiptNumber::new(self.config.prefix.as_str(), seq, scope.year).to_string())
            .collect();

        in_scope.sort_by_key(|(record, _)| record.created_at);
        let mut out_of_order = Vec::new();
        let mut highest = 0;
        for (record, number) in &in_scope {
            if number.seq() < highest {
                out_of_order.push(record.id.clone());
            }
            highest = highest.max(number.seq());
        }

        Ok(DiagnosisReport {
            scope: scope.clone(),
            is_dense: missing.is_empty(),
            duplicates,
            total_records,
            expected_sequence,
            missing,
            unparsable,
            unnumbered,
            out_of_order,
            counter,
        })
    }
}
