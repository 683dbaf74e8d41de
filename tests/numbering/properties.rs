use std::collections::BTreeSet;

use proptest::prelude::*;
use receipt_numbering::{InMemoryDocumentStore, Numbering, ReceiptNumber, ScopeKey};

use crate::support::{config, instant, receipt_of, seed};

proptest! {
    #[test]
    fn format_then_parse_recovers_seq_and_year(seq in 1u32..=999, year in 1000i32..=9999) {
        let formatted = ReceiptNumber::new("REC", seq, year).to_string();
        let parsed = ReceiptNumber::parse(&formatted).unwrap();
        prop_assert_eq!((parsed.seq(), parsed.year()), (seq, year));
        prop_assert_eq!(parsed.prefix(), "REC");
    }

    #[test]
    fn allocations_from_one_caller_strictly_increase(calls in 1usize..40) {
        let numbering = Numbering::new(InMemoryDocumentStore::new(), config());
        let scope = ScopeKey::new("owner-1", 2025);

        let seqs: Vec<u32> = (0..calls)
            .map(|_| numbering.allocate_in(&scope).unwrap().number.seq())
            .collect();

        prop_assert!(seqs.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(seqs, (1..=calls as u32).collect::<Vec<_>>());
    }

    #[test]
    fn repair_always_restores_density(prior in proptest::collection::vec(
        proptest::option::of(1u32..20),
        0..15,
    )) {
        let numbering = Numbering::new(InMemoryDocumentStore::new(), config());
        let numbers: Vec<Option<String>> = prior
            .iter()
            .map(|seq| seq.map(|s| ReceiptNumber::new("REC", s, 2025).to_string()))
            .collect();
        let borrowed: Vec<Option<&str>> = numbers.iter().map(|n| n.as_deref()).collect();
        let ids = seed(numbering.store(), "owner-1", instant(2025, 1, 1), &borrowed);

        let result = numbering.repair("owner-1");
        prop_assert!(result.is_complete());

        let report = numbering.diagnose_scope(&ScopeKey::new("owner-1", 2025)).unwrap();
        prop_assert!(report.is_consistent());
        prop_assert_eq!(report.total_records, ids.len());

        let seqs: BTreeSet<u32> = ids
            .iter()
            .map(|id| ReceiptNumber::parse(&receipt_of(numbering.store(), id).unwrap()).unwrap().seq())
            .collect();
        prop_assert_eq!(seqs, (1..=ids.len() as u32).collect::<BTreeSet<_>>());
    }
}
