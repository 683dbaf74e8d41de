//! Gapless, per-owner, per-year receipt numbering.
//!
//! Numbers such as `REC 007-2025` are handed out by an online [`Allocator`]
//! that pushes every uniqueness guarantee into the store's optimistic
//! read-modify-write primitive ([`run_transaction`]). Offline, the
//! [`Scanner`] diagnoses duplicates and gaps, the [`RepairEngine`]
//! deterministically renumbers an owner's records, and the
//! [`ResetController`] zeroes a counter before forcing a repair.
//!
//! ## Example
//!
//! ```ignore
//! use receipt_numbering::{InMemoryDocumentStore, Numbering, NumberingConfig};
//!
//! let numbering = Numbering::new(InMemoryDocumentStore::new(), NumberingConfig::default());
//! let allocation = numbering.allocate("owner-1")?;
//! println!("{}", allocation.number); // "REC 001-2025"
//! ```

extern crate self as receipt_numbering;

mod allocator;
mod config;
mod counter;
mod lock;
mod numbering;
mod receipt;
mod records;
mod repair;
mod reset;
mod scanner;
mod store;

#[cfg(feature = "http")]
pub mod admin;

pub use allocator::{AllocateError, Allocation, AllocationMode, Allocator};
pub use config::{ConfigError, FallbackPolicy, NumberingConfig, RetryConfig, DEFAULT_LOCK_TIMEOUT_MS};
pub use counter::{Counter, Counters};
pub use lock::{
    InMemoryScopeLock, InMemoryScopeLockManager, LockError, ScopeGuard, ScopeLock,
    ScopeLockManager,
};
pub use numbering::Numbering;
pub use receipt::{ReceiptNumber, ReceiptParseError, ScopeKey, DEFAULT_PREFIX};
pub use records::{Record, Records};
pub use repair::{RepairEngine, RepairResult, YearSummary};
pub use reset::{ResetController, ResetResult};
pub use scanner::{DiagnosisReport, DuplicateGroup, Scanner};
pub use store::{run_transaction, Document, DocumentStore, InMemoryDocumentStore, StoreError, Versioned};

pub use receipt_numbering_macros::Document;
