//! Optimistic read-modify-write over a single document.

use backon::BlockingRetryable;
use tracing::warn;

use super::{Document, DocumentStore, StoreError, Versioned};
use crate::config::RetryConfig;

/// Read a document, transform it, and write it back only if nobody else
/// committed in between.
///
/// `apply` receives the current document (`None` when absent) and returns
/// the replacement, whose id must be `id`. An absent document is created
/// with `insert`, an existing one is written with a conditional `update`.
/// Version conflicts re-run the whole read-apply-write cycle with
/// exponential backoff until `retry` is exhausted; every other error, or an
/// error returned by `apply`, ends the transaction immediately.
pub fn run_transaction<S, D, F>(
    store: &S,
    id: &str,
    retry: &RetryConfig,
    mut apply: F,
) -> Result<Versioned<D>, StoreError>
where
    S: DocumentStore,
    D: Document,
    F: FnMut(Option<D>) -> Result<D, StoreError>,
{
    let attempt = || match store.get::<D>(id)? {
        None => {
            let created = apply(None)?;
            debug_assert_eq!(created.id(), id);
            store.insert(&created)
        }
        Some(current) => {
            let next = apply(Some(current.data))?;
            debug_assert_eq!(next.id(), id);
            store.update(&next, current.version)
        }
    };

    attempt
        .retry(retry.backoff())
        .sleep(std::thread::sleep)
        .when(StoreError::is_conflict)
        .notify(|err, dur| {
            warn!(
                collection = D::COLLECTION,
                id = %id,
                error = %err,
                retry_in = ?dur,
                "transaction conflicted, retrying"
            );
        })
        .call()
}
