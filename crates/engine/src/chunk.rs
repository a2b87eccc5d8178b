//! Chunked membership fetches.
//!
//! The backing store caps membership filters at
//! [`MEMBERSHIP_QUERY_LIMIT`] values per query, so bigger value sets are
//! split into consecutive chunks, queried concurrently, and merged with
//! per-record deduplication.

use std::collections::HashMap;
use std::future::Future;

use futures::future::join_all;

use paydeck_core::domain::check::Check;
use paydeck_core::domain::user::User;
use paydeck_db::repositories::{RepositoryError, MEMBERSHIP_QUERY_LIMIT};

/// Record identity used for merge deduplication.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Check {
    fn key(&self) -> &str {
        &self.id.0
    }
}

impl Keyed for User {
    fn key(&self) -> &str {
        &self.id.0
    }
}

/// Fans `values` out in chunks of at most [`MEMBERSHIP_QUERY_LIMIT`],
/// awaits every chunk, and merges the results. A record id appearing in
/// more than one chunk result keeps its first position with the
/// last-seen record winning. An empty value set issues no query at all.
pub async fn fetch_by_membership<V, T, F, Fut>(
    values: &[V],
    query: F,
) -> Result<Vec<T>, RepositoryError>
where
    V: Clone,
    T: Keyed,
    F: Fn(Vec<V>) -> Fut,
    Fut: Future<Output = Result<Vec<T>, RepositoryError>>,
{
    if values.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_queries: Vec<Fut> = values
        .chunks(MEMBERSHIP_QUERY_LIMIT)
        .map(|chunk| query(chunk.to_vec()))
        .collect();
    let settled = join_all(chunk_queries).await;

    let mut merged: Vec<Option<T>> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    for result in settled {
        for record in result? {
            match position.get(record.key()) {
                Some(&index) => merged[index] = Some(record),
                None => {
                    position.insert(record.key().to_string(), merged.len());
                    merged.push(Some(record));
                }
            }
        }
    }

    Ok(merged.into_iter().flatten().collect())
}

/// Point lookups for a set of ids, chunked only to bound concurrency.
/// Ids with no matching record are silently omitted.
pub async fn fetch_by_id_batch<I, T, F, Fut>(
    ids: &[I],
    get: F,
) -> Result<Vec<T>, RepositoryError>
where
    I: Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<Option<T>, RepositoryError>>,
{
    let mut records = Vec::new();
    for chunk in ids.chunks(MEMBERSHIP_QUERY_LIMIT) {
        let settled = join_all(chunk.iter().cloned().map(&get)).await;
        for result in settled {
            if let Some(record) = result? {
                records.push(record);
            }
        }
    }
    Ok(records)
}
