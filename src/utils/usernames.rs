//! Username availability lookups for registration.
//!
//! A cuckoo filter answers "definitely free" without touching the database, a moka
//! cache answers "recently seen, taken". Everything else falls through to MySQL.

use anyhow::{Context, Result};
use autoscale_cuckoo_filter::CuckooFilter;
use chrono::{NaiveDateTime, Utc};
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;
use std::time::Duration;

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Users who logged in within this many days are cached as taken at startup.
const RECENT_LOGIN_DAYS: i64 = 30;

static FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

static TAKEN: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(500_000)
        .time_to_live(Duration::from_secs(86_400))
        .build()
});

pub fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

fn might_exist(username: &str) -> bool {
    let key = normalize(username);
    // a poisoned lock only means a writer panicked mid-insert; the filter is still usable
    match FILTER.read() {
        Ok(filter) => filter.contains(&key),
        Err(poisoned) => poisoned.into_inner().contains(&key),
    }
}

fn add_to_filter<'a>(keys: impl IntoIterator<Item = &'a String>) {
    let mut filter = match FILTER.write() {
        Ok(f) => f,
        Err(poisoned) => poisoned.into_inner(),
    };
    for key in keys {
        filter.add(key);
    }
}

/// Records a freshly registered username in both structures.
pub async fn remember(username: &str) {
    let key = normalize(username);
    add_to_filter([&key]);
    TAKEN.insert(key, ()).await;
}

/// Forgets a deleted username. The filter keeps a possible false positive, which only
/// costs a database lookup.
pub async fn forget(username: &str) {
    TAKEN.invalidate(&normalize(username)).await;
}

/// `true` when nobody holds the name (case-insensitive).
pub async fn is_available(username: &str, pool: &MySqlPool) -> Result<bool, sqlx::Error> {
    let key = normalize(username);

    if !might_exist(&key) {
        return Ok(true);
    }

    if TAKEN.contains_key(&key) {
        return Ok(false);
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = ? LIMIT 1)",
    )
    .bind(&key)
    .fetch_one(pool)
    .await?;

    if exists {
        TAKEN.insert(key, ()).await;
    }

    Ok(!exists)
}

/// Streams every username into the filter and recently active ones into the cache.
pub async fn warmup(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let recent_cutoff: NaiveDateTime =
        (Utc::now() - chrono::Duration::days(RECENT_LOGIN_DAYS)).naive_utc();

    let mut stream = sqlx::query_as::<_, (String, Option<NaiveDateTime>)>(
        "SELECT username, last_login_at FROM users",
    )
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;
    let mut recent = 0usize;

    while let Some(row) = stream.next().await {
        let (username, last_login) = row.context("username row fetch failed")?;
        let key = normalize(&username);

        if last_login.is_some_and(|t| t >= recent_cutoff) {
            TAKEN.insert(key.clone(), ()).await;
            recent += 1;
        }

        batch.push(key);
        total += 1;

        if batch.len() == batch_size {
            add_to_filter(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        add_to_filter(&batch);
    }

    tracing::info!(total, recent, "Username index warmup complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize("  Amina.K "), "amina.k");
    }

    #[actix_web::test]
    async fn remembered_names_are_seen() {
        remember("Zeeshan.Test.Only").await;
        assert!(might_exist("zeeshan.test.only"));
        assert!(TAKEN.contains_key("zeeshan.test.only"));

        forget("ZEESHAN.test.only").await;
        assert!(!TAKEN.contains_key("zeeshan.test.only"));
    }
}
