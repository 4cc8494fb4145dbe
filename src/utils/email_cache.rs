use anyhow::Result;
use futures_util::TryStreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

/// Emails known to be registered. Only taken emails are stored, so a miss
/// means "ask the database", never "available".
pub static EMAIL_CACHE: Lazy<Cache<String, bool>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(500_000)
        .time_to_live(Duration::from_secs(86400)) // 24h
        .build()
});

pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn mark_taken(email: &str) {
    EMAIL_CACHE.insert(normalize(email), true).await;
}

/// Drops a rejected registration so the address can be reused.
pub async fn forget(email: &str) {
    EMAIL_CACHE.invalidate(&normalize(email)).await;
}

pub async fn is_taken(email: &str) -> bool {
    EMAIL_CACHE.get(&normalize(email)).await.unwrap_or(false)
}

/// Marks a batch concurrently; each address goes through [`mark_taken`].
pub async fn mark_all_taken<'a>(emails: impl IntoIterator<Item = &'a str>) {
    futures::future::join_all(emails.into_iter().map(mark_taken)).await;
}

/// Seeds the cache with addresses registered in the last `days` days,
/// the ones a duplicate sign-up most likely repeats. Returns how many
/// were loaded.
pub async fn warmup_email_cache(pool: &MySqlPool, days: i64, batch_size: usize) -> Result<usize> {
    let since = chrono::Local::now().naive_local() - chrono::Duration::days(days);

    let mut batches = sqlx::query_scalar::<_, String>(
        "SELECT email FROM users WHERE created_at >= ? ORDER BY id DESC",
    )
    .bind(since)
    .fetch(pool)
    .try_chunks(batch_size.max(1));

    let mut loaded = 0usize;
    while let Some(batch) = batches.try_next().await.map_err(|e| e.1)? {
        mark_all_taken(batch.iter().map(String::as_str)).await;
        loaded += batch.len();
    }

    tracing::debug!(loaded, days, "Seeded email cache from recent registrations");
    Ok(loaded)
}
