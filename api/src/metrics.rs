use async_trait::async_trait;
use discuss_embed_core::{Resolution, SessionObserver};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Repositories tracked in `Metrics::repositories` before the least recently
/// looked up one is evicted.
pub const MAX_TRACKED_REPOSITORIES: usize = 1000;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub total_requests: u64,
    pub snippets_served: u64,
    pub sessions_opened: u64,
    pub lookups_issued: u64,
    pub lookups_failed: u64,
    pub stale_results_discarded: u64,
    pub average_response_time_ms: u64,
    pub errors: u64,
    pub repositories: HashMap<String, RepoMetrics>,
    pub hourly_stats: Vec<HourlyStats>,
    #[serde(skip)]
    lookup_sequence: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepoMetrics {
    pub repository: String,
    pub lookup_count: u64,
    pub last_looked_up: u64,
    pub last_succeeded: Option<bool>,
    #[serde(skip)]
    sequence: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HourlyStats {
    pub hour: u64,
    pub requests: u64,
    pub lookups: u64,
}

pub struct MetricsCollector {
    metrics: Arc<RwLock<Metrics>>,
    response_times: Arc<RwLock<Vec<Duration>>>,
    max_repositories: usize,
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Returns the stats bucket for `hour`, creating it if needed and dropping
/// buckets older than 24 hours.
fn hour_bucket(metrics: &mut Metrics, hour: u64) -> &mut HourlyStats {
    let cutoff = hour.saturating_sub(24);
    metrics.hourly_stats.retain(|s| s.hour > cutoff);

    let index = match metrics.hourly_stats.iter().position(|s| s.hour == hour) {
        Some(index) => index,
        None => {
            metrics.hourly_stats.push(HourlyStats {
                hour,
                requests: 0,
                lookups: 0,
            });
            metrics.hourly_stats.len() - 1
        }
    };
    &mut metrics.hourly_stats[index]
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_repository_limit(MAX_TRACKED_REPOSITORIES)
    }

    pub fn with_repository_limit(max_repositories: usize) -> Self {
        Self {
            metrics: Arc::new(RwLock::new(Metrics::default())),
            response_times: Arc::new(RwLock::new(Vec::new())),
            max_repositories,
        }
    }

    pub async fn record_request(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.total_requests += 1;
        hour_bucket(&mut metrics, now_secs() / 3600).requests += 1;
    }

    pub async fn record_snippet(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.snippets_served += 1;
    }

    pub async fn record_session(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.sessions_opened += 1;
    }

    pub async fn record_lookup(&self, repository: &str) {
        let mut metrics = self.metrics.write().await;
        metrics.lookups_issued += 1;
        metrics.lookup_sequence += 1;
        let sequence = metrics.lookup_sequence;

        let now = now_secs();
        hour_bucket(&mut metrics, now / 3600).lookups += 1;

        if !metrics.repositories.contains_key(repository) {
            // evict least recently looked up if at capacity
            while metrics.repositories.len() >= self.max_repositories {
                let oldest = metrics
                    .repositories
                    .values()
                    .min_by_key(|r| r.sequence)
                    .map(|r| r.repository.clone());
                match oldest {
                    Some(oldest) => metrics.repositories.remove(&oldest),
                    None => break,
                };
            }
        }

        let entry = metrics
            .repositories
            .entry(repository.to_string())
            .or_insert_with(|| RepoMetrics {
                repository: repository.to_string(),
                lookup_count: 0,
                last_looked_up: now,
                last_succeeded: None,
                sequence,
            });
        entry.lookup_count += 1;
        entry.last_looked_up = now;
        entry.sequence = sequence;
    }

    pub async fn record_lookup_result(&self, repository: &str, resolution: Resolution, succeeded: bool) {
        let mut metrics = self.metrics.write().await;

        if resolution == Resolution::Stale {
            metrics.stale_results_discarded += 1;
            return;
        }

        if !succeeded {
            metrics.lookups_failed += 1;
        }
        if let Some(repo) = metrics.repositories.get_mut(repository) {
            repo.last_succeeded = Some(succeeded);
        }
    }

    pub async fn record_error(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.errors += 1;
    }

    pub async fn record_response_time(&self, duration: Duration) {
        let mut times = self.response_times.write().await;
        times.push(duration);

        // keep only last 1000 response times
        if times.len() > 1000 {
            let excess = times.len() - 1000;
            times.drain(0..excess);
        }

        if !times.is_empty() {
            let avg_ms =
                times.iter().map(|d| d.as_millis() as u64).sum::<u64>() / times.len() as u64;

            let mut metrics = self.metrics.write().await;
            metrics.average_response_time_ms = avg_ms;
        }
    }

    pub async fn get_metrics(&self) -> Metrics {
        self.metrics.read().await.clone()
    }

    pub async fn get_top_repositories(&self, limit: usize) -> Vec<RepoMetrics> {
        let metrics = self.metrics.read().await;
        let mut repos: Vec<_> = metrics.repositories.values().cloned().collect();
        repos.sort_by(|a, b| b.lookup_count.cmp(&a.lookup_count));
        repos.truncate(limit);
        repos
    }
}

#[async_trait]
impl SessionObserver for MetricsCollector {
    async fn lookup_issued(&self, identifier: &str) {
        self.record_lookup(identifier).await;
    }

    async fn lookup_resolved(&self, identifier: &str, resolution: Resolution, succeeded: bool) {
        self.record_lookup_result(identifier, resolution, succeeded).await;
    }
}
