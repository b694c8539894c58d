//! Rate-limited model scheduler.
//!
//! Every role owns an ordered bucket list, preferred model first. A request
//! walks the list, reserving a slot in the first bucket with capacity before
//! calling out, and falls through to the next bucket only when the model
//! answers with a rate-limit error. Other failures stop the walk at once.
//! The whole request is bounded by `max_wait`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::core::bucket::RateLimitBucket;
use crate::io::clock::Clock;
use crate::io::config::SchedulerConfig;
use crate::io::model::{ModelError, Role};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("rate limiter is cooling down for {role}; please retry shortly")]
    CoolingDown { role: Role },
    #[error("all {role} models are rate limited: {source}")]
    RateLimited {
        role: Role,
        #[source]
        source: ModelError,
    },
    #[error("{model} request failed: {source}")]
    Task {
        model: String,
        #[source]
        source: ModelError,
    },
}

/// Result of a scheduled request, tagged with the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Limited<T> {
    pub model: String,
    pub value: T,
}

pub struct Scheduler {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    buckets: Mutex<HashMap<Role, Vec<RateLimitBucket>>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        let buckets = Role::ALL
            .into_iter()
            .map(|role| {
                let buckets = config
                    .roles
                    .buckets(role)
                    .iter()
                    .cloned()
                    .map(|bucket| RateLimitBucket::new(bucket, config.window()))
                    .collect();
                (role, buckets)
            })
            .collect();
        Self {
            config,
            clock,
            buckets: Mutex::new(buckets),
        }
    }

    /// Run `task` against the first model of `role` with capacity.
    ///
    /// `task` receives the model name and may be called once per bucket and
    /// pass. The reservation made before each call stands even if the call
    /// fails.
    #[instrument(skip_all, fields(role = %role))]
    pub async fn with_limit<T, F, Fut>(
        &self,
        role: Role,
        mut task: F,
    ) -> Result<Limited<T>, SchedulerError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        let started = self.clock.now();
        let bucket_count = self.config.roles.buckets(role).len();
        let mut last_rate_limit: Option<ModelError> = None;

        while self.clock.now().saturating_duration_since(started) < self.config.max_wait() {
            for index in 0..bucket_count {
                let Some(model) = self.reserve(role, index) else {
                    continue;
                };
                debug!(model = %model, "bucket reserved");
                match task(model.clone()).await {
                    Ok(value) => return Ok(Limited { model, value }),
                    Err(err) if err.is_rate_limit() => {
                        warn!(model = %model, error = %err, "model rate limited; trying next bucket");
                        last_rate_limit = Some(err);
                    }
                    Err(err) => return Err(SchedulerError::Task { model, source: err }),
                }
            }
            self.clock.sleep(self.config.retry_delay()).await;
        }

        match last_rate_limit {
            Some(source) => Err(SchedulerError::RateLimited { role, source }),
            None => Err(SchedulerError::CoolingDown { role }),
        }
    }

    /// Forget all recorded usage.
    pub fn clear(&self) {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        for bucket in buckets.values_mut().flatten() {
            bucket.clear();
        }
    }

    /// `(key, requests in window)` for each bucket of `role`, in order.
    pub fn usage(&self, role: Role) -> Vec<(String, usize)> {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets
            .get_mut(&role)
            .map(|list| {
                list.iter_mut()
                    .map(|bucket| (bucket.config.key.clone(), bucket.in_window(now)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn reserve(&self, role: Role, index: usize) -> Option<String> {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let bucket = buckets.get_mut(&role)?.get_mut(index)?;
        bucket
            .try_reserve(now)
            .then(|| bucket.config.model.clone())
    }
}
