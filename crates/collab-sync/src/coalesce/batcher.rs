//! Per-key in-flight request registry.
//!
//! Concurrent callers of [`RequestCoalescer::batch`] with the same key
//! share a single producer invocation. The registry entry is cleared as
//! soon as the shared request resolves, so the next call issues a fresh
//! request; there is no TTL beyond the in-flight window. A caller that
//! stops awaiting does not cancel the request for the remaining callers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use tracing::trace;

use collab_core::result::AppResult;

use crate::metrics::EngineMetrics;

type SharedRequest = Shared<BoxFuture<'static, AppResult<Value>>>;

struct Entry {
    generation: u64,
    request: SharedRequest,
}

/// De-duplicates concurrent fetches for the same logical resource key.
pub struct RequestCoalescer {
    in_flight: Mutex<HashMap<String, Entry>>,
    next_generation: AtomicU64,
    metrics: Arc<EngineMetrics>,
}

impl RequestCoalescer {
    /// Creates a new coalescer.
    pub fn new(metrics: Arc<EngineMetrics>) -> Arc<Self> {
        Arc::new(Self {
            in_flight: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            metrics,
        })
    }

    /// Run `producer` for `key`, unless a request for the same key is
    /// already in flight, in which case the pending result is shared.
    pub async fn batch<F, Fut>(&self, key: &str, producer: F) -> AppResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Value>> + Send + 'static,
    {
        let (generation, request) = {
            let mut map = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = map.get(key) {
                EngineMetrics::incr(&self.metrics.coalescer_hits);
                trace!(key, "Joining in-flight request");
                (entry.generation, entry.request.clone())
            } else {
                EngineMetrics::incr(&self.metrics.coalescer_misses);
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let request: SharedRequest = producer().boxed().shared();
                map.insert(
                    key.to_string(),
                    Entry {
                        generation,
                        request: request.clone(),
                    },
                );
                (generation, request)
            }
        };

        let result = request.await;

        // Clear the entry exactly once per request; a newer in-flight
        // entry under the same key must survive.
        let mut map = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if map.get(key).is_some_and(|e| e.generation == generation) {
            map.remove(key);
        }

        result
    }

    /// Number of requests currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}
