//! Concurrent tenpai queries with timeout, cancellation and a shared cache.
//!
//! A survey fans the planned probes out over a dedicated rayon ThreadPool and
//! collects answers until the rule's query timeout. Starting a new survey
//! cancels the previous one; answers that arrive after their survey is gone
//! still populate the cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use kifu_engine::collaborator::{CancelToken, CollaboratorError, TenpaiResponse, TenpaiService};
use kifu_engine::readiness::{plan, Probe, ReadinessSnapshot};
use kifu_engine::GameState;
use tracing::{debug, warn};

type Cache = Arc<Mutex<HashMap<String, TenpaiResponse>>>;

struct Answer {
    key: String,
    generation: u64,
    result: Result<TenpaiResponse, CollaboratorError>,
}

pub struct QueryBroker {
    pool: rayon::ThreadPool,
    service: Arc<dyn TenpaiService>,
    cache: Cache,
    generation: AtomicU64,
    current: Mutex<CancelToken>,
}

impl QueryBroker {
    /// Broker over `service` with its own pool. `None` threads uses rayon's
    /// default (one per CPU).
    pub fn new(service: Arc<dyn TenpaiService>, num_threads: Option<usize>) -> anyhow::Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("kifu-query-{i}"));
        if let Some(n) = num_threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build query pool: {}", e))?;
        Ok(Self {
            pool,
            service,
            cache: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            current: Mutex::new(CancelToken::new()),
        })
    }

    /// Number of surveys started so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Cancels the survey in flight, if any.
    pub fn cancel(&self) {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).cancel();
    }

    fn begin(&self) -> (u64, CancelToken) {
        let token = CancelToken::new();
        let previous = std::mem::replace(
            &mut *self.current.lock().unwrap_or_else(PoisonError::into_inner),
            token.clone(),
        );
        previous.cancel();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        (generation, token)
    }

    /// Readiness for every seat of `state`. Probes that miss the deadline or
    /// fail come back as `Probe::Failed`.
    pub fn survey(&self, state: &GameState) -> ReadinessSnapshot {
        let probes = plan(state);
        let (generation, token) = self.begin();
        let timeout = Duration::from_millis(state.rule.query_timeout_ms);

        let keys: Vec<String> = probes.iter().map(|p| p.request.cache_key()).collect();
        let mut answers: HashMap<String, Probe<TenpaiResponse>> = HashMap::new();
        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            for key in &keys {
                if let Some(hit) = cache.get(key) {
                    answers.insert(key.clone(), Probe::Known(hit.clone()));
                }
            }
        }

        let (tx, rx) = mpsc::channel::<Answer>();
        let mut outstanding = 0usize;
        for (probe, key) in probes.iter().zip(&keys) {
            if answers.contains_key(key) {
                continue;
            }
            answers.insert(key.clone(), Probe::Unknown);
            outstanding += 1;

            let tx = tx.clone();
            let key = key.clone();
            let request = probe.request.clone();
            let service = Arc::clone(&self.service);
            let cache = Arc::clone(&self.cache);
            let token = token.clone();
            self.pool.spawn(move || {
                let result = if token.is_cancelled() {
                    Err(CollaboratorError::Cancelled)
                } else {
                    service.query(&request, &token)
                };
                if let Ok(res) = &result {
                    cache
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(key.clone(), res.clone());
                }
                // The survey may have given up already.
                let _ = tx.send(Answer {
                    key,
                    generation,
                    result,
                });
            });
        }
        drop(tx);

        let deadline = Instant::now() + timeout;
        while outstanding > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Ok(answer) = rx.recv_timeout(remaining) else {
                break;
            };
            if answer.generation != generation {
                continue;
            }
            outstanding -= 1;
            let probe = match answer.result {
                Ok(res) => Probe::Known(res),
                Err(e) => {
                    warn!(key = %answer.key, error = %e, "tenpai query failed");
                    Probe::Failed(e.to_string())
                }
            };
            answers.insert(answer.key, probe);
        }

        if outstanding > 0 {
            warn!(outstanding, timeout_ms = state.rule.query_timeout_ms, "tenpai survey timed out");
            token.cancel();
            for probe in answers.values_mut() {
                if *probe == Probe::Unknown {
                    *probe = Probe::Failed(format!("timed out after {} ms", state.rule.query_timeout_ms));
                }
            }
        }
        debug!(generation, probes = probes.len(), unique = answers.len(), "survey complete");

        let results = keys
            .iter()
            .map(|key| answers.get(key).cloned().unwrap_or(Probe::Unknown))
            .collect();
        ReadinessSnapshot::assemble(state, &probes, results)
    }
}
