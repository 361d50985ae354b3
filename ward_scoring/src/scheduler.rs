//! Recomputation scheduling.
//!
//! The scheduler owns the cache of the last derived value and decides when the pipeline
//! must run again. Requests are keyed by the fingerprints of their inputs:
//!  - a request matching the cached value is answered immediately
//!  - a request matching a computation already in flight joins it
//!  - anything else is submitted to the executor
//!
//! Only the most recent request matters. Results for older requests are dropped when
//! they arrive, and in-flight work is never interrupted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::config::*;
use crate::executor::{Completion, Executor};
use crate::pipeline::*;
use crate::present::Boundaries;

/// (dataset, boundaries, weightings) fingerprints.
pub type RequestKey = (String, String, String);

#[derive(Debug, Clone)]
pub enum Ticket {
    /// The value for these inputs is already known.
    Ready(Arc<Derived>),
    /// The value will be delivered by `poll` or `wait`.
    Pending(RequestId),
}

// Remembers the digest of the last value seen behind an Arc, so that passing the same
// Arc again does not hash the whole value again.
struct DigestCache<T> {
    last: Option<(Arc<T>, String)>,
}

impl<T: serde::Serialize> DigestCache<T> {
    fn new() -> DigestCache<T> {
        DigestCache { last: None }
    }

    fn digest(&mut self, value: &Arc<T>) -> Result<String, PipelineError> {
        if let Some((arc, digest)) = &self.last {
            if Arc::ptr_eq(arc, value) {
                return Ok(digest.clone());
            }
        }
        let digest = fingerprint(value.as_ref())?;
        self.last = Some((value.clone(), digest.clone()));
        Ok(digest)
    }
}

pub struct Scheduler<E: Executor> {
    executor: E,
    excluded_fields: Vec<String>,
    next_id: RequestId,
    // Bumped by every request. Only the request of the current generation is applied.
    generation: u64,
    current: Option<RequestKey>,
    latest: Option<(RequestKey, Arc<Derived>)>,
    in_flight: HashMap<RequestKey, RequestId>,
    issued: HashMap<RequestId, (RequestKey, u64)>,
    last_error: Option<(RequestKey, PipelineError)>,
    dataset_digests: DigestCache<Dataset>,
    boundary_digests: DigestCache<Boundaries>,
}

impl<E: Executor> Scheduler<E> {
    pub fn new(executor: E, excluded_fields: &[String]) -> Scheduler<E> {
        Scheduler {
            executor,
            excluded_fields: excluded_fields.to_vec(),
            next_id: 1,
            generation: 0,
            current: None,
            latest: None,
            in_flight: HashMap::new(),
            issued: HashMap::new(),
            last_error: None,
            dataset_digests: DigestCache::new(),
            boundary_digests: DigestCache::new(),
        }
    }

    /// Asks for the derived value of a set of inputs. It becomes the current request.
    pub fn request(
        &mut self,
        dataset: &Arc<Dataset>,
        boundaries: &Arc<Boundaries>,
        weightings: &Weightings,
    ) -> Result<Ticket, PipelineError> {
        let key: RequestKey = (
            self.dataset_digests.digest(dataset)?,
            self.boundary_digests.digest(boundaries)?,
            weightings.fingerprint()?,
        );
        self.generation += 1;
        self.current = Some(key.clone());
        // A new request, even for a key that failed before, is waited on afresh.
        self.last_error = None;

        if let Some(derived) = self.cached(&key) {
            debug!("Scheduler::request: cache hit");
            return Ok(Ticket::Ready(derived));
        }
        if let Some(id) = self.in_flight.get(&key) {
            debug!("Scheduler::request: joining request {}", id);
            return Ok(Ticket::Pending(*id));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.in_flight.insert(key.clone(), id);
        self.issued.insert(id, (key.clone(), self.generation));
        debug!(
            "Scheduler::request: submitting request {} (generation {})",
            id, self.generation
        );
        self.executor.submit(
            id,
            PipelineRequest {
                dataset: dataset.clone(),
                boundaries: boundaries.clone(),
                weightings: weightings.clone(),
                excluded_fields: self.excluded_fields.clone(),
            },
        );
        // A synchronous executor is already done.
        self.poll();
        Ok(match self.cached(&key) {
            Some(derived) => Ticket::Ready(derived),
            None => Ticket::Pending(id),
        })
    }

    /// Applies the completions available now, without blocking.
    ///
    /// Returns the new value if the current request was resolved.
    pub fn poll(&mut self) -> Option<Arc<Derived>> {
        let mut applied = None;
        for completion in self.executor.try_completed() {
            if let Some(derived) = self.settle(completion) {
                applied = Some(derived);
            }
        }
        applied
    }

    /// Blocks until the current request is resolved or `timeout` elapsed.
    pub fn wait(&mut self, timeout: Duration) -> Result<Arc<Derived>, PipelineError> {
        let deadline = Instant::now() + timeout;
        self.poll();
        loop {
            let key = self.current.clone().ok_or(PipelineError::NothingRequested)?;
            if let Some(derived) = self.cached(&key) {
                return Ok(derived);
            }
            if let Some((failed_key, e)) = &self.last_error {
                if *failed_key == key {
                    return Err(e.clone());
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.executor.next_completed(remaining) {
                Some(completion) => {
                    self.settle(completion);
                }
                None => {
                    error!("Scheduler::wait: no result after {:?}", timeout);
                    return Err(PipelineError::Timeout);
                }
            }
        }
    }

    /// The last value applied, even if newer requests are pending or failed.
    pub fn latest(&self) -> Option<Arc<Derived>> {
        self.latest.as_ref().map(|(_, d)| d.clone())
    }

    /// Number of distinct computations in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn cached(&self, key: &RequestKey) -> Option<Arc<Derived>> {
        match &self.latest {
            Some((k, derived)) if k == key => Some(derived.clone()),
            _ => None,
        }
    }

    fn settle(&mut self, (id, outcome): Completion) -> Option<Arc<Derived>> {
        let (key, generation) = match self.issued.remove(&id) {
            Some(x) => x,
            None => {
                debug!("Scheduler: ignoring completion of unknown request {}", id);
                return None;
            }
        };
        if self.in_flight.get(&key) == Some(&id) {
            self.in_flight.remove(&key);
        }
        let is_current = self.current.as_ref() == Some(&key);
        match outcome {
            Ok(derived) if is_current => {
                info!(
                    "Scheduler: applying request {} ({} regions ranked)",
                    id,
                    derived.table.len()
                );
                let derived = Arc::new(derived);
                self.latest = Some((key, derived.clone()));
                self.last_error = None;
                Some(derived)
            }
            Ok(_) => {
                debug!(
                    "Scheduler: discarding stale request {} (generation {}, now {})",
                    id, generation, self.generation
                );
                None
            }
            Err(e) => {
                // The last good value stays in place.
                error!("Scheduler: request {} failed: {}", id, e);
                if is_current {
                    self.last_error = Some((key, e));
                }
                None
            }
        }
    }
}
