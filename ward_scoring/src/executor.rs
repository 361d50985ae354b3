//! Where the pipeline runs: in the caller's thread or in a background worker.

use std::collections::{HashSet, VecDeque};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, error, info, warn};

use crate::pipeline::*;

/// One finished computation.
pub type Completion = (RequestId, Result<Derived, PipelineError>);

/// An execution strategy for pipeline requests.
///
/// Every submitted id eventually comes back exactly once through `try_completed` or
/// `next_completed`, either with a result or with an error.
pub trait Executor {
    fn submit(&mut self, id: RequestId, request: PipelineRequest);

    /// The completions available right now. Never blocks.
    fn try_completed(&mut self) -> Vec<Completion>;

    /// The next completion, waiting at most `timeout`. None if nothing arrived or if
    /// nothing is in flight.
    fn next_completed(&mut self, timeout: Duration) -> Option<Completion>;
}

/// Runs the pipeline synchronously inside `submit`.
#[derive(Debug, Default)]
pub struct InlineExecutor {
    done: VecDeque<Completion>,
}

impl InlineExecutor {
    pub fn new() -> InlineExecutor {
        InlineExecutor::default()
    }
}

impl Executor for InlineExecutor {
    fn submit(&mut self, id: RequestId, request: PipelineRequest) {
        debug!("InlineExecutor: running request {}", id);
        self.done.push_back((id, Ok(run_pipeline(&request))));
    }

    fn try_completed(&mut self) -> Vec<Completion> {
        self.done.drain(..).collect()
    }

    fn next_completed(&mut self, _timeout: Duration) -> Option<Completion> {
        self.done.pop_front()
    }
}

/// Runs the pipeline on a dedicated thread.
///
/// Requests and responses cross the thread boundary as JSON envelopes: nothing is
/// shared with the worker. The executor owns the channels and the set of request ids
/// still waiting for an answer.
pub struct WorkerExecutor {
    requests: Option<Sender<String>>,
    responses: Receiver<String>,
    pending: HashSet<RequestId>,
    done: VecDeque<Completion>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerExecutor {
    pub fn spawn() -> Result<WorkerExecutor, PipelineError> {
        WorkerExecutor::with_handler(|msg: &str| Some(handle_request(msg)))
    }

    // The handler answers one message. Returning None stops the worker.
    fn with_handler<F>(handler: F) -> Result<WorkerExecutor, PipelineError>
    where
        F: Fn(&str) -> Option<String> + Send + 'static,
    {
        let (req_tx, req_rx) = unbounded::<String>();
        let (resp_tx, resp_rx) = unbounded::<String>();
        let handle = thread::Builder::new()
            .name("ward-scoring-worker".to_string())
            .spawn(move || worker_loop(req_rx, resp_tx, handler))
            .map_err(|e| PipelineError::Spawn(e.to_string()))?;
        info!("WorkerExecutor: worker started");
        Ok(WorkerExecutor {
            requests: Some(req_tx),
            responses: resp_rx,
            pending: HashSet::new(),
            done: VecDeque::new(),
            handle: Some(handle),
        })
    }

    /// Number of requests still waiting for an answer.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn accept(&mut self, text: String) {
        match decode_response(&text) {
            Ok((id, outcome)) => {
                if self.pending.remove(&id) {
                    self.done.push_back((id, outcome));
                } else {
                    warn!("WorkerExecutor: response for unknown request {}", id);
                }
            }
            Err(e) => {
                error!("WorkerExecutor: unreadable response: {}", e);
                self.fail_pending(e);
            }
        }
    }

    fn fail_pending(&mut self, e: PipelineError) {
        let mut ids: Vec<RequestId> = self.pending.drain().collect();
        ids.sort_unstable();
        for id in ids {
            self.done.push_back((id, Err(e.clone())));
        }
    }

    fn worker_gone(&mut self) {
        if !self.pending.is_empty() {
            error!(
                "WorkerExecutor: worker stopped with {} requests in flight",
                self.pending.len()
            );
            self.fail_pending(PipelineError::Disconnected);
        }
    }

    fn send(&mut self, id: RequestId, text: String) {
        let sent = match &self.requests {
            Some(tx) => tx.send(text).is_ok(),
            None => false,
        };
        if sent {
            self.pending.insert(id);
        } else {
            error!("WorkerExecutor: cannot send request {}", id);
            self.done.push_back((id, Err(PipelineError::Disconnected)));
        }
    }
}

fn worker_loop<F>(requests: Receiver<String>, responses: Sender<String>, handler: F)
where
    F: Fn(&str) -> Option<String>,
{
    for msg in requests.iter() {
        let reply = match handler(&msg) {
            Some(r) => r,
            None => break,
        };
        if responses.send(reply).is_err() {
            break;
        }
    }
    debug!("worker_loop: exiting");
}

impl Executor for WorkerExecutor {
    fn submit(&mut self, id: RequestId, request: PipelineRequest) {
        match encode_request(id, &request) {
            Ok(text) => self.send(id, text),
            Err(e) => {
                error!("WorkerExecutor: request {}: {}", id, e);
                self.done.push_back((id, Err(e)));
            }
        }
    }

    fn try_completed(&mut self) -> Vec<Completion> {
        loop {
            match self.responses.try_recv() {
                Ok(text) => self.accept(text),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.worker_gone();
                    break;
                }
            }
        }
        self.done.drain(..).collect()
    }

    fn next_completed(&mut self, timeout: Duration) -> Option<Completion> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(c) = self.done.pop_front() {
                return Some(c);
            }
            if self.pending.is_empty() {
                return None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.responses.recv_timeout(remaining) {
                Ok(text) => self.accept(text),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => self.worker_gone(),
            }
        }
    }
}

impl Drop for WorkerExecutor {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("WorkerExecutor: the worker thread panicked");
            }
        }
    }
}
