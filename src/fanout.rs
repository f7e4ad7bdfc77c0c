//! Bounded-concurrency execution of per-ticker enrichment requests.
//!
//! Every descriptor handed to [`ConcurrentFanout::run`] yields exactly one [`FanoutResult`],
//! whether the worker succeeded, failed, ran past the deadline, or was cancelled.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::AppError;
use crate::records::AnalystRating;

#[inline]
pub fn ensure_concurrency_limit(limit: usize) -> usize {
    limit.max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Chart,
    Detail,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerKind::Chart => f.write_str("chart"),
            WorkerKind::Detail => f.write_str("detail"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub ticker: String,
    pub url: String,
    pub kind: WorkerKind,
}

/// Data a worker produced for one ticker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentPayload {
    pub ticker: String,
    pub fields: Vec<(String, String)>,
    pub ratings: Vec<AnalystRating>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    Request(String),
    Status(u16),
    Io(String),
    TimedOut,
    Cancelled,
}

impl FailureCause {
    pub fn from_error(err: AppError) -> Self {
        match err {
            AppError::UnexpectedStatus { status, .. } => FailureCause::Status(status),
            AppError::Io(err) => FailureCause::Io(err.to_string()),
            other => FailureCause::Request(other.to_string()),
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Request(msg) => write!(f, "request failed: {msg}"),
            FailureCause::Status(status) => write!(f, "unexpected status {status}"),
            FailureCause::Io(msg) => write!(f, "io error: {msg}"),
            FailureCause::TimedOut => f.write_str("deadline elapsed"),
            FailureCause::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutFailure {
    pub ticker: String,
    pub url: String,
    pub cause: FailureCause,
}

impl From<FanoutFailure> for AppError {
    fn from(failure: FanoutFailure) -> Self {
        AppError::EnrichmentFailed {
            url: failure.url,
            cause: failure.cause.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanoutOutcome {
    Succeeded(EnrichmentPayload),
    Failed(FanoutFailure),
}

/// Outcome for the descriptor at `index` in the input sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutResult {
    pub index: usize,
    pub descriptor: RequestDescriptor,
    pub outcome: FanoutOutcome,
}

impl FanoutResult {
    pub fn state(&self) -> DescriptorState {
        match self.outcome {
            FanoutOutcome::Succeeded(_) => DescriptorState::Succeeded,
            FanoutOutcome::Failed(_) => DescriptorState::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FanoutOutcome::Succeeded(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

/// Shared view of a running fanout for progress displays.
#[derive(Debug, Default)]
pub struct FanoutProgress {
    completed: AtomicUsize,
    states: Mutex<Vec<DescriptorState>>,
}

impl FanoutProgress {
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.lock().len()
    }

    pub fn states(&self) -> Vec<DescriptorState> {
        self.lock().clone()
    }

    fn reset(&self, total: usize) {
        self.completed.store(0, Ordering::SeqCst);
        *self.lock() = vec![DescriptorState::Pending; total];
    }

    fn mark(&self, index: usize, state: DescriptorState) {
        if let Some(slot) = self.lock().get_mut(index) {
            *slot = state;
        }
        if matches!(state, DescriptorState::Succeeded | DescriptorState::Failed) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DescriptorState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Caller side of a cancellation signal.
pub struct CancelHandle(watch::Sender<bool>);

/// Worker side of a cancellation signal. Cheap to clone.
#[derive(Clone)]
pub struct CancelToken(watch::Receiver<bool>);

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancelled. Never resolves if the handle is dropped first.
    pub async fn cancelled(&mut self) {
        if self.0.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub struct ConcurrentFanout {
    concurrency: usize,
    deadline: Option<Duration>,
    cancel: Option<CancelToken>,
    progress: Arc<FanoutProgress>,
}

impl ConcurrentFanout {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: ensure_concurrency_limit(concurrency),
            deadline: None,
            cancel: None,
            progress: Arc::new(FanoutProgress::default()),
        }
    }

    /// Budget for the whole run, measured from the start of [`run`](Self::run).
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_cancel(mut self, token: Option<CancelToken>) -> Self {
        self.cancel = token;
        self
    }

    pub fn progress(&self) -> Arc<FanoutProgress> {
        Arc::clone(&self.progress)
    }

    /// Run `worker` for every descriptor with at most `concurrency` in flight.
    ///
    /// Results come back ordered by input index. Descriptors that have not started when the
    /// deadline passes or cancellation fires are failed without calling `worker`; in-flight
    /// ones are abandoned and failed the same way.
    pub async fn run<F, Fut>(
        &self,
        descriptors: Vec<RequestDescriptor>,
        worker: F,
    ) -> Vec<FanoutResult>
    where
        F: Fn(RequestDescriptor) -> Fut,
        Fut: Future<Output = Result<EnrichmentPayload, FailureCause>>,
    {
        let deadline = self.deadline.map(|budget| Instant::now() + budget);
        let progress = &self.progress;
        let worker = &worker;
        progress.reset(descriptors.len());

        let mut results: Vec<FanoutResult> = stream::iter(descriptors.into_iter().enumerate())
            .map(|(index, descriptor)| {
                let mut cancel = self.cancel.clone();
                async move {
                    let outcome = if cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                        Err(FailureCause::Cancelled)
                    } else if deadline.is_some_and(|at| Instant::now() >= at) {
                        Err(FailureCause::TimedOut)
                    } else {
                        progress.mark(index, DescriptorState::InFlight);
                        tokio::select! {
                            result = worker(descriptor.clone()) => result,
                            _ = sleep_until(deadline) => Err(FailureCause::TimedOut),
                            _ = wait_cancelled(cancel.as_mut()) => Err(FailureCause::Cancelled),
                        }
                    };

                    let outcome = match outcome {
                        Ok(payload) => {
                            progress.mark(index, DescriptorState::Succeeded);
                            FanoutOutcome::Succeeded(payload)
                        }
                        Err(cause) => {
                            log::debug!(
                                "{} request for {} failed: {}",
                                descriptor.kind,
                                descriptor.ticker,
                                cause
                            );
                            progress.mark(index, DescriptorState::Failed);
                            FanoutOutcome::Failed(FanoutFailure {
                                ticker: descriptor.ticker.clone(),
                                url: descriptor.url.clone(),
                                cause,
                            })
                        }
                    };

                    FanoutResult {
                        index,
                        descriptor,
                        outcome,
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results.sort_by_key(|result| result.index);
        results
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn wait_cancelled(token: Option<&mut CancelToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
