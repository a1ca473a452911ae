// imgcrunch/src/processors/dispatcher.rs
use crate::core::types::{Failure, Placement, Progress, WorkItem, WorkOutcome, WorkResult};
use crate::core::{CrunchError, ErrorKind, Result};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

/// Fans work items out over a rayon pool and funnels results back to the
/// calling thread, which is the only writer of progress state.
pub struct Dispatcher {
    thread_pool: Option<rayon::ThreadPool>,
    cancel: Arc<AtomicBool>,
}

impl Dispatcher {
    /// `threads == 0` uses rayon's global pool (one worker per core).
    pub fn new(threads: usize) -> Result<Self> {
        let thread_pool = if threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|idx| format!("imgcrunch-worker-{}", idx))
                .build()
                .map_err(|e| {
                    CrunchError::Config(format!("Failed to create thread pool: {}", e))
                })?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            thread_pool,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn worker_count(&self) -> usize {
        match &self.thread_pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Runs `handler` once per item and blocks until every item is accounted
    /// for. Results arrive in completion order; `on_progress` sees each one
    /// together with a monotonically increasing completed count.
    pub fn dispatch<H, P>(&self, items: &[WorkItem], handler: H, mut on_progress: P) -> Vec<WorkResult>
    where
        H: Fn(&WorkItem) -> Result<Placement> + Sync,
        P: FnMut(Progress, &WorkResult),
    {
        let total = items.len();
        let mut results = Vec::with_capacity(total);
        if total == 0 {
            return results;
        }

        let (tx, rx) = mpsc::channel::<WorkResult>();
        let handler = &handler;
        let cancel = self.cancel.as_ref();
        let thread_pool = self.thread_pool.as_ref();

        std::thread::scope(|scope| {
            scope.spawn(move || {
                let run = move || {
                    items.par_iter().for_each_with(tx, |tx, item| {
                        // The receiver outlives every sender.
                        let _ = tx.send(run_item(item, handler, cancel));
                    })
                };
                match thread_pool {
                    Some(pool) => pool.install(run),
                    None => run(),
                }
            });

            for result in rx.iter() {
                match &result.outcome {
                    WorkOutcome::Failed(failure) => log::warn!(
                        "Failed {} [{}]: {}",
                        result.source.display(),
                        failure.kind,
                        failure.message
                    ),
                    WorkOutcome::Skipped => {
                        log::debug!("Skipped {} after cancellation", result.source.display())
                    }
                    WorkOutcome::Placed(_) => {}
                }

                results.push(result);
                let progress = Progress {
                    completed: results.len(),
                    total,
                };
                if let Some(last) = results.last() {
                    on_progress(progress, last);
                }
            }
        });

        results
    }
}

fn run_item<H>(item: &WorkItem, handler: &H, cancel: &AtomicBool) -> WorkResult
where
    H: Fn(&WorkItem) -> Result<Placement> + Sync,
{
    let outcome = if cancel.load(Ordering::Relaxed) {
        WorkOutcome::Skipped
    } else {
        match panic::catch_unwind(AssertUnwindSafe(|| handler(item))) {
            Ok(Ok(placement)) => WorkOutcome::Placed(placement),
            Ok(Err(err)) => WorkOutcome::Failed(Failure::from(&err)),
            Err(payload) => WorkOutcome::Failed(Failure {
                kind: ErrorKind::Panic,
                message: panic_message(payload.as_ref()),
            }),
        }
    };

    WorkResult {
        source: item.source.path.clone(),
        ordinal: item.source.ordinal,
        outcome,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", msg)
    } else {
        "worker panicked".to_string()
    }
}
