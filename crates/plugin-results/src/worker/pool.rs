use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, warn};
use serde_json::Value;

use crate::db::work_repo;
use crate::error::WorkerError;
use crate::report::BusyWorkers;
use crate::store::ResultStore;
use crate::worker::job::{
    JobResult, PluginJob, PluginOutcome, PluginRunner, STATUS_ABORTED, STATUS_CRASHED,
    STATUS_SUCCESSFUL,
};

pub struct WorkerPool {
    job_sender: Sender<PluginJob>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    busy: Arc<AtomicUsize>,
}

/// Marks a worker busy for as long as it lives.
struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    /// Starts `worker_count` threads that run plugins and store their results.
    pub fn new(
        store: Arc<ResultStore>,
        runner: Arc<dyn PluginRunner>,
        worker_count: usize,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }

        let (job_sender, job_receiver) = bounded::<PluginJob>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<JobResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));
        let busy = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let ctx = WorkerContext {
                worker_id,
                job_receiver: job_receiver.clone(),
                result_sender: result_sender.clone(),
                shutdown: Arc::clone(&shutdown),
                busy: Arc::clone(&busy),
                store: Arc::clone(&store),
                runner: Arc::clone(&runner),
            };

            let handle = thread::Builder::new()
                .name(format!("plugin-worker-{}", worker_id))
                .spawn(move || run_worker(ctx))
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
            busy,
        })
    }

    pub fn submit(&self, job: PluginJob) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

impl BusyWorkers for WorkerPool {
    fn busy_worker_count(&self) -> usize {
        self.busy.load(Ordering::SeqCst)
    }
}

struct WorkerContext {
    worker_id: usize,
    job_receiver: Receiver<PluginJob>,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    busy: Arc<AtomicUsize>,
    store: Arc<ResultStore>,
    runner: Arc<dyn PluginRunner>,
}

fn run_worker(ctx: WorkerContext) {
    let worker_id = ctx.worker_id;
    debug!("Worker {} started", worker_id);

    loop {
        if ctx.shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match ctx
            .job_receiver
            .recv_timeout(std::time::Duration::from_millis(100))
        {
            Ok(job) => {
                let result = {
                    let _busy = BusyGuard::enter(&ctx.busy);
                    execute(&ctx, job)
                };

                if let Err(e) = ctx.result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Runs one job and stores its outcome, full or partial.
fn execute(ctx: &WorkerContext, job: PluginJob) -> JobResult {
    let _span = tracing::info_span!(
        "worker.job",
        worker_id = ctx.worker_id,
        target_id = job.target_id,
        plugin_key = %job.plugin.key
    )
    .entered();

    // A claimed item counts as busy, not queued.
    if let Some(work_id) = job.work_id {
        if let Err(e) = work_repo::remove(ctx.store.db(), work_id) {
            warn!("Failed to claim work item {}: {}", work_id, e);
        }
    }

    let mut plugin = job.plugin.clone();
    plugin.start = Utc::now();

    let (outcome, crashed) = match catch_unwind(AssertUnwindSafe(|| ctx.runner.run(&job))) {
        Ok(outcome) => (outcome, false),
        Err(_) => {
            warn!("Plugin {} panicked on target {}", plugin.key, job.target_id);
            let outcome = PluginOutcome::Partial {
                output: Value::Array(Vec::new()),
                message: "Plugin crashed".to_string(),
            };
            (outcome, true)
        }
    };
    plugin.end = Utc::now();

    let (saved, partial) = match outcome {
        PluginOutcome::Completed { output } => {
            plugin.status = STATUS_SUCCESSFUL.to_string();
            (ctx.store.save_full(&plugin, &output, job.target_id), false)
        }
        PluginOutcome::Partial { output, message } => {
            plugin.status = if crashed {
                STATUS_CRASHED.to_string()
            } else {
                STATUS_ABORTED.to_string()
            };
            (
                ctx.store
                    .save_partial(&plugin, &output, &message, job.target_id),
                true,
            )
        }
    };

    let error = match saved {
        Ok(_) => None,
        Err(e) => {
            error!(
                "Failed to store result of {} for target {}: {}",
                plugin.key, job.target_id, e
            );
            if job.work_id.is_some() {
                if let Err(e) = work_repo::enqueue(ctx.store.db(), job.target_id, &job.plugin) {
                    warn!("Failed to requeue {}: {}", plugin.key, e);
                }
            }
            Some(e.to_string())
        }
    };

    JobResult {
        target_id: job.target_id,
        plugin_key: plugin.key,
        saved: error.is_none(),
        partial,
        error,
    }
}
