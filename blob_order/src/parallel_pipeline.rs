// THEORY:
// Sorting one image is strictly sequential, but a batch of images has no shared
// state at all. The `ParallelPipeline` fans a batch out over a small pool of tokio
// workers: a dispatcher hands tasks round-robin to each worker's channel, each
// worker runs the synchronous pipeline on the blocking thread pool, and the answer
// comes back on a per-task oneshot channel. Callers get results in submission
// order regardless of which worker finished first.

use crate::core_modules::binary_raster::BinaryRaster;
use crate::error::{Result, SortError};
use crate::pipeline::{PipelineConfig, SortReport, SortingPipeline};
use futures::future::join_all;
use log::{debug, info};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// What a worker should sort.
#[derive(Debug, Clone)]
pub enum SortSource {
    /// An image file, decoded and binarized by the worker.
    Path(PathBuf),
    /// A raster that is already binary.
    Raster(BinaryRaster),
}

impl SortSource {
    fn describe(&self) -> String {
        match self {
            SortSource::Path(path) => path.display().to_string(),
            SortSource::Raster(raster) => {
                format!("{}x{} raster", raster.width(), raster.height())
            }
        }
    }
}

pub struct SortTask {
    pub source: SortSource,
    pub result_sender: oneshot::Sender<Result<SortReport>>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<SortTask>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Must be called from within a tokio runtime.
    pub fn new(pipeline: SortingPipeline, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<SortTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<SortTask>())
            .unzip();

        // Spawn dispatcher
        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                let _ = worker_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % worker_senders.len();
            }
        });

        // Spawn workers
        let mut workers = Vec::with_capacity(worker_count);
        for (worker_id, mut worker_receiver) in worker_receivers.into_iter().enumerate() {
            let worker_pipeline = pipeline.clone();

            let worker = tokio::spawn(async move {
                while let Some(SortTask {
                    source,
                    result_sender,
                }) = worker_receiver.recv().await
                {
                    debug!("worker {worker_id} picked up {}", source.describe());
                    let pipeline = worker_pipeline.clone();
                    let result = tokio::task::spawn_blocking(move || sort_source(&pipeline, source))
                        .await
                        .unwrap_or_else(|e| Err(SortError::WorkerPool(e.to_string())));
                    let _ = result_sender.send(result);
                }
            });

            workers.push(worker);
        }

        info!("worker pool started with {worker_count} workers");
        Self {
            task_sender,
            dispatcher,
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub async fn submit(&self, source: SortSource) -> Result<SortReport> {
        let (result_sender, result_receiver) = oneshot::channel();

        self.task_sender
            .send(SortTask {
                source,
                result_sender,
            })
            .map_err(|_| SortError::WorkerPool("failed to send task to worker pool".into()))?;

        result_receiver
            .await
            .map_err(|_| SortError::WorkerPool("failed to receive result from worker".into()))?
    }

    /// Stops accepting work and waits for in-flight tasks to finish.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        let _ = self.dispatcher.await;
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

fn sort_source(pipeline: &SortingPipeline, source: SortSource) -> Result<SortReport> {
    match source {
        SortSource::Path(path) => pipeline.sort_path(&path),
        SortSource::Raster(raster) => pipeline.sort_raster(&raster),
    }
}

/// Sorts many independent images concurrently.
pub struct ParallelPipeline {
    worker_pool: WorkerPool,
}

impl ParallelPipeline {
    /// One worker per logical CPU.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_workers(config, num_cpus::get())
    }

    pub fn with_workers(config: PipelineConfig, worker_count: usize) -> Result<Self> {
        let pipeline = SortingPipeline::new(config)?;
        Ok(Self {
            worker_pool: WorkerPool::new(pipeline, worker_count),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_pool.worker_count()
    }

    /// Results are returned in the same order as `paths`.
    pub async fn sort_paths(&self, paths: &[PathBuf]) -> Vec<Result<SortReport>> {
        join_all(
            paths
                .iter()
                .map(|path| self.worker_pool.submit(SortSource::Path(path.clone()))),
        )
        .await
    }

    /// Results are returned in the same order as `rasters`.
    pub async fn sort_rasters(&self, rasters: Vec<BinaryRaster>) -> Vec<Result<SortReport>> {
        join_all(
            rasters
                .into_iter()
                .map(|raster| self.worker_pool.submit(SortSource::Raster(raster))),
        )
        .await
    }

    pub async fn shutdown(self) {
        self.worker_pool.shutdown().await;
    }
}
