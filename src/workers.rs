//! Bounded worker pool for background thumbnail jobs
//!
//! **Why**: Decode + resample + composite must never run on the UI
//! thread; a fixed pool bounds how much CPU and I/O the wall can consume
//! at once.
//!
//! **Used by**: Wall (submits a job per cache miss), App (drains results)
//!
//! Workers execute arbitrary closures from an MPMC queue. Jobs carry no
//! priority and no cancellation token: a job for a tile that scrolled
//! away still completes and populates the cache. Results travel back on
//! a separate typed channel that the UI thread drains at its own pace,
//! so submitters never block.

use crossbeam_channel::{unbounded, Receiver, Sender};
use image::RgbImage;
use log::{debug, error};
use std::sync::Arc;
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Completed job result, handed back to the tile that asked for it
#[derive(Debug, Clone)]
pub struct TileUpdate {
    pub tile_idx: usize,
    pub frame_idx: usize,
    /// Rendered bitmap, or a short error string shown inline on the tile
    pub result: Result<Arc<RgbImage>, String>,
}

/// Typed hand-off channel between worker jobs and the UI thread
pub fn update_channel() -> (Sender<TileUpdate>, Receiver<TileUpdate>) {
    unbounded()
}

/// Fixed-size pool of background worker threads
pub struct Workers {
    sender: Sender<Job>,
    _handles: Vec<thread::JoinHandle<()>>, // Keep handles to prevent premature drop
}

impl Workers {
    /// Default pool size: half the CPUs, at least 2
    pub fn default_threads() -> usize {
        (num_cpus::get() / 2).max(2)
    }

    /// Create worker pool with `num_threads` threads
    pub fn new(num_threads: usize) -> Self {
        let (tx, rx): (Sender<Job>, _) = unbounded();
        let mut handles = Vec::new();

        for worker_id in 0..num_threads.max(1) {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("seqwall-worker-{}", worker_id))
                .spawn(move || {
                    debug!("Worker {} started", worker_id);

                    // Worker loop: execute closures until channel closes
                    while let Ok(job) = rx.recv() {
                        job();
                    }

                    debug!("Worker {} stopped", worker_id);
                })
                .expect("Failed to spawn worker thread");

            handles.push(handle);
        }

        debug!("Workers initialized: {} threads", num_threads);

        Self {
            sender: tx,
            _handles: handles,
        }
    }

    /// Number of threads in the pool
    pub fn len(&self) -> usize {
        self._handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self._handles.is_empty()
    }

    /// Execute closure on a worker thread. Never blocks the caller.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(e) = self.sender.send(Box::new(f)) {
            error!("Failed to enqueue job: {}", e);
        }
    }
}

// Sender drops -> channel closes -> workers exit their recv() loop
impl Drop for Workers {
    fn drop(&mut self) {
        debug!("Workers shutting down ({} threads)...", self._handles.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_jobs_run_on_pool_threads() {
        let workers = Workers::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            workers.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        // Jobs are async; poll briefly
        for _ in 0..100 {
            if counter.load(Ordering::SeqCst) == 16 {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("jobs did not complete: {}", counter.load(Ordering::SeqCst));
    }

    #[test]
    fn test_update_channel_hand_off() {
        let (tx, rx) = update_channel();
        let workers = Workers::new(2);

        let tx2 = tx.clone();
        workers.execute(move || {
            tx2.send(TileUpdate {
                tile_idx: 4,
                frame_idx: 1,
                result: Err("decode failed".to_string()),
            })
            .ok();
        });

        let update = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(update.tile_idx, 4);
        assert!(update.result.is_err());
    }

    #[test]
    fn test_pool_floor_is_one_thread() {
        let workers = Workers::new(0);
        assert_eq!(workers.len(), 1);
    }
}
