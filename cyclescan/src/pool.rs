//! Persistent worker pool.
//!
//! The pool is created lazily on first use and reused across analyses; it is
//! only torn down by [`PoolManager::shutdown`] (or when the manager is dropped).
//! A run that failed hands its pool to [`PoolManager::abandon`]: threads still
//! stuck in the old jobs exit once those jobs return, and the next run starts
//! on fresh threads. A process-wide instance is available through
//! [`PoolManager::global`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use lazy_static::lazy_static;
use log::{info, warn};
use parking_lot::Mutex;
use threadpool::ThreadPool;

use crate::config::available_workers;
use crate::def::WORKER_THREAD_NAME;

lazy_static! {
    static ref GLOBAL_POOL: Arc<PoolManager> = Arc::new(PoolManager::new(available_workers()));
}

pub struct PoolManager {
    size: usize,
    pool: Mutex<Option<ThreadPool>>,
    creations: AtomicUsize,
}

impl PoolManager {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            pool: Mutex::new(None),
            creations: AtomicUsize::new(0),
        }
    }

    pub fn global() -> Arc<PoolManager> {
        GLOBAL_POOL.clone()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut guard = self.pool.lock();
        let pool = guard.get_or_insert_with(|| {
            let created = self.creations.fetch_add(1, Ordering::SeqCst) + 1;
            info!("starting worker pool of {} threads (#{})", self.size, created);
            ThreadPool::with_name(WORKER_THREAD_NAME.to_string(), self.size)
        });
        pool.execute(job);
    }

    /// Like [`execute`](Self::execute), and bumps `panics` if the job unwinds.
    pub fn execute_counted<F>(&self, panics: &Arc<AtomicUsize>, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let sentinel = PanicSentinel(panics.clone());
        self.execute(move || {
            let _sentinel = sentinel;
            job();
        });
    }

    /// Panics observed by the current pool since it was created.
    pub fn panic_count(&self) -> usize {
        self.pool.lock().as_ref().map_or(0, |p| p.panic_count())
    }

    pub fn active_count(&self) -> usize {
        self.pool.lock().as_ref().map_or(0, |p| p.active_count())
    }

    pub fn is_running(&self) -> bool {
        self.pool.lock().is_some()
    }

    /// Number of times a pool was started.
    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    /// Waits for queued jobs and stops the threads. The next
    /// [`execute`](Self::execute) starts a new pool.
    pub fn shutdown(&self) {
        let pool = self.pool.lock().take();
        if let Some(pool) = pool {
            pool.join();
            info!("worker pool stopped");
        }
    }

    /// Detaches the current pool without waiting for its jobs. The threads
    /// finish whatever they are running and then exit.
    pub fn abandon(&self) {
        let pool = self.pool.lock().take();
        if let Some(pool) = pool {
            warn!(
                "abandoning worker pool with {} busy threads",
                pool.active_count()
            );
            drop(pool);
        }
    }
}

struct PanicSentinel(Arc<AtomicUsize>);

impl Drop for PanicSentinel {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for PoolManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;

    use super::*;

    #[test]
    fn test_lazy_start_and_reuse() {
        let manager = PoolManager::new(2);
        assert!(!manager.is_running());
        assert_eq!(manager.creations(), 0);

        let (tx, rx) = channel();
        for i in 0..4 {
            let tx = tx.clone();
            manager.execute(move || {
                let name = std::thread::current().name().map(str::to_string);
                tx.send((i, name)).unwrap();
            });
        }
        drop(tx);
        let mut seen: Vec<_> = rx.iter().collect();
        seen.sort();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|(_, name)| name.as_deref() == Some(WORKER_THREAD_NAME)));
        assert_eq!(manager.creations(), 1);

        manager.shutdown();
        assert!(!manager.is_running());
        manager.execute(|| {});
        assert_eq!(manager.creations(), 2);
    }

    #[test]
    fn test_panics_are_counted() {
        let manager = PoolManager::new(1);
        manager.execute(|| panic!("injected"));
        let pool = manager.pool.lock().as_ref().unwrap().clone();
        pool.join();
        assert_eq!(manager.panic_count(), 1);
        // the pool replaces the dead thread
        let (tx, rx) = channel();
        manager.execute(move || tx.send(1).unwrap());
        assert_eq!(rx.recv().unwrap(), 1);
    }

    #[test]
    fn test_counted_panics_stay_with_their_counter() {
        let manager = PoolManager::new(2);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        manager.execute_counted(&first, || panic!("injected"));
        manager.execute_counted(&second, || {});
        manager.shutdown();
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_abandon_does_not_wait_for_stuck_jobs() {
        let manager = PoolManager::new(1);
        let (release_tx, release_rx) = channel::<()>();
        manager.execute(move || {
            let _ = release_rx.recv();
        });
        assert_eq!(manager.creations(), 1);

        let started = std::time::Instant::now();
        manager.abandon();
        assert!(!manager.is_running());

        // a fresh pool takes new work while the old thread is still blocked
        let (tx, rx) = channel();
        manager.execute(move || tx.send(7).unwrap());
        assert_eq!(rx.recv().unwrap(), 7);
        assert_eq!(manager.creations(), 2);
        manager.shutdown();
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        drop(release_tx);
    }
}
