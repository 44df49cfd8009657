//! Execution queues.
//!
//! A [`Queue`] is an ordered stream of launches backed by its own rayon
//! thread pool. Each launch runs to completion before the next starts, so
//! launch boundaries are the synchronization points between phases. A panic
//! inside a launch does not unwind into the caller: it marks the queue
//! faulted and surfaces as [`BatchedLuError::DeviceFault`], from the failing
//! launch, from every later launch, and from [`Queue::synchronize`] until
//! [`Queue::reset`] is called.

use crate::config::QueueConfig;
use crate::error::{BatchedLuError, Result};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
struct Fault {
    kernel: String,
    message: String,
}

impl Fault {
    fn to_error(&self) -> BatchedLuError {
        BatchedLuError::DeviceFault {
            kernel: self.kernel.clone(),
            message: self.message.clone(),
        }
    }
}

/// Ordered execution stream for batched kernels.
pub struct Queue {
    pool: rayon::ThreadPool,
    config: QueueConfig,
    fault: Mutex<Option<Fault>>,
    launches: AtomicU64,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.config.name)
            .field("threads", &self.threads())
            .field("faulted", &self.is_faulted())
            .finish()
    }
}

impl Queue {
    /// Create a queue with one worker per logical core.
    pub fn new() -> Result<Self> {
        Self::with_config(QueueConfig::default())
    }

    /// Create a queue from explicit configuration.
    pub fn with_config(config: QueueConfig) -> Result<Self> {
        let name = config.name.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads.unwrap_or(0))
            .thread_name(move |i| format!("{}-{}", name, i))
            .build()
            .map_err(|e| BatchedLuError::QueueInit(e.to_string()))?;

        log::debug!(
            "Created queue '{}' with {} threads",
            config.name,
            pool.current_num_threads()
        );

        Ok(Self {
            pool,
            config,
            fault: Mutex::new(None),
            launches: AtomicU64::new(0),
        })
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Minimum trailing columns before a matrix is updated in parallel.
    pub fn column_grain(&self) -> usize {
        self.config.column_grain
    }

    /// Launches completed or attempted since creation.
    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }

    /// Run `kernel` on the queue's workers and wait for it.
    ///
    /// Fails fast without running anything if the queue is already faulted.
    pub fn launch<R, F>(&self, kernel: &str, f: F) -> Result<R>
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        if let Some(fault) = self.current_fault() {
            return Err(fault.to_error());
        }

        self.launches.fetch_add(1, Ordering::Relaxed);
        log::trace!("Launching {} on queue '{}'", kernel, self.config.name);

        match self.pool.install(|| catch_unwind(AssertUnwindSafe(f))) {
            Ok(value) => Ok(value),
            Err(payload) => {
                let fault = Fault {
                    kernel: kernel.to_string(),
                    message: panic_message(payload.as_ref()),
                };
                log::error!(
                    "Kernel {} faulted on queue '{}': {}",
                    fault.kernel,
                    self.config.name,
                    fault.message
                );
                let err = fault.to_error();
                *self.fault.lock().unwrap_or_else(|e| e.into_inner()) = Some(fault);
                Err(err)
            }
        }
    }

    /// Wait for outstanding work and report any fault.
    ///
    /// Launches complete before [`launch`](Self::launch) returns, so this
    /// only observes the fault state.
    pub fn synchronize(&self) -> Result<()> {
        match self.current_fault() {
            Some(fault) => Err(fault.to_error()),
            None => Ok(()),
        }
    }

    /// Whether a launch has faulted since the last reset.
    pub fn is_faulted(&self) -> bool {
        self.current_fault().is_some()
    }

    /// Clear the fault state.
    pub fn reset(&self) {
        if let Some(fault) = self.fault.lock().unwrap_or_else(|e| e.into_inner()).take() {
            log::debug!(
                "Reset queue '{}' after fault in {}",
                self.config.name,
                fault.kernel
            );
        }
    }

    fn current_fault(&self) -> Option<Fault> {
        self.fault.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    fn queue() -> Queue {
        Queue::with_config(QueueConfig::default().with_threads(2)).unwrap()
    }

    #[test]
    fn test_launch_returns_value() {
        let q = queue();
        let sum: i64 = q
            .launch("sum", || (1..=100i64).into_par_iter().sum())
            .unwrap();
        assert_eq!(sum, 5050);
        assert_eq!(q.launches(), 1);
        assert!(q.synchronize().is_ok());
    }

    #[test]
    fn test_panic_faults_queue_until_reset() {
        let q = queue();
        let err = q
            .launch::<(), _>("boom", || panic!("out of range"))
            .unwrap_err();
        match &err {
            BatchedLuError::DeviceFault { kernel, message } => {
                assert_eq!(kernel, "boom");
                assert!(message.contains("out of range"));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(q.is_faulted());
        assert!(q.synchronize().unwrap_err().is_device_fault());
        // Later launches fail fast without running.
        let ran = std::sync::atomic::AtomicBool::new(false);
        assert!(q.launch("next", || ran.store(true, Ordering::SeqCst)).is_err());
        assert!(!ran.load(Ordering::SeqCst));

        q.reset();
        assert!(q.synchronize().is_ok());
        assert!(q.launch("next", || ()).is_ok());
    }

    #[test]
    fn test_panic_in_parallel_worker_is_caught() {
        let q = queue();
        let err = q.launch("workers", || {
            (0..64).into_par_iter().for_each(|i| {
                if i == 37 {
                    panic!("worker {} failed", i);
                }
            })
        });
        assert!(err.unwrap_err().is_device_fault());
    }
}
