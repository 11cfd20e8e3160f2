//! Bounded worker pool for per-file labelling
//!
//! Files are fanned out over a fixed number of named threads and the results
//! are fanned back in over a channel as they complete. Completion order is
//! arbitrary; callers that need a stable order sort afterwards.

pub mod coordinator;
pub mod queue;
pub mod worker;

pub use coordinator::{LabelCoordinator, LabelProgress, LabelRunResult};

use crate::classify::{Classifier, LabelResult};
use crate::content::Normalizer;
use crate::discovery::InputFile;
use crate::error::WorkerError;
use crossbeam_channel::unbounded;
use queue::TaskQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};
use worker::{aggregate_stats, TaskContext, Worker};

/// What the pool hands back after all workers have exited
#[derive(Debug, Default)]
pub struct PoolOutcome {
    /// One result per processed file, in completion order
    pub results: Vec<LabelResult>,

    /// Results that carry a family label
    pub labeled: u64,

    /// Results that carry `ERROR`
    pub errors: u64,

    /// Shutdown was requested before every file was processed
    pub interrupted: bool,
}

/// Runs labelling tasks on a fixed number of threads
pub struct WorkerPool {
    worker_count: usize,
    context: Arc<TaskContext>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Create a pool of at most `worker_count` threads (at least one)
    pub fn new(worker_count: usize, normalizer: Normalizer, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            worker_count: worker_count.max(1),
            context: Arc::new(TaskContext {
                normalizer,
                classifier,
            }),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned shutdown flag (e.g. set by a signal handler)
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Label every file, calling `on_result` on the caller's thread as each
    /// result arrives
    ///
    /// Returns once every worker has exited. Without a shutdown request the
    /// outcome holds exactly one result per input file.
    pub fn execute<F>(&self, files: Vec<InputFile>, mut on_result: F) -> Result<PoolOutcome, WorkerError>
    where
        F: FnMut(&LabelResult),
    {
        let expected = files.len();
        if expected == 0 {
            return Ok(PoolOutcome::default());
        }

        let mut queue = TaskQueue::new();
        for file in files {
            queue.submit(file)?;
        }
        queue.close();

        let (result_tx, result_rx) = unbounded();
        let thread_count = self.worker_count.min(expected);
        let mut workers = Vec::with_capacity(thread_count);

        for id in 0..thread_count {
            match Worker::spawn(
                id,
                queue.receiver(),
                result_tx.clone(),
                Arc::clone(&self.context),
                Arc::clone(&self.shutdown),
            ) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    error!(worker = id, error = %e, "Failed to spawn worker, stopping pool");
                    self.shutdown.store(true, Ordering::SeqCst);
                    drop(result_tx);
                    // Unblock workers waiting to send, then reap them
                    for _ in result_rx.iter() {}
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(e);
                }
            }
        }
        debug!(workers = thread_count, tasks = expected, "Worker pool started");

        // Only workers hold senders now; the channel closes when the last exits
        drop(result_tx);

        let mut results = Vec::with_capacity(expected);
        for result in result_rx.iter() {
            on_result(&result);
            results.push(result);
        }

        let (_, labeled, errors) = aggregate_stats(&workers);

        let mut failure = None;
        for worker in workers {
            let id = worker.id();
            if let Err(e) = worker.join() {
                error!(worker = id, error = %e, "Worker failed");
                failure.get_or_insert(e);
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let interrupted = self.shutdown.load(Ordering::SeqCst);
        if results.len() != expected {
            if interrupted {
                warn!(
                    collected = results.len(),
                    expected, "Pool stopped early on shutdown request"
                );
            } else {
                return Err(WorkerError::ResultsLost {
                    expected,
                    collected: results.len(),
                });
            }
        }

        Ok(PoolOutcome {
            results,
            labeled,
            errors,
            interrupted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Label;
    use crate::error::ClassifierError;
    use std::collections::HashSet;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Labels each payload with its compact content, sleeping longer for
    /// earlier names so completion order differs from submission order
    struct Echo {
        calls: AtomicUsize,
    }

    impl Classifier for Echo {
        fn classify(&self, payload: &Path) -> Result<String, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let content = fs::read_to_string(payload).unwrap();
            let value: serde_json::Value = serde_json::from_str(&content).unwrap();
            let delay = value["delay"].as_u64().unwrap_or(0);
            thread::sleep(Duration::from_millis(delay));
            match value["family"].as_str() {
                Some(family) => Ok(family.to_string()),
                None => Err(ClassifierError::LabelParse { output: content }),
            }
        }
    }

    /// Panics on any payload that mentions `"explode"`
    struct Fragile;

    impl Classifier for Fragile {
        fn classify(&self, payload: &Path) -> Result<String, ClassifierError> {
            let content = fs::read_to_string(payload).unwrap();
            if content.contains("explode") {
                panic!("classifier exploded");
            }
            Ok("F".to_string())
        }
    }

    fn write_reports(dir: &Path, reports: &[(&str, &str)]) -> Vec<InputFile> {
        reports
            .iter()
            .map(|(name, body)| {
                let path = dir.join(format!("{}.json", name));
                fs::write(&path, body).unwrap();
                InputFile::new(path, body.len() as u64)
            })
            .collect()
    }

    #[test]
    fn test_execute_one_result_per_file() {
        let dir = tempdir().unwrap();
        let files = write_reports(
            dir.path(),
            &[
                ("a", r#"{"family": "F1", "delay": 60}"#),
                ("b", r#"{"family": "F2", "delay": 30}"#),
                ("c", r#"{"family": "F3"}"#),
                ("d", r#"{"nothing": true}"#),
                ("e", "not json"),
            ],
        );

        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let pool = WorkerPool::new(4, Normalizer::new(), echo.clone());

        let mut seen = 0;
        let outcome = pool.execute(files, |_| seen += 1).unwrap();

        assert_eq!(seen, 5);
        assert_eq!(outcome.results.len(), 5);
        assert_eq!(outcome.labeled, 3);
        assert_eq!(outcome.errors, 2);
        assert!(!outcome.interrupted);
        // "e" fails normalization and never reaches the classifier
        assert_eq!(echo.calls.load(Ordering::SeqCst), 4);

        let names: HashSet<_> = outcome.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.len(), 5);

        let e = outcome.results.iter().find(|r| r.name == "e").unwrap();
        assert_eq!(e.label, Label::Error);
    }

    #[test]
    fn test_execute_empty_input() {
        let pool = WorkerPool::new(
            2,
            Normalizer::new(),
            Arc::new(Echo {
                calls: AtomicUsize::new(0),
            }),
        );
        let outcome = pool.execute(Vec::new(), |_| {}).unwrap();
        assert!(outcome.results.is_empty());
        assert!(!outcome.interrupted);
    }

    #[test]
    fn test_execute_single_worker_more_files() {
        let dir = tempdir().unwrap();
        let reports: Vec<(String, String)> = (0..20)
            .map(|i| (format!("r{:02}", i), format!(r#"{{"family":"F{}"}}"#, i)))
            .collect();
        let borrowed: Vec<(&str, &str)> = reports
            .iter()
            .map(|(n, b)| (n.as_str(), b.as_str()))
            .collect();
        let files = write_reports(dir.path(), &borrowed);

        let pool = WorkerPool::new(
            1,
            Normalizer::new(),
            Arc::new(Echo {
                calls: AtomicUsize::new(0),
            }),
        );
        let outcome = pool.execute(files, |_| {}).unwrap();
        assert_eq!(outcome.results.len(), 20);
        assert_eq!(outcome.labeled, 20);
    }

    #[test]
    fn test_execute_shutdown_before_start() {
        let dir = tempdir().unwrap();
        let files = write_reports(dir.path(), &[("a", "{}"), ("b", "{}")]);

        let shutdown = Arc::new(AtomicBool::new(true));
        let pool = WorkerPool::new(
            2,
            Normalizer::new(),
            Arc::new(Echo {
                calls: AtomicUsize::new(0),
            }),
        )
        .with_shutdown(shutdown);

        let outcome = pool.execute(files, |_| {}).unwrap();
        assert!(outcome.interrupted);
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_execute_classifier_panic_only_fails_its_file() {
        let dir = tempdir().unwrap();
        let files = write_reports(
            dir.path(),
            &[
                ("a", r#"{"mode": "ok"}"#),
                ("b", r#"{"mode": "explode"}"#),
                ("c", r#"{"mode": "ok"}"#),
            ],
        );

        let pool = WorkerPool::new(1, Normalizer::new(), Arc::new(Fragile));
        let outcome = pool.execute(files, |_| {}).unwrap();

        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.labeled, 2);
        assert_eq!(outcome.errors, 1);
        let b = outcome.results.iter().find(|r| r.name == "b").unwrap();
        assert_eq!(b.label, Label::Error);
    }
}
