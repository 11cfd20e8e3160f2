//! Worker thread logic for parallel labelling
//!
//! Each worker:
//! - Pulls classification tasks from the shared task queue
//! - Normalizes the report into its own sidecar file
//! - Runs the classifier on the sidecar and deletes the sidecar
//! - Sends exactly one `LabelResult` per task to the collector
//!
//! Task failures, including a panicking classifier, are turned into `ERROR`
//! results here and never escape the worker.

use crate::classify::{Classifier, LabelResult};
use crate::content::Normalizer;
use crate::error::{TaskError, TaskResult, WorkerError};
use crate::pool::queue::{ClassificationTask, TaskReceiver};
use crossbeam_channel::Sender;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Tasks completed
    pub processed: AtomicU64,

    /// Tasks that produced a family label
    pub labeled: AtomicU64,

    /// Tasks that produced `ERROR`
    pub errors: AtomicU64,
}

impl WorkerStats {
    fn record(&self, result: &LabelResult) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if result.label.is_error() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        } else {
            self.labeled.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Everything a worker needs to run a task, shared by all workers
pub struct TaskContext {
    pub normalizer: Normalizer,
    pub classifier: Arc<dyn Classifier>,
}

/// A worker thread that processes classification tasks
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,

    /// Worker statistics
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(
        id: usize,
        tasks: TaskReceiver,
        results: Sender<LabelResult>,
        context: Arc<TaskContext>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, WorkerError> {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("labeler-{}", id))
            .spawn(move || worker_loop(id, tasks, results, context, shutdown, stats_clone))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|payload| WorkerError::Panicked {
                id: self.id,
                message: panic_message(payload.as_ref()),
            }),
            None => Ok(()),
        }
    }
}

/// Main worker loop
fn worker_loop(
    id: usize,
    tasks: TaskReceiver,
    results: Sender<LabelResult>,
    context: Arc<TaskContext>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<WorkerStats>,
) {
    debug!(worker = id, "Worker starting");

    while let Some(task) = tasks.recv() {
        if shutdown.load(Ordering::Relaxed) {
            debug!(worker = id, "Shutdown requested, leaving remaining tasks");
            break;
        }

        let result = process_task(id, &task, &context);
        stats.record(&result);

        if results.send(result).is_err() {
            warn!(worker = id, "Result collector gone, stopping");
            break;
        }
    }

    debug!(
        worker = id,
        processed = stats.processed.load(Ordering::Relaxed),
        "Worker finished"
    );
}

/// Run one task end to end and produce its single result
pub fn process_task(worker: usize, task: &ClassificationTask, context: &TaskContext) -> LabelResult {
    let file = &task.file;

    match classify_file(task, context) {
        Ok(family) => {
            trace!(worker, task = task.id, file = %file.name, label = %family, "Report labeled");
            LabelResult::labeled(file.name.clone(), family, file.path.clone())
        }
        Err(e) => {
            warn!(
                worker,
                task = task.id,
                file = %file.path.display(),
                kind = e.kind(),
                error = %e,
                "Labeling failed"
            );
            LabelResult::failed(file.name.clone(), file.path.clone())
        }
    }
}

fn classify_file(task: &ClassificationTask, context: &TaskContext) -> TaskResult<String> {
    let payload = context.normalizer.normalize(&task.file)?;
    let label = panic::catch_unwind(AssertUnwindSafe(|| {
        context.classifier.classify(payload.path())
    }))
    .map_err(|cause| TaskError::ClassifierPanicked {
        path: task.file.path.clone(),
        message: panic_message(cause.as_ref()),
    });

    // The sidecar goes away here whatever the classifier returned
    let sidecar = payload.path().to_path_buf();
    if let Err(e) = payload.release() {
        warn!(sidecar = %sidecar.display(), error = %e, "Failed to remove sidecar");
    }

    Ok(label??)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "Worker thread panicked".to_string()
    }
}

/// Aggregate statistics from all workers: (processed, labeled, errors)
pub fn aggregate_stats(workers: &[Worker]) -> (u64, u64, u64) {
    let totals = workers.iter().fold((0, 0, 0), |(p, l, e), w| {
        let s = w.stats();
        (
            p + s.processed.load(Ordering::Relaxed),
            l + s.labeled.load(Ordering::Relaxed),
            e + s.errors.load(Ordering::Relaxed),
        )
    });
    info!(
        workers = workers.len(),
        processed = totals.0,
        labeled = totals.1,
        errors = totals.2,
        "Worker totals"
    );
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::InputFile;
    use crate::error::ClassifierError;
    use crate::classify::Label;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Records every payload path and echoes a fixed answer
    struct Recording {
        seen: Mutex<Vec<(std::path::PathBuf, String)>>,
        answer: Result<String, ClassifierError>,
    }

    impl Classifier for Recording {
        fn classify(&self, payload: &Path) -> Result<String, ClassifierError> {
            let content = fs::read_to_string(payload).unwrap();
            self.seen.lock().unwrap().push((payload.to_path_buf(), content));
            self.answer.clone()
        }
    }

    fn context(answer: Result<String, ClassifierError>) -> (Arc<Recording>, TaskContext) {
        let recording = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            answer,
        });
        let ctx = TaskContext {
            normalizer: Normalizer::new(),
            classifier: recording.clone(),
        };
        (recording, ctx)
    }

    fn task(dir: &Path, name: &str, content: &str) -> ClassificationTask {
        let path = dir.join(format!("{}.json", name));
        fs::write(&path, content).unwrap();
        ClassificationTask {
            id: 0,
            file: InputFile::new(path, content.len() as u64),
        }
    }

    #[test]
    fn test_process_task_success_removes_sidecar() {
        let dir = tempdir().unwrap();
        let (recording, ctx) = context(Ok("FAMILY1".into()));
        let task = task(dir.path(), "a", "{ \"x\" : 1 }");

        let result = process_task(0, &task, &ctx);
        assert_eq!(result.name, "a");
        assert_eq!(result.label, Label::Family("FAMILY1".into()));

        let seen = recording.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, r#"{"x":1}"#);
        assert!(!seen[0].0.exists());
    }

    #[test]
    fn test_process_task_classifier_failure_removes_sidecar() {
        let dir = tempdir().unwrap();
        let (recording, ctx) = context(Err(ClassifierError::Failed {
            status: "exit code 1".into(),
            stderr: String::new(),
        }));
        let task = task(dir.path(), "b", "{}");

        let result = process_task(0, &task, &ctx);
        assert_eq!(result.label, Label::Error);

        let seen = recording.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].0.exists());
    }

    #[test]
    fn test_process_task_malformed_skips_classifier() {
        let dir = tempdir().unwrap();
        let (recording, ctx) = context(Ok("NEVER".into()));
        let task = task(dir.path(), "c", "{ corrupt");

        let result = process_task(0, &task, &ctx);
        assert_eq!(result.label, Label::Error);
        assert!(recording.seen.lock().unwrap().is_empty());
    }

    struct Exploding;

    impl Classifier for Exploding {
        fn classify(&self, payload: &Path) -> Result<String, ClassifierError> {
            assert!(payload.exists());
            panic!("classifier exploded");
        }
    }

    #[test]
    fn test_process_task_classifier_panic_becomes_error() {
        let dir = tempdir().unwrap();
        let ctx = TaskContext {
            normalizer: Normalizer::new(),
            classifier: Arc::new(Exploding),
        };
        let task = task(dir.path(), "boom", "{}");

        let result = process_task(0, &task, &ctx);
        assert_eq!(result.name, "boom");
        assert_eq!(result.label, Label::Error);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "Worker thread panicked");
    }
}
