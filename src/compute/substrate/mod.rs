//! Dataflow task substrate.
//!
//! Tasks are submitted together with the futures they read. A task is handed
//! to the worker pool only once every declared input has settled, so task
//! bodies never block on each other. Submission itself never blocks and may
//! happen from inside a running task, which lets a stage schedule follow-up
//! work whose shape depends on the values it has just seen.
//!
//! Outputs are never written in place: a task that "modifies" a collection
//! receives its input by shared reference, works on a private copy and
//! publishes the result as a new future.
//!
//! The driving thread synchronizes with [`TaskSubstrate::resolve`] and
//! [`TaskSubstrate::resolve_all`], which are the only blocking calls.

mod future;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

pub use future::{Dependency, TaskFuture};

use future::Continuation;

/// Failure of a task or of one of its inputs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskFailure {
    #[error("task `{task}` panicked: {message}")]
    Panicked { task: &'static str, message: String },
    #[error("task `{task}` not run because an input failed: {cause}")]
    Upstream {
        task: &'static str,
        cause: Box<TaskFailure>,
    },
    #[error("input `{input}` was read before it resolved; it must be declared as a read")]
    Undeclared { input: &'static str },
    #[error("task `{task}` failed: {message}")]
    Invalid { task: &'static str, message: String },
}

impl TaskFailure {
    /// The failure that started the chain of skipped tasks.
    pub fn root_cause(&self) -> &TaskFailure {
        match self {
            Self::Upstream { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

struct Inner {
    pool: ThreadPool,
    submitted: AtomicU64,
}

/// Worker pool that runs tasks once their declared reads have settled.
#[derive(Clone)]
pub struct TaskSubstrate {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TaskSubstrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSubstrate")
            .field("threads", &self.threads())
            .field("tasks_submitted", &self.tasks_submitted())
            .finish()
    }
}

impl TaskSubstrate {
    /// Create a substrate backed by a dedicated worker pool.
    ///
    /// `threads = None` uses rayon's default (one worker per core).
    pub fn new(threads: Option<usize>) -> Result<Self, ThreadPoolBuildError> {
        let mut builder =
            ThreadPoolBuilder::new().thread_name(|i| format!("gene-flow-worker-{}", i));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                submitted: AtomicU64::new(0),
            }),
        })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.inner.pool.current_num_threads()
    }

    /// Total tasks submitted so far.
    pub fn tasks_submitted(&self) -> u64 {
        self.inner.submitted.load(Ordering::Relaxed)
    }

    /// Submit a task reading `reads`.
    ///
    /// Returns immediately. The task is launched on the pool once every
    /// dependency has settled. If any dependency failed, the task body is
    /// skipped and the output resolves to [`TaskFailure::Upstream`]. A
    /// panicking body resolves to [`TaskFailure::Panicked`].
    pub fn submit<T, F>(&self, name: &'static str, reads: Vec<Dependency>, task: F) -> TaskFuture<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, TaskFailure> + Send + 'static,
    {
        self.inner.submitted.fetch_add(1, Ordering::Relaxed);
        log::trace!("submit `{}` reading {} inputs", name, reads.len());

        let output = TaskFuture::pending(name);
        let job: Continuation = {
            let output = output.clone();
            let reads = reads.clone();
            Box::new(move || {
                if let Some(cause) = reads.iter().find_map(Dependency::failure) {
                    output.settle(Err(TaskFailure::Upstream {
                        task: name,
                        cause: Box::new(cause),
                    }));
                    return;
                }

                let result = panic::catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(
                    |payload| {
                        Err(TaskFailure::Panicked {
                            task: name,
                            message: panic_message(payload.as_ref()),
                        })
                    },
                );
                output.settle(result);
            })
        };

        // One extra arrival for the submitter itself, so the job cannot
        // launch before every continuation has been registered.
        let gate = Arc::new(Gate {
            remaining: AtomicUsize::new(reads.len() + 1),
            job: Mutex::new(Some(job)),
            inner: Arc::clone(&self.inner),
        });
        for dependency in &reads {
            let gate = Arc::clone(&gate);
            dependency.on_settled(Box::new(move || gate.arrive()));
        }
        gate.arrive();

        output
    }

    /// Block until `future` settles and return an owned copy of its value.
    pub fn resolve<T>(&self, future: &TaskFuture<T>) -> Result<T, TaskFailure>
    where
        T: Clone + Send + Sync + 'static,
    {
        future.wait().map(|value| T::clone(&value))
    }

    /// Block until every future settles; fails with the first failure in order.
    pub fn resolve_all<T>(&self, futures: &[TaskFuture<T>]) -> Result<Vec<T>, TaskFailure>
    where
        T: Clone + Send + Sync + 'static,
    {
        futures.iter().map(|future| self.resolve(future)).collect()
    }
}

/// Countdown that launches a job when its last input arrives.
struct Gate {
    remaining: AtomicUsize,
    job: Mutex<Option<Continuation>>,
    inner: Arc<Inner>,
}

impl Gate {
    fn arrive(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let job = self
            .job
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(job) = job {
            self.inner.pool.spawn(job);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Collect the dependencies of a slice of futures.
pub fn dependencies<T: Send + Sync + 'static>(futures: &[TaskFuture<T>]) -> Vec<Dependency> {
    futures.iter().map(TaskFuture::dependency).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn substrate(threads: usize) -> TaskSubstrate {
        TaskSubstrate::new(Some(threads)).unwrap()
    }

    #[test]
    fn test_independent_task() {
        let substrate = substrate(2);
        let future = substrate.submit("answer", Vec::new(), || Ok(42u32));
        assert_eq!(substrate.resolve(&future).unwrap(), 42);
        assert_eq!(substrate.tasks_submitted(), 1);
    }

    #[test]
    fn test_fan_in_waits_for_all_reads() {
        let substrate = substrate(4);
        let parts: Vec<TaskFuture<u64>> = (0..16u64)
            .map(|i| {
                substrate.submit("part", Vec::new(), move || {
                    std::thread::sleep(Duration::from_millis(16 - i));
                    Ok(i)
                })
            })
            .collect();

        let reads = dependencies(&parts);
        let sum = substrate.submit("sum", reads, move || {
            parts
                .iter()
                .map(|p| p.get().map(|v| *v))
                .sum::<Result<u64, TaskFailure>>()
        });

        assert_eq!(substrate.resolve(&sum).unwrap(), (0..16).sum::<u64>());
    }

    #[test]
    fn test_chain_on_single_worker() {
        // A single worker must still drain a dependency chain because tasks
        // only launch once their inputs are ready.
        let substrate = substrate(1);
        let mut current = TaskFuture::ready(0u32);
        for _ in 0..50 {
            let input = current.clone();
            current = substrate.submit("increment", vec![input.dependency()], move || {
                Ok(*input.get()? + 1)
            });
        }
        assert_eq!(substrate.resolve(&current).unwrap(), 50);
    }

    #[test]
    fn test_panic_becomes_failure() {
        let substrate = substrate(2);
        let future: TaskFuture<u32> =
            substrate.submit("explode", Vec::new(), || panic!("gene out of range"));

        match substrate.resolve(&future) {
            Err(TaskFailure::Panicked { task, message }) => {
                assert_eq!(task, "explode");
                assert_eq!(message, "gene out of range");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_upstream_failure_skips_dependents() {
        let substrate = substrate(2);
        let ran = Arc::new(AtomicBool::new(false));

        let failing: TaskFuture<u32> = substrate.submit("source", Vec::new(), || {
            Err(TaskFailure::Invalid {
                task: "source",
                message: "bad input".to_string(),
            })
        });
        let flag = Arc::clone(&ran);
        let input = failing.clone();
        let dependent = substrate.submit("consumer", vec![failing.dependency()], move || {
            flag.store(true, Ordering::SeqCst);
            Ok(*input.get()? * 2)
        });

        let failure = substrate.resolve(&dependent).unwrap_err();
        assert!(matches!(failure, TaskFailure::Upstream { task: "consumer", .. }));
        assert!(matches!(
            failure.root_cause(),
            TaskFailure::Invalid { task: "source", .. }
        ));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_nested_submission() {
        let substrate = substrate(2);
        let nested = substrate.clone();
        let outer: TaskFuture<Vec<TaskFuture<usize>>> = substrate.submit("outer", Vec::new(), move || {
            Ok((0..8)
                .map(|i| nested.submit("inner", Vec::new(), move || Ok(i * i)))
                .collect())
        });

        let inner = substrate.resolve(&outer).unwrap();
        let values = substrate.resolve_all(&inner).unwrap();
        assert_eq!(values, vec![0, 1, 4, 9, 16, 25, 36, 49]);
        assert_eq!(substrate.tasks_submitted(), 9);
    }

    #[test]
    fn test_resolve_all_reports_first_failure() {
        let substrate = substrate(2);
        let futures: Vec<TaskFuture<u32>> = (0..4u32)
            .map(|i| {
                substrate.submit("maybe", Vec::new(), move || {
                    if i == 2 {
                        Err(TaskFailure::Invalid {
                            task: "maybe",
                            message: format!("item {}", i),
                        })
                    } else {
                        Ok(i)
                    }
                })
            })
            .collect();

        let failure = substrate.resolve_all(&futures).unwrap_err();
        assert!(matches!(failure, TaskFailure::Invalid { message, .. } if message == "item 2"));
    }
}
