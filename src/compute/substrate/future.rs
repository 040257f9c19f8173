//! Single-assignment futures with continuation hooks.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use super::TaskFailure;

/// Callback run once a future settles.
pub(crate) type Continuation = Box<dyn FnOnce() + Send>;

enum SlotState<T> {
    Pending(Vec<Continuation>),
    Settled(Result<Arc<T>, TaskFailure>),
}

struct Slot<T> {
    task: &'static str,
    state: Mutex<SlotState<T>>,
    settled: Condvar,
}

impl<T> Slot<T> {
    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        // Task bodies never run under this lock, so a poisoned guard still
        // holds a consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the eventual output of a submitted task.
///
/// Cloning is cheap; every clone observes the same value. The value is
/// shared behind an `Arc`, so readers never copy it unless they ask to.
pub struct TaskFuture<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for TaskFuture<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.slot.lock() {
            SlotState::Pending(_) => "pending",
            SlotState::Settled(Ok(_)) => "resolved",
            SlotState::Settled(Err(_)) => "failed",
        };
        f.debug_struct("TaskFuture")
            .field("task", &self.slot.task)
            .field("state", &state)
            .finish()
    }
}

impl<T: Send + Sync + 'static> TaskFuture<T> {
    pub(crate) fn pending(task: &'static str) -> Self {
        Self {
            slot: Arc::new(Slot {
                task,
                state: Mutex::new(SlotState::Pending(Vec::new())),
                settled: Condvar::new(),
            }),
        }
    }

    /// A future that is already resolved to `value`.
    pub fn ready(value: T) -> Self {
        Self {
            slot: Arc::new(Slot {
                task: "value",
                state: Mutex::new(SlotState::Settled(Ok(Arc::new(value)))),
                settled: Condvar::new(),
            }),
        }
    }

    /// Name of the task producing this future.
    pub fn task(&self) -> &'static str {
        self.slot.task
    }

    /// True once the producing task has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(&*self.slot.lock(), SlotState::Settled(_))
    }

    /// Read the value without blocking.
    ///
    /// Inside a task this always succeeds for declared reads. Reading a
    /// future that has not settled yet means it was not declared.
    pub fn get(&self) -> Result<Arc<T>, TaskFailure> {
        match &*self.slot.lock() {
            SlotState::Settled(result) => result.clone(),
            SlotState::Pending(_) => Err(TaskFailure::Undeclared {
                input: self.slot.task,
            }),
        }
    }

    /// Block the calling thread until the future settles.
    ///
    /// Must not be called from a worker thread: a worker blocked here can
    /// starve the pool of the thread its input needs.
    pub fn wait(&self) -> Result<Arc<T>, TaskFailure> {
        let mut state = self.slot.lock();
        loop {
            match &*state {
                SlotState::Settled(result) => return result.clone(),
                SlotState::Pending(_) => {
                    state = self
                        .slot
                        .settled
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Type-erased handle used to declare this future as a task input.
    pub fn dependency(&self) -> Dependency {
        Dependency(Arc::clone(&self.slot) as Arc<dyn Settle>)
    }

    /// Store the task output and fire continuations.
    pub(crate) fn settle(&self, result: Result<T, TaskFailure>) {
        let continuations = {
            let mut state = self.slot.lock();
            let previous = std::mem::replace(&mut *state, SlotState::Settled(result.map(Arc::new)));
            match previous {
                SlotState::Pending(continuations) => continuations,
                SlotState::Settled(_) => {
                    log::error!("task `{}` settled twice", self.slot.task);
                    Vec::new()
                }
            }
        };
        self.slot.settled.notify_all();

        for continuation in continuations {
            continuation();
        }
    }
}

trait Settle: Send + Sync {
    fn task(&self) -> &'static str;
    fn failure(&self) -> Option<TaskFailure>;
    fn on_settled(&self, continuation: Continuation);
}

impl<T: Send + Sync + 'static> Settle for Slot<T> {
    fn task(&self) -> &'static str {
        self.task
    }

    fn failure(&self) -> Option<TaskFailure> {
        match &*self.lock() {
            SlotState::Settled(Err(failure)) => Some(failure.clone()),
            _ => None,
        }
    }

    fn on_settled(&self, continuation: Continuation) {
        let mut state = self.lock();
        match &mut *state {
            SlotState::Pending(continuations) => continuations.push(continuation),
            SlotState::Settled(_) => {
                drop(state);
                continuation();
            }
        }
    }
}

/// A declared task input, independent of its value type.
#[derive(Clone)]
pub struct Dependency(Arc<dyn Settle>);

impl Dependency {
    /// Name of the task producing the input.
    pub fn task(&self) -> &'static str {
        self.0.task()
    }

    pub(crate) fn failure(&self) -> Option<TaskFailure> {
        self.0.failure()
    }

    pub(crate) fn on_settled(&self, continuation: Continuation) {
        self.0.on_settled(continuation);
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dependency").field(&self.task()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_ready_future() {
        let future = TaskFuture::ready(7u32);
        assert!(future.is_settled());
        assert_eq!(*future.get().unwrap(), 7);
        assert_eq!(*future.wait().unwrap(), 7);
    }

    #[test]
    fn test_pending_read_is_undeclared() {
        let future = TaskFuture::<u32>::pending("producer");
        assert!(matches!(
            future.get(),
            Err(TaskFailure::Undeclared { input: "producer" })
        ));
    }

    #[test]
    fn test_continuations_fire_on_settle() {
        let future = TaskFuture::<u32>::pending("producer");
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let fired = Arc::clone(&fired);
            future
                .dependency()
                .on_settled(Box::new(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }));
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        future.settle(Ok(1));
        assert_eq!(fired.load(Ordering::SeqCst), 3);

        // Late registration runs immediately.
        let late = Arc::clone(&fired);
        future.dependency().on_settled(Box::new(move || {
            late.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(fired.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_failure_visible_through_dependency() {
        let future = TaskFuture::<u32>::pending("producer");
        let dependency = future.dependency();
        assert!(dependency.failure().is_none());

        future.settle(Err(TaskFailure::Panicked {
            task: "producer",
            message: "boom".to_string(),
        }));
        assert!(matches!(
            dependency.failure(),
            Some(TaskFailure::Panicked { .. })
        ));
    }

    #[test]
    fn test_wait_across_threads() {
        let future = TaskFuture::<String>::pending("producer");
        let writer = future.clone();
        let handle = std::thread::spawn(move || {
            writer.settle(Ok("done".to_string()));
        });
        assert_eq!(future.wait().unwrap().as_str(), "done");
        handle.join().unwrap();
    }
}
