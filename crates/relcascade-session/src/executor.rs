//! Detached side effects.
//!
//! Work that must not hold up (or share) a request's transaction, such as
//! outbound notifications, is queued on a [`SideEffectExecutor`]. Worker
//! threads pull tasks from a channel; a panicking task is caught, logged and
//! reported to the recovery chain without affecting other tasks.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use relcascade_core::{Error, Result};

use crate::hooks::{ControllerHooks, Recovered, panic_message};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Job {
    name: String,
    task: Task,
}

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn incr(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn decr(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

/// Fixed pool of worker threads running fire-and-forget tasks.
pub struct SideEffectExecutor {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    in_flight: Arc<InFlight>,
}

impl fmt::Debug for SideEffectExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideEffectExecutor")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl SideEffectExecutor {
    /// Start `workers` threads reporting panics to `hooks`.
    pub fn new(workers: usize, hooks: Arc<ControllerHooks>) -> Result<Self> {
        if workers == 0 {
            return Err(Error::Config("side_effect_workers must be at least 1".to_string()));
        }
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let in_flight = Arc::new(InFlight::default());

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let receiver = Arc::clone(&receiver);
            let in_flight = Arc::clone(&in_flight);
            let hooks = Arc::clone(&hooks);
            let handle = std::thread::Builder::new()
                .name(format!("relcascade-effects-{index}"))
                .spawn(move || worker_loop(&receiver, &in_flight, &hooks))
                .map_err(|e| Error::Config(format!("cannot spawn side-effect worker: {e}")))?;
            handles.push(handle);
        }
        tracing::debug!(
            target: "relcascade::effects",
            workers,
            "side-effect executor started"
        );

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            in_flight,
        })
    }

    /// Queue a task. Fails once the executor has been shut down.
    pub fn spawn<F>(&self, name: impl Into<String>, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(Error::Config(format!(
                "side-effect executor is shut down; dropped task {name}"
            )));
        };
        self.in_flight.incr();
        let job = Job {
            name,
            task: Box::new(task),
        };
        if let Err(mpsc::SendError(job)) = sender.send(job) {
            self.in_flight.decr();
            return Err(Error::Config(format!(
                "side-effect workers are gone; dropped task {}",
                job.name
            )));
        }
        Ok(())
    }

    /// Tasks queued or running.
    pub fn pending(&self) -> usize {
        *self
            .in_flight
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until no task is queued or running, or `timeout` elapses.
    /// Returns whether the executor went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self
            .in_flight
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .in_flight
                .idle
                .wait_timeout(count, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            count = guard;
        }
        true
    }

    /// Stop accepting tasks, let queued ones finish and join the workers.
    pub fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let handles: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!(target: "relcascade::effects", "side-effect worker exited abnormally");
            }
        }
    }
}

impl Drop for SideEffectExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Job>>, in_flight: &InFlight, hooks: &ControllerHooks) {
    loop {
        let job = {
            let rx = receiver.lock().unwrap_or_else(PoisonError::into_inner);
            rx.recv()
        };
        let Ok(Job { name, task }) = job else {
            break;
        };
        if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
            let recovered = Recovered {
                origin: name,
                message: panic_message(payload.as_ref()),
            };
            tracing::error!(
                target: "relcascade::effects",
                task = %recovered.origin,
                panic = %recovered.message,
                "side effect panicked"
            );
            hooks.report_recovered(std::slice::from_ref(&recovered));
        }
        in_flight.decr();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_runs_tasks() {
        let executor = SideEffectExecutor::new(2, Arc::new(ControllerHooks::new())).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for i in 0..10 {
            let counter = Arc::clone(&counter);
            executor
                .spawn(format!("task-{i}"), move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        assert!(executor.wait_idle(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_panicking_task_is_reported() {
        let hooks = Arc::new(ControllerHooks::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hooks.on_recover.add(
            "capture",
            Arc::new(move |r: &Recovered| sink.lock().unwrap().push(r.clone())),
        );
        let executor = SideEffectExecutor::new(1, Arc::clone(&hooks)).unwrap();
        executor.spawn("boom", || panic!("effect failed")).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        executor
            .spawn("after", move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert!(executor.wait_idle(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].origin, "boom");
        assert_eq!(seen[0].message, "effect failed");
    }

    #[test]
    fn test_spawn_after_shutdown_fails() {
        let executor = SideEffectExecutor::new(1, Arc::new(ControllerHooks::new())).unwrap();
        executor.shutdown();
        assert!(matches!(executor.spawn("late", || {}), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(SideEffectExecutor::new(0, Arc::new(ControllerHooks::new())).is_err());
    }
}
