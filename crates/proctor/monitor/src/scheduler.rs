//! Scoped task scheduler.
//!
//! Every periodic task of a session (detector loops, the session clock) is registered here and
//! cancelled as one unit. Dropping the scheduler aborts whatever is still running.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Owner of a session's background tasks.
#[derive(Debug, Default)]
pub struct TaskScheduler {
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a named task.
    pub fn spawn<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        debug!(task = %name, "Scheduling task");
        self.tasks.push((name, tokio::spawn(task)));
    }

    /// Run `tick` every `period`, starting one period from now, until it breaks.
    ///
    /// Late ticks are skipped rather than bunched up.
    pub fn every<F>(&mut self, name: impl Into<String>, period: Duration, mut tick: F)
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        self.spawn(name, async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tick().is_break() {
                    break;
                }
            }
        });
    }

    /// Abort every task. Returns how many were still running.
    pub fn cancel_all(&mut self) -> usize {
        let mut running = 0;
        for (name, handle) in self.tasks.drain(..) {
            if !handle.is_finished() {
                running += 1;
                debug!(task = %name, "Cancelling task");
            }
            handle.abort();
        }
        running
    }

    /// Tasks that have not finished yet.
    pub fn active_count(&self) -> usize {
        self.tasks.iter().filter(|(_, h)| !h.is_finished()).count()
    }

    pub fn is_idle(&self) -> bool {
        self.active_count() == 0
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        for (_, handle) in &self.tasks {
            handle.abort();
        }
    }
}
