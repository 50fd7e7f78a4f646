//! The periodic-task supervisor. The source runs each registered task in
//! its own OS process to dodge the GIL and to isolate failures; Rust has
//! neither constraint, so this collapses to one independent `tokio` task
//! per registered job (see DESIGN NOTES / spec §9). The supervisor still
//! joins on all of them and logs — rather than restarts — a crash.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{error, info};

/// A task that runs exactly once for the lifetime of the process (the
/// source's `BaseTask`). `ProxySearchTask` is this shape: it loops inside
/// its own `run`, driven by the discovery stream rather than the
/// scheduler's clock.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self);
}

/// A task invoked on a fixed cadence. `handle` is called, then the
/// scheduler sleeps `timeout` before calling it again, forever.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    fn name(&self) -> &str;
    fn timeout(&self) -> Duration;
    async fn handle(&self);
}

/// Adapts a [`PeriodicTask`] into the one-shot [`Task`] shape the
/// scheduler actually runs, so both kinds share one registration path.
struct PeriodicTaskRunner<T: PeriodicTask + 'static>(Arc<T>);

#[async_trait]
impl<T: PeriodicTask + 'static> Task for PeriodicTaskRunner<T> {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn run(&self) {
        loop {
            self.0.handle().await;
            tokio::time::sleep(self.0.timeout()).await;
        }
    }
}

/// Registers one-shot and periodic tasks and runs them concurrently until
/// the process exits. There is no restart policy: a panicking task is
/// logged and its slot simply stops contributing.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<Arc<dyn Task>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: Arc<dyn Task>) {
        self.tasks.push(task);
    }

    pub fn register_periodic<T: PeriodicTask + 'static>(&mut self, task: Arc<T>) {
        self.tasks.push(Arc::new(PeriodicTaskRunner(task)));
    }

    /// Spawns every registered task and waits for all of them. Normally
    /// this never returns — one-shot discovery and periodic tasks both
    /// loop forever — except in tests, where tasks are short-lived.
    pub async fn run(self) {
        let mut set = JoinSet::new();
        for task in self.tasks {
            let name = task.name().to_string();
            set.spawn(async move {
                task.run().await;
                name
            });
        }

        while let Some(outcome) = set.join_next().await {
            match outcome {
                Ok(name) => info!(task = %name, "task exited"),
                Err(join_err) => error!(error = %join_err, "task panicked; not restarted"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTask(Arc<AtomicUsize>);
    #[async_trait]
    impl Task for CountingTask {
        fn name(&self) -> &str {
            "counting"
        }
        async fn run(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingTask;
    #[async_trait]
    impl Task for PanickingTask {
        fn name(&self) -> &str {
            "panicking"
        }
        async fn run(&self) {
            panic!("simulated task failure");
        }
    }

    #[tokio::test]
    async fn runs_every_registered_one_shot_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.register(Arc::new(CountingTask(counter.clone())));
        scheduler.register(Arc::new(CountingTask(counter.clone())));
        scheduler.run().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn a_panicking_task_does_not_stop_the_others() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.register(Arc::new(PanickingTask));
        scheduler.register(Arc::new(CountingTask(counter.clone())));
        scheduler.run().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    struct TickingPeriodicTask {
        ticks: Arc<AtomicUsize>,
    }
    #[async_trait]
    impl PeriodicTask for TickingPeriodicTask {
        fn name(&self) -> &str {
            "ticking"
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(5)
        }
        async fn handle(&self) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn periodic_task_runs_handle_then_sleeps_in_a_loop() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let task = Arc::new(TickingPeriodicTask { ticks: ticks.clone() });
        let runner = PeriodicTaskRunner(task);

        let handle = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();

        assert!(ticks.load(Ordering::SeqCst) >= 2);
    }
}
