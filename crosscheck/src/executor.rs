//! Experiment Execution Engine
//!
//! Orchestrates one run: gating, dispatch ordering, sequential or
//! bounded-concurrent execution, report assembly, publishing, and final
//! resolution of the caller's value.
//!
//! ## Execution Modes
//!
//! - **Sequential**: behaviors run one at a time on the caller's thread in
//!   shuffled order.
//! - **Bounded-concurrent**: a worker pool sized to the concurrency budget
//!   consumes behaviors from a job channel. The caller blocks only on the
//!   control's observation; remaining candidates get a fixed drain window
//!   and are recorded as timed out if still running when it closes.
//!
//! ## Data Flow
//!
//! ```text
//! ExperimentConfig
//!        │ gating (enabled / run_if)
//!        ▼
//!  shuffled dispatch order
//!        │ observe() per behavior
//!        ▼
//!  Observations ──► Report (partitioned) ──► Publisher
//!        │
//!        ▼
//!  control value / control failure / mismatch error
//! ```

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use crosscheck_core::{
    Behavior, Cleaner, Failure, Observation, Operation, OperationError, observe, route,
};
use crosscheck_report::Report;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{SeedableRng, thread_rng};

use crate::config::{CONTROL_NAME, DRAIN_TIMEOUT, ExperimentConfig};
use crate::error::{ExperimentError, MismatchError};

/// One entry of the shuffled dispatch order.
struct Dispatch<T> {
    name: String,
    behavior: Behavior<T>,
    is_control: bool,
}

/// A unit of work handed to a pool worker.
struct Job<T, C> {
    index: usize,
    name: String,
    behavior: Behavior<T>,
    cleaner: Option<Cleaner<T, C>>,
}

impl<T, C> ExperimentConfig<T, C>
where
    T: Clone + Send + 'static,
    C: Send + 'static,
{
    /// Run the experiment, selecting the execution mode from the
    /// concurrency budget: sequential for a budget of 1, bounded-concurrent
    /// otherwise.
    ///
    /// Returns the control's value, re-raises the control's failure, or
    /// fails with a mismatch error when configured to throw on mismatches.
    pub fn run(&self) -> Result<T, ExperimentError<T, C>> {
        if self.concurrency > 1 {
            self.run_concurrent()
        } else {
            self.run_sequential()
        }
    }

    /// Run every behavior one at a time on the caller's thread.
    pub fn run_sequential(&self) -> Result<T, ExperimentError<T, C>> {
        if !self.should_run()? {
            return self.run_control_only();
        }
        self.fire_before_run()?;

        let order = self.dispatch_order();
        let mut control = None;
        let mut candidates = Vec::with_capacity(order.len() - 1);
        for entry in &order {
            let observation = observe(entry.name.clone(), &entry.behavior, self.cleaner.clone());
            if entry.is_control {
                control = Some(observation);
            } else {
                candidates.push(observation);
            }
        }
        let control = control.expect("dispatch order always contains the control");
        self.finish(control, candidates)
    }

    /// Run behaviors on a worker pool sized to the concurrency budget.
    ///
    /// Blocks without bound on the control's observation; once it
    /// resolves, outstanding candidates get the fixed drain window and are
    /// recorded as timed out if still running when it closes. Abandoned
    /// workers exit on their own once their behavior returns.
    pub fn run_concurrent(&self) -> Result<T, ExperimentError<T, C>> {
        if !self.should_run()? {
            return self.run_control_only();
        }
        self.fire_before_run()?;

        let order = self.dispatch_order();
        let total = order.len();
        let control_index = order
            .iter()
            .position(|entry| entry.is_control)
            .expect("dispatch order always contains the control");
        let names: Vec<String> = order.iter().map(|entry| entry.name.clone()).collect();

        let jobs: Vec<Job<T, C>> = order
            .into_iter()
            .enumerate()
            .map(|(index, entry)| Job {
                index,
                name: entry.name,
                behavior: entry.behavior,
                cleaner: self.cleaner.clone(),
            })
            .collect();

        let (job_tx, job_rx) = mpsc::channel::<Job<T, C>>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (done_tx, done_rx) = mpsc::channel::<(usize, Observation<T, C>)>();

        let mut workers = 0;
        for worker in 0..self.concurrency.min(total) {
            let queue = Arc::clone(&job_rx);
            let results = done_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("crosscheck-worker-{worker}"))
                .spawn(move || worker_loop(queue, results));
            match spawned {
                Ok(_) => workers += 1,
                Err(err) => {
                    tracing::warn!(experiment = %self.name, error = %err, "failed to spawn worker");
                }
            }
        }
        drop(done_tx);

        let mut slots: Vec<Option<Observation<T, C>>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        if workers == 0 {
            // No pool available: degrade to running the jobs inline.
            for job in jobs {
                slots[job.index] = Some(observe(job.name, &job.behavior, job.cleaner));
            }
        } else {
            for job in jobs {
                // Workers only exit once this sender is dropped, so the
                // send cannot fail here.
                let _ = job_tx.send(job);
            }
            drop(job_tx);

            let mut outstanding = total;

            // The control's outcome decides the caller's return value:
            // wait for it without bound.
            while slots[control_index].is_none() {
                match done_rx.recv() {
                    Ok((index, observation)) => {
                        slots[index] = Some(observation);
                        outstanding -= 1;
                    }
                    Err(_) => break,
                }
            }

            // Control resolved: give the rest a fixed window, then abandon.
            let deadline = Instant::now() + DRAIN_TIMEOUT;
            while outstanding > 0 {
                let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                    break;
                };
                match done_rx.recv_timeout(remaining) {
                    Ok((index, observation)) => {
                        slots[index] = Some(observation);
                        outstanding -= 1;
                    }
                    Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }
        // Dropping the receiver makes abandoned workers exit on their next
        // send instead of blocking forever.
        drop(done_rx);

        let mut control = None;
        let mut candidates = Vec::with_capacity(total - 1);
        for (index, slot) in slots.into_iter().enumerate() {
            let observation = slot.unwrap_or_else(|| {
                tracing::warn!(
                    experiment = %self.name,
                    behavior = %names[index],
                    "behavior still running when the drain window closed"
                );
                Observation::timed_out(names[index].clone(), DRAIN_TIMEOUT)
            });
            if index == control_index {
                control = Some(observation);
            } else {
                candidates.push(observation);
            }
        }
        let control = control.expect("control slot is always present");
        self.finish(control, candidates)
    }

    /// Whether candidates should run at all: at least one candidate is
    /// configured and both gating predicates allow it. A predicate error
    /// swallowed by the failure handler counts as a veto.
    fn should_run(&self) -> Result<bool, OperationError> {
        if self.candidates.is_empty() {
            return Ok(false);
        }
        match (self.enabled)() {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(err) => {
                route(&self.handler, Operation::Enabled, err)?;
                return Ok(false);
            }
        }
        match (self.run_if)() {
            Ok(allowed) => Ok(allowed),
            Err(err) => {
                route(&self.handler, Operation::RunIf, err)?;
                Ok(false)
            }
        }
    }

    /// Gating declined: invoke the control directly, with no observation,
    /// no report, and no publish.
    fn run_control_only(&self) -> Result<T, ExperimentError<T, C>> {
        tracing::debug!(experiment = %self.name, "experiment gated off; running control only");
        (self.control)().map_err(|err| ExperimentError::Control(Failure::from_error(err)))
    }

    fn fire_before_run(&self) -> Result<(), ExperimentError<T, C>> {
        if let Some(hook) = &self.before_run {
            hook().map_err(ExperimentError::Setup)?;
        }
        Ok(())
    }

    /// A fresh, independently shuffled dispatch order. The shuffle only
    /// changes contention order on shared resources; it never affects
    /// which observation is labeled control.
    fn dispatch_order(&self) -> Vec<Dispatch<T>> {
        let mut order = Vec::with_capacity(self.candidates.len() + 1);
        order.push(Dispatch {
            name: CONTROL_NAME.to_string(),
            behavior: Arc::clone(&self.control),
            is_control: true,
        });
        for (name, behavior) in &self.candidates {
            order.push(Dispatch {
                name: name.clone(),
                behavior: Arc::clone(behavior),
                is_control: false,
            });
        }
        match self.shuffle_seed {
            Some(seed) => order.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => order.shuffle(&mut thread_rng()),
        }
        order
    }

    /// Assemble the report, publish it, and resolve the caller's value.
    fn finish(
        &self,
        control: Observation<T, C>,
        candidates: Vec<Observation<T, C>>,
    ) -> Result<T, ExperimentError<T, C>> {
        let report = Report::assemble(
            self.name.clone(),
            control,
            candidates,
            &self.comparator,
            &self.ignores,
            &self.handler,
            self.context.clone(),
        )?;

        if self.throw_on_mismatch {
            // The mismatch decision needs the fully assembled report, so
            // publishing is awaited synchronously.
            self.publish_sync(&report);
            if report.is_mismatched() {
                return Err(ExperimentError::Mismatch(MismatchError::new(
                    self.name.clone(),
                    report,
                )));
            }
            Self::resolve(&report)
        } else {
            let resolution = Self::resolve(&report);
            self.publish_async(report);
            resolution
        }
    }

    /// The caller's result: the control's value, or its failure re-raised.
    fn resolve(report: &Report<T, C>) -> Result<T, ExperimentError<T, C>> {
        match report.control().failure() {
            Some(failure) => Err(ExperimentError::Control(failure.clone())),
            None => {
                let value = report
                    .control()
                    .value()
                    .expect("a non-failed observation always has a value");
                Ok(value.clone())
            }
        }
    }

    /// Publish on the caller's thread. Publisher errors route through the
    /// failure handler under the publish tag and never fail the call.
    fn publish_sync(&self, report: &Report<T, C>) {
        if let Err(err) = self.publisher.publish(report) {
            if let Err(unhandled) = (self.handler)(Operation::Publish, err) {
                tracing::warn!(
                    experiment = %self.name,
                    error = %unhandled,
                    "result publisher failed"
                );
            }
        }
    }

    /// Publish on a detached thread so the caller does not block.
    fn publish_async(&self, report: Report<T, C>) {
        let publisher = Arc::clone(&self.publisher);
        let handler = Arc::clone(&self.handler);
        let experiment = self.name.clone();
        let spawned = thread::Builder::new()
            .name("crosscheck-publish".to_string())
            .spawn(move || {
                if let Err(err) = publisher.publish(&report) {
                    if let Err(unhandled) = handler(Operation::Publish, err) {
                        tracing::warn!(
                            experiment = %experiment,
                            error = %unhandled,
                            "result publisher failed"
                        );
                    }
                }
            });
        if let Err(err) = spawned {
            tracing::warn!(experiment = %self.name, error = %err, "failed to spawn publish thread");
        }
    }
}

/// Pool worker: pull jobs until the job channel closes, observe each
/// behavior, and push the observation back. Exits when the result channel
/// is gone, which is how abandoned workers wind down after a timeout.
fn worker_loop<T, C>(
    jobs: Arc<Mutex<mpsc::Receiver<Job<T, C>>>>,
    results: mpsc::Sender<(usize, Observation<T, C>)>,
) where
    T: Send + 'static,
    C: Send + 'static,
{
    loop {
        let job = {
            let Ok(guard) = jobs.lock() else {
                return;
            };
            guard.recv()
        };
        let Ok(job) = job else {
            return;
        };
        let observation = observe(job.name, &job.behavior, job.cleaner);
        if results.send((job.index, observation)).is_err() {
            return;
        }
    }
}
