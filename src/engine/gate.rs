// src/engine/gate.rs

//! Single-flight run scheduler.
//!
//! Pure and synchronous: it consumes triggers and completions and returns
//! commands for the session loop to carry out. It has no channels, no Tokio
//! types, and performs no IO.

use tracing::debug;

/// Identifier of one run of a callback. Monotonically increasing per gate.
pub type RunId = u64;

/// Scheduler state. Owned exclusively by [`TriggerGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Running(RunId),
    RunningWithQueued(RunId),
}

/// Command produced by the gate, to be executed by the session loop.
#[derive(Debug)]
pub enum GateCommand {
    /// Invoke the callback for this run.
    StartRun(RunId),
    /// Deliver a run error to the `error` channel.
    EmitError(anyhow::Error),
}

/// Result of a single gate transition.
#[derive(Debug, Default)]
pub struct GateStep {
    pub commands: Vec<GateCommand>,
}

impl GateStep {
    fn none() -> Self {
        Self::default()
    }

    fn start(run: RunId) -> Self {
        Self {
            commands: vec![GateCommand::StartRun(run)],
        }
    }
}

/// At most one run in flight; optionally one queued re-run.
#[derive(Debug)]
pub struct TriggerGate {
    state: GateState,
    queue: bool,
    run_counter: RunId,
}

impl TriggerGate {
    pub fn new(queue: bool) -> Self {
        Self {
            state: GateState::Idle,
            queue,
            run_counter: 0,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == GateState::Idle
    }

    /// The run currently in flight, if any.
    pub fn current_run(&self) -> Option<RunId> {
        match self.state {
            GateState::Idle => None,
            GateState::Running(run) | GateState::RunningWithQueued(run) => Some(run),
        }
    }

    /// Handle a debounced trigger.
    ///
    /// - `Idle`: start a run.
    /// - `Running`: queue one re-run if queuing is enabled, else drop.
    /// - `RunningWithQueued`: collapse into the pending re-run.
    pub fn trigger(&mut self) -> GateStep {
        match self.state {
            GateState::Idle => {
                let run = self.next_run_id();
                self.state = GateState::Running(run);
                GateStep::start(run)
            }
            GateState::Running(run) if self.queue => {
                debug!(run, "trigger while running; queueing one re-run");
                self.state = GateState::RunningWithQueued(run);
                GateStep::none()
            }
            GateState::Running(run) => {
                debug!(run, "trigger while running and queue disabled; dropping");
                GateStep::none()
            }
            GateState::RunningWithQueued(run) => {
                debug!(run, "trigger while a re-run is already queued; collapsing");
                GateStep::none()
            }
        }
    }

    /// Handle the completion of `run`.
    ///
    /// `error_observed` must reflect whether anyone is subscribed to errors
    /// *now*, at completion time. An error nobody observes is discarded and
    /// the gate proceeds as if the run succeeded.
    ///
    /// A completion for a run that is not in flight (a duplicate signal, or
    /// one arriving after the run was superseded) is ignored.
    pub fn complete(
        &mut self,
        run: RunId,
        result: Result<(), anyhow::Error>,
        error_observed: bool,
    ) -> GateStep {
        if self.current_run() != Some(run) {
            debug!(run, state = ?self.state, "ignoring completion for a run that is not in flight");
            return GateStep::none();
        }

        let mut step = GateStep::none();

        if let Err(err) = result {
            if error_observed {
                step.commands.push(GateCommand::EmitError(err));
            } else {
                debug!(run, error = %err, "run failed with no error observer; discarding");
            }
        }

        match self.state {
            GateState::RunningWithQueued(_) => {
                let next = self.next_run_id();
                self.state = GateState::Running(next);
                step.commands.push(GateCommand::StartRun(next));
            }
            _ => self.state = GateState::Idle,
        }

        step
    }

    fn next_run_id(&mut self) -> RunId {
        self.run_counter += 1;
        self.run_counter
    }
}
