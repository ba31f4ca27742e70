// src/engine/session.rs

//! Async shell around the pure engine pieces.
//!
//! One Tokio task per session owns the watch backend, the coverage resolver,
//! the debouncers and the gates. It reacts to:
//! - handle commands (add / remove / end / close)
//! - backend events
//! - finished runs
//! - the earliest debounce deadline
//!
//! All decisions are taken on this task; user work only runs elsewhere when
//! a callback hands back a deferred completion.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{WatchConfig, WatchOptions};
use crate::errors::{GlobWatchError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::FileEventKind;
use crate::watch::{
    initial_scan, watch_roots, BackendEvent, BackendFactory, CandidatePath, ClassifiedPatterns,
    Coverage, CoverageResolver, NotifyBackend, Pattern, ProjectRoot, WatchBackend,
};

use super::completion::{self, Completion, Done, RunResult};
use super::debounce::Debouncer;
use super::gate::{GateCommand, GateStep, RunId, TriggerGate};
use super::handle::WatchHandle;
use super::observers::{self, Channel, Observers, SharedObservers, WatchEvent};

/// User callback invoked for every run.
pub type Callback = Box<dyn FnMut(Done) -> Completion + Send + 'static>;

/// Identifier of a callback registration within a session.
pub type TriggerId = usize;

/// How the session was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// No session-wide callback; the pattern set can change at runtime.
    Emitter,
    /// Fixed pattern set driving a single callback.
    Callback,
}

/// Requests sent from a [`WatchHandle`] to its session.
pub(crate) enum SessionCommand {
    Add {
        pattern: String,
        callback: Option<Callback>,
        reply: oneshot::Sender<Result<()>>,
    },
    Remove {
        target: String,
        reply: oneshot::Sender<Result<()>>,
    },
    End,
    Close,
}

/// A callback registration: its own debouncer and single-flight gate.
struct Trigger {
    /// Pattern the trigger is attached to; `None` fires for every reported
    /// path.
    filter: Option<usize>,
    callback: Callback,
    debouncer: Debouncer<PathBuf>,
    gate: TriggerGate,
}

/// Output of a settled run, tagged with where it belongs.
struct RunFinished {
    trigger: TriggerId,
    run: RunId,
    result: RunResult,
}

/// Builder for a [`WatchSession`].
///
/// ```no_run
/// # async fn demo() -> globwatch::errors::Result<()> {
/// use globwatch::config::WatchOptions;
/// use globwatch::engine::{Completion, WatchSession};
///
/// let handle = WatchSession::builder(["src/**/*.rs", "!src/generated/**"])
///     .options(WatchOptions::new().queue(false))
///     .callback(|_done| Completion::ok())
///     .spawn()?;
/// handle.ready().await;
/// # Ok(())
/// # }
/// ```
pub struct WatchSessionBuilder {
    patterns: Vec<String>,
    options: WatchOptions,
    callback: Option<Callback>,
    backend: Option<BackendFactory>,
    fs: Option<Arc<dyn FileSystem>>,
}

impl fmt::Debug for WatchSessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSessionBuilder")
            .field("patterns", &self.patterns)
            .field("options", &self.options)
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

impl WatchSessionBuilder {
    pub fn options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Done) -> Completion + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Replace the `notify` backend.
    pub fn backend(mut self, factory: BackendFactory) -> Self {
        self.backend = Some(factory);
        self
    }

    /// Replace the filesystem used for directory checks and the initial scan.
    pub fn filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Validate everything and start the session task.
    ///
    /// Construction errors (invalid patterns or options, backend creation)
    /// are returned here; everything after is reported on the `error`
    /// channel. Must be called from within a Tokio runtime.
    pub fn spawn(self) -> Result<WatchHandle> {
        let config = self.options.resolve()?;
        let patterns = ClassifiedPatterns::classify(&self.patterns)?;
        let ignored = compile_ignored(&config.ignored)?;

        let (backend_tx, backend_rx) = mpsc::unbounded_channel();
        let factory = self
            .backend
            .unwrap_or_else(|| NotifyBackend::factory(config.poll_interval));
        let backend = factory(backend_tx)?;

        let fs = self.fs.unwrap_or_else(|| Arc::new(RealFileSystem));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let observers = Observers::shared();

        let mode = match self.callback {
            Some(_) => SessionMode::Callback,
            None => SessionMode::Emitter,
        };

        let mut session = WatchSession {
            root: ProjectRoot::new(&config.cwd),
            resolver: CoverageResolver::new(patterns),
            ignored,
            unwatched: Vec::new(),
            fs,
            backend: Some(backend),
            roots: Vec::new(),
            triggers: BTreeMap::new(),
            next_trigger: 0,
            mode,
            observers: Arc::clone(&observers),
            runs: JoinSet::new(),
            backend_rx,
            cmd_rx,
            config,
        };
        if let Some(callback) = self.callback {
            session.register_trigger(None, callback);
        }

        info!(
            patterns = ?self.patterns,
            mode = ?session.mode,
            cwd = ?session.config.cwd,
            "starting watch session"
        );

        tokio::spawn(session.run());
        Ok(WatchHandle::new(cmd_tx, observers, mode))
    }
}

fn compile_ignored(ignored: &[String]) -> Result<Vec<Pattern>> {
    ignored
        .iter()
        .enumerate()
        .map(|(i, text)| {
            Pattern::compile(i, text, false).map_err(|err| {
                GlobWatchError::Config(format!("ignored[{i}] ({text:?}) is not a valid glob: {err}"))
            })
        })
        .collect()
}

/// A running watch: patterns, backend, triggers and subscribers.
pub struct WatchSession {
    config: WatchConfig,
    root: ProjectRoot,
    resolver: CoverageResolver,
    /// Caller-supplied `ignored` globs, applied on top of negations.
    ignored: Vec<Pattern>,
    /// Paths passed to `remove` that were not patterns.
    unwatched: Vec<Pattern>,
    fs: Arc<dyn FileSystem>,
    backend: Option<Box<dyn WatchBackend>>,
    roots: Vec<PathBuf>,
    triggers: BTreeMap<TriggerId, Trigger>,
    next_trigger: TriggerId,
    mode: SessionMode,
    observers: SharedObservers,
    runs: JoinSet<RunFinished>,
    backend_rx: mpsc::UnboundedReceiver<BackendEvent>,
    cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
}

impl fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSession")
            .field("config", &self.config)
            .field("patterns", self.resolver.patterns())
            .field("roots", &self.roots)
            .field("mode", &self.mode)
            .field("triggers", &self.triggers.len())
            .finish_non_exhaustive()
    }
}

impl WatchSession {
    pub fn builder<I, S>(patterns: I) -> WatchSessionBuilder
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        WatchSessionBuilder {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_string())
                .collect(),
            options: WatchOptions::default(),
            callback: None,
            backend: None,
            fs: None,
        }
    }

    /// Main event loop.
    async fn run(mut self) {
        self.start();

        loop {
            let deadline = self.next_deadline();

            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(SessionCommand::End) => {
                        self.shutdown(true);
                        break;
                    }
                    Some(SessionCommand::Close) | None => {
                        self.shutdown(false);
                        break;
                    }
                    Some(other) => self.handle_command(other),
                },
                Some(event) = self.backend_rx.recv() => self.handle_backend_event(event),
                Some(joined) = self.runs.join_next(), if !self.runs.is_empty() => {
                    self.handle_run_joined(joined);
                }
                _ = sleep_until(deadline), if deadline.is_some() => self.fire_due_debouncers(),
            }
        }

        info!("watch session stopped");
    }

    /// Watch the roots, run the initial scan, then announce `ready`.
    fn start(&mut self) {
        self.refresh_roots();

        if self.config.ignore_initial {
            debug!("initial scan suppressed (ignore_initial = true)");
        } else {
            let fs = Arc::clone(&self.fs);
            let files = initial_scan(fs.as_ref(), &self.roots, |path| {
                let candidate = self.root.candidate(path);
                self.is_reported(&candidate)
            });
            info!(count = files.len(), "reporting files found by the initial scan");
            for path in files {
                let candidate = self.root.candidate(&path);
                self.dispatch(FileEventKind::Added, path, &candidate);
            }
        }

        info!(roots = ?self.roots, "watch session ready");
        self.emit(WatchEvent::Ready);
    }

    fn shutdown(&mut self, emit_end: bool) {
        // Releases the OS watches.
        self.backend = None;
        self.runs.abort_all();
        for trigger in self.triggers.values_mut() {
            trigger.debouncer.cancel();
        }

        let mut obs = observers::lock(&self.observers);
        if emit_end {
            obs.emit(WatchEvent::End);
        }
        obs.close();
        info!(emit_end, "watch session shutting down");
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Add {
                pattern,
                callback,
                reply,
            } => {
                let result = self.add_pattern(pattern, callback);
                let _ = reply.send(result);
            }
            SessionCommand::Remove { target, reply } => {
                let result = self.remove_pattern(target);
                let _ = reply.send(result);
            }
            // Handled by the loop itself.
            SessionCommand::End | SessionCommand::Close => {}
        }
    }

    fn ensure_emitter(&self, operation: &str) -> Result<()> {
        match self.mode {
            SessionMode::Emitter => Ok(()),
            SessionMode::Callback => Err(GlobWatchError::Config(format!(
                "`{operation}` is only available on sessions created without a callback"
            ))),
        }
    }

    fn add_pattern(&mut self, raw: String, callback: Option<Callback>) -> Result<()> {
        self.ensure_emitter("add")?;

        if callback.is_some() && raw.starts_with(crate::watch::NEGATION_SIGIL) {
            return Err(GlobWatchError::Config(format!(
                "cannot attach a callback to negated pattern {raw:?}"
            )));
        }

        let index = self.resolver.patterns_mut().push(&raw)?;
        self.unwatched.retain(|p| p.text() != raw);

        if let Some(callback) = callback {
            let id = self.register_trigger(Some(index), callback);
            debug!(pattern = %raw, index, trigger = id, "attached callback to pattern");
        }

        info!(pattern = %raw, index, "pattern added");
        self.refresh_roots();
        Ok(())
    }

    fn remove_pattern(&mut self, target: String) -> Result<()> {
        self.ensure_emitter("remove")?;

        let removed = self.resolver.patterns_mut().remove(&target);
        if removed.is_empty() {
            let pattern = Pattern::compile(self.unwatched.len(), &target, false).map_err(|err| {
                GlobWatchError::Config(format!("cannot stop watching {target:?}: {err}"))
            })?;
            info!(path = %target, "no longer reporting path");
            self.unwatched.push(pattern);
        } else {
            let before = self.triggers.len();
            self.triggers
                .retain(|_, t| t.filter.is_none_or(|index| !removed.contains(&index)));
            info!(
                pattern = %target,
                indices = ?removed,
                dropped_callbacks = before - self.triggers.len(),
                "pattern removed"
            );
        }

        self.refresh_roots();
        Ok(())
    }

    fn register_trigger(&mut self, filter: Option<usize>, callback: Callback) -> TriggerId {
        let id = self.next_trigger;
        self.next_trigger += 1;
        self.triggers.insert(
            id,
            Trigger {
                filter,
                callback,
                debouncer: Debouncer::new(self.config.delay, self.config.leading),
                gate: TriggerGate::new(self.config.queue),
            },
        );
        id
    }

    /// Bring the backend's watch set in line with the current positives.
    fn refresh_roots(&mut self) {
        let wanted = watch_roots(
            self.fs.as_ref(),
            &self.config.cwd,
            self.resolver.patterns().positives(),
        );
        let Some(backend) = self.backend.as_mut() else {
            return;
        };

        let mut failures = Vec::new();

        for old in self.roots.iter().filter(|r| !wanted.contains(r)) {
            debug!(root = ?old, "unwatching root");
            if let Err(err) = backend.unwatch(old) {
                warn!(root = ?old, error = %err, "failed to unwatch root");
            }
        }
        for new in wanted.iter().filter(|r| !self.roots.contains(r)) {
            debug!(root = ?new, "watching root");
            if let Err(err) = backend.watch(new) {
                failures.push(err);
            }
        }

        self.roots = wanted;
        for err in failures {
            self.emit_error(err);
        }
    }

    // ---------------------------------------------------------------------
    // Filesystem events
    // ---------------------------------------------------------------------

    fn handle_backend_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Change { kind, path } => self.handle_change(kind, path),
            BackendEvent::Error(err) => self.emit_error(GlobWatchError::Watch(err)),
        }
    }

    fn handle_change(&mut self, kind: FileEventKind, path: PathBuf) {
        if kind != FileEventKind::Removed && self.fs.is_dir(&path) {
            debug!(?path, %kind, "skipping directory event");
            return;
        }

        let candidate = self.root.candidate(&path);
        if !self.is_reported(&candidate) {
            return;
        }
        self.dispatch(kind, path, &candidate);
    }

    /// Not ignored, not unwatched, matched by a positive and not excluded.
    fn is_reported(&self, candidate: &CandidatePath) -> bool {
        if let Some(p) = self.ignored.iter().find(|p| p.is_match(candidate)) {
            debug!(path = candidate.absolute(), ignored_by = p.text(), "path ignored");
            return false;
        }
        if self.unwatched.iter().any(|p| p.is_match(candidate)) {
            debug!(path = candidate.absolute(), "path no longer watched");
            return false;
        }

        match self.resolver.resolve(candidate) {
            Coverage::Included => true,
            Coverage::Unwatched => false,
            Coverage::Excluded { by } => {
                debug!(path = candidate.absolute(), negated_at = by, "path excluded");
                false
            }
        }
    }

    /// Report an included event and feed the debouncers.
    fn dispatch(&mut self, kind: FileEventKind, path: PathBuf, candidate: &CandidatePath) {
        debug!(?path, %kind, "reporting event");
        self.emit(WatchEvent::file(kind, path.clone()));

        if !self.config.events.contains(kind) {
            debug!(?path, %kind, "event kind does not trigger runs");
            return;
        }

        let now = Instant::now();
        let patterns = self.resolver.patterns();
        let mut fire_now = Vec::new();

        for (id, trigger) in self.triggers.iter_mut() {
            let applies = match trigger.filter {
                None => true,
                Some(index) => patterns.get(index).is_some_and(|p| p.is_match(candidate)),
            };
            if applies && trigger.debouncer.call(now, path.clone()).is_some() {
                fire_now.push(*id);
            }
        }

        for id in fire_now {
            self.fire_trigger(id);
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.triggers
            .values()
            .filter_map(|t| t.debouncer.deadline())
            .min()
    }

    fn fire_due_debouncers(&mut self) {
        let now = Instant::now();
        let due: Vec<TriggerId> = self
            .triggers
            .iter_mut()
            .filter_map(|(id, t)| t.debouncer.poll(now).map(|_| *id))
            .collect();

        for id in due {
            self.fire_trigger(id);
        }
    }

    // ---------------------------------------------------------------------
    // Runs
    // ---------------------------------------------------------------------

    fn fire_trigger(&mut self, id: TriggerId) {
        let Some(trigger) = self.triggers.get_mut(&id) else {
            return;
        };
        let step = trigger.gate.trigger();
        self.apply_gate_step(id, step);
    }

    fn apply_gate_step(&mut self, id: TriggerId, step: GateStep) {
        for command in step.commands {
            match command {
                GateCommand::StartRun(run) => self.start_run(id, run),
                GateCommand::EmitError(err) => {
                    self.emit(WatchEvent::Error(Arc::new(GlobWatchError::Run(err))));
                }
            }
        }
    }

    fn start_run(&mut self, id: TriggerId, run: RunId) {
        let Some(trigger) = self.triggers.get_mut(&id) else {
            return;
        };
        info!(trigger = id, run, "starting run");

        let (done, done_rx) = Done::channel();
        let callback = &mut trigger.callback;
        let completion = match panic::catch_unwind(AssertUnwindSafe(|| callback(done))) {
            Ok(completion) => completion,
            Err(_) => Completion::err(anyhow!("callback panicked")),
        };

        self.runs.spawn(async move {
            let result = completion::run_to_completion(completion, done_rx).await;
            RunFinished {
                trigger: id,
                run,
                result,
            }
        });
    }

    fn handle_run_joined(&mut self, joined: std::result::Result<RunFinished, JoinError>) {
        let finished = match joined {
            Ok(finished) => finished,
            Err(err) if err.is_cancelled() => return,
            Err(err) => {
                error!(error = %err, "run forwarder failed");
                return;
            }
        };

        let RunFinished {
            trigger: id,
            run,
            result,
        } = finished;

        match &result {
            Ok(()) => debug!(trigger = id, run, "run finished"),
            Err(err) => debug!(trigger = id, run, error = %err, "run failed"),
        }

        let error_observed =
            observers::lock(&self.observers).has_subscriber(Channel::Error);

        let Some(trigger) = self.triggers.get_mut(&id) else {
            debug!(trigger = id, run, "run finished for a removed callback");
            return;
        };
        let step = trigger.gate.complete(run, result, error_observed);
        self.apply_gate_step(id, step);
    }

    // ---------------------------------------------------------------------
    // Observers
    // ---------------------------------------------------------------------

    fn emit(&self, event: WatchEvent) {
        observers::lock(&self.observers).emit(event);
    }

    /// Backend failures are always reported, observed or not.
    fn emit_error(&self, err: GlobWatchError) {
        error!(error = %err, "watch error");
        self.emit(WatchEvent::Error(Arc::new(err)));
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
