//! # Supervisor: the worker-pool state machine.
//!
//! The [`Supervisor`] owns the runtime components (event bus, subscribers,
//! worker registry, process handles) and serializes every lifecycle
//! transition of the pool: initial fill, rolling reload, scale up/down,
//! crash restart, and graceful shutdown.
//!
//! ## Architecture
//! ```text
//! ControlHandle ──► command queue ──► Supervisor::run()
//!                                          │
//!                                          ├──► subscriber_listener()
//!                                          │         └──► SubscriberSet (LogWriter, ...)
//!                                          │
//!                                          ├──► initial fill (fork `workers` children)
//!                                          │
//!                                          └──► command loop
//!                                                ├──► reload    (rolling, one id at a time)
//!                                                ├──► scale up / scale down
//!                                                ├──► worker events (ready tokens, exits)
//!                                                ├──► idle tick (readiness probe, warnings)
//!                                                └──► stop ──► graceful shutdown
//! ```
//!
//! ## Rules
//! - The supervisor is the **single writer** of the registry and the three
//!   transition flags; IPC reads consistent snapshots.
//! - At most one of reload / scale-down / shutdown is in progress; commands
//!   arriving during a transition are rejected with an observable event,
//!   **except** `stop`, which supersedes and is honored at the next
//!   suspension point.
//! - Rolling reload replaces before it retires: the pool never drops below
//!   target capacity while a reload is running.
//! - A worker exit outside any transition triggers an immediate respawn; a
//!   failed respawn is reported and waits for the next command rather than
//!   looping on the error.
//!
//! ## Shutdown timeline
//! ```text
//! stop ──► mark every worker draining, send shutdown tokens
//!      ──► wait for exits up to `grace`
//!            ├─ registry empty ──► AllStoppedWithin ──► Ok(())
//!            └─ deadline ──► force-kill stragglers ──► GraceExceeded error
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{
    config::Config,
    control::{self, Command, ControlHandle},
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    probe,
    subscribers::{Subscribe, SubscriberSet},
};

use super::registry::{WorkerId, WorkerRegistry, WorkerState};
use super::worker::{Spawn, WorkerEvent, WorkerProc};

/// Capacity of the worker-event channel shared by all child processes.
const WORKER_EVENT_CAPACITY: usize = 256;
/// Capacity of the control command queue.
const COMMAND_CAPACITY: usize = 64;

/// Outcome of one readiness wait during a reload step.
enum ReadyWait {
    /// The replacement reached `ready` in time.
    Ready,
    /// The replacement exited or missed the readiness deadline.
    Failed,
    /// A stop command superseded the reload.
    Interrupted,
}

/// Orchestrates a pool of identical worker processes.
///
/// ```no_run
/// use std::path::PathBuf;
/// use std::sync::Arc;
/// use gpdd::{Config, LogWriter, OsSpawner, Supervisor};
///
/// # async fn demo() -> Result<(), gpdd::RuntimeError> {
/// let app = PathBuf::from("./server");
/// let spawner = Arc::new(OsSpawner::new(app.clone()));
/// let (mut sup, handle) = Supervisor::new(
///     Config::default(),
///     app,
///     spawner,
///     vec![Arc::new(LogWriter)],
/// );
/// # let _ = handle;
/// sup.run().await
/// # }
/// ```
pub struct Supervisor {
    cfg: Config,
    app_file: PathBuf,
    started_at: SystemTime,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    registry: Arc<WorkerRegistry>,
    spawner: Arc<dyn Spawn>,
    /// Live process handles, keyed like the registry. Registry rows are the
    /// public data model; these carry the stdin channel and kill capability.
    procs: HashMap<WorkerId, Box<dyn WorkerProc>>,
    /// Next worker id; strictly increasing, never reused.
    next_id: WorkerId,
    shutting_down: bool,
    reloading: bool,
    scaling_down: bool,
    /// False once every control handle is gone; stops polling a closed
    /// channel.
    control_open: bool,
    /// Workers already warned about a missed cold-start readiness deadline.
    ready_warned: HashSet<WorkerId>,
    worker_tx: mpsc::Sender<WorkerEvent>,
    worker_rx: mpsc::Receiver<WorkerEvent>,
    control_rx: mpsc::Receiver<Command>,
}

impl Supervisor {
    /// Creates a supervisor and the handle used to submit commands to it.
    pub fn new(
        cfg: Config,
        app_file: PathBuf,
        spawner: Arc<dyn Spawn>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> (Self, ControlHandle) {
        let bus = Bus::new(cfg.bus_capacity);
        let subs = Arc::new(SubscriberSet::new(subscribers));
        let (handle, control_rx) = control::channel(COMMAND_CAPACITY);
        let (worker_tx, worker_rx) = mpsc::channel(WORKER_EVENT_CAPACITY);

        let sup = Self {
            cfg,
            app_file,
            started_at: SystemTime::now(),
            bus,
            subs,
            registry: Arc::new(WorkerRegistry::new()),
            spawner,
            procs: HashMap::new(),
            next_id: 1,
            shutting_down: false,
            reloading: false,
            scaling_down: false,
            control_open: true,
            ready_warned: HashSet::new(),
            worker_tx,
            worker_rx,
            control_rx,
        };
        (sup, handle)
    }

    /// Shared view of the worker table (for the IPC surface and tests).
    pub fn registry(&self) -> Arc<WorkerRegistry> {
        Arc::clone(&self.registry)
    }

    /// The event bus (for additional listeners and tests).
    pub fn bus(&self) -> Bus {
        self.bus.clone()
    }

    /// Wall time the master came up.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Resolved path of the worker binary.
    pub fn app_file(&self) -> &Path {
        &self.app_file
    }

    /// Runs the supervisor until graceful termination.
    ///
    /// ### Exit conditions
    /// - `Ok(())` — a stop command drained every worker within `grace`
    /// - `Err(SpawnFailed)` — the very first child could not be created
    /// - `Err(GraceExceeded)` — shutdown force-killed stragglers
    pub async fn run(&mut self) -> Result<(), RuntimeError> {
        // Listener first so fill events are observed.
        self.subscriber_listener();
        self.initial_fill().await?;
        self.command_loop().await
    }

    /// Spawns the background task that fans bus events out to subscribers.
    fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let subs = Arc::clone(&self.subs);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => subs.emit_arc(Arc::new(ev)),
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        });
    }

    /// Forks the initial pool.
    ///
    /// Only the very first child is load-bearing for startup: a later spawn
    /// failure is reported and leaves a smaller pool.
    async fn initial_fill(&mut self) -> Result<(), RuntimeError> {
        for i in 0..self.cfg.workers {
            match self.spawn_worker().await {
                Ok(_) => {}
                Err(err) if i == 0 => return Err(err),
                Err(_) => {}
            }
        }
        Ok(())
    }

    /// The single-writer command loop.
    async fn command_loop(&mut self) -> Result<(), RuntimeError> {
        let mut tick = time::interval(self.cfg.ready_poll);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if self.shutting_down {
                return self.shutdown_protocol().await;
            }

            tokio::select! {
                cmd = self.control_rx.recv(), if self.control_open => match cmd {
                    Some(Command::Stop) => self.shutting_down = true,
                    // An unreachable supervisor has nothing left to serve.
                    None => {
                        self.control_open = false;
                        self.shutting_down = true;
                    }
                    Some(Command::Reload) => self.reload().await,
                    Some(Command::ScaleUp) => self.scale_up().await,
                    Some(Command::ScaleDown) => self.scale_down().await,
                },
                ev = self.worker_rx.recv() => {
                    if let Some(ev) = ev {
                        self.on_worker_event(ev).await;
                    }
                }
                _ = tick.tick() => self.idle_tick().await,
            }
        }
    }

    // ---------------------------
    // Worker events
    // ---------------------------

    async fn on_worker_event(&mut self, ev: WorkerEvent) {
        match ev {
            WorkerEvent::Ready(id) => self.note_ready(id).await,
            WorkerEvent::Exited { id, code } => self.on_worker_exit(id, code).await,
        }
    }

    /// Applies a readiness signal (in-band token or probe).
    async fn note_ready(&mut self, id: WorkerId) {
        if self.registry.mark_ready(id).await {
            self.ready_warned.remove(&id);
            self.bus
                .publish(Event::now(EventKind::WorkerReady).with_worker(id));
        }
    }

    /// Disposition of an observed exit depends on what is in progress:
    /// expected during a transition (the protocol sees the removal as its
    /// completion signal), respawned immediately otherwise.
    async fn on_worker_exit(&mut self, id: WorkerId, code: Option<i32>) {
        let Some(info) = self.registry.remove(id).await else {
            // Already force-killed and removed; late exit report.
            return;
        };
        self.procs.remove(&id);
        self.ready_warned.remove(&id);

        let mut ev = Event::now(EventKind::WorkerExited)
            .with_worker(id)
            .with_pid(info.pid);
        if let Some(code) = code.filter(|c| *c != 0) {
            ev = ev.with_error(format!("exit code {code}"));
        }
        self.bus.publish(ev);

        if self.shutting_down || self.reloading || self.scaling_down {
            return;
        }
        // Crash restart. A synchronous spawn error is reported inside
        // spawn_worker and waits for the next command.
        let _ = self.spawn_worker().await;
    }

    /// Readiness probing and cold-start deadline warnings while idle.
    async fn idle_tick(&mut self) {
        let starting = self.registry.starting_ids().await;
        if starting.is_empty() {
            return;
        }

        if let Some(url) = self.cfg.ready_url.clone() {
            let outcome = probe::probe(&url, self.cfg.ready_poll).await;
            if outcome.reachable() {
                // The pool shares one accept queue; an HTTP-level response
                // means the accept loop is up for every starting worker.
                for id in starting {
                    self.note_ready(id).await;
                }
            }
        }

        let now = SystemTime::now();
        for info in self.registry.snapshot().await {
            if info.state == WorkerState::Starting
                && !self.ready_warned.contains(&info.id)
                && now.duration_since(info.started_at).unwrap_or_default()
                    >= self.cfg.ready_timeout
            {
                self.ready_warned.insert(info.id);
                self.bus.publish(
                    Event::now(EventKind::ReadyTimeout)
                        .with_worker(info.id)
                        .with_timeout(self.cfg.ready_timeout),
                );
            }
        }
    }

    // ---------------------------
    // Spawning
    // ---------------------------

    /// Forks one worker and records it as `starting`.
    async fn spawn_worker(&mut self) -> Result<WorkerId, RuntimeError> {
        let id = self.next_id;
        self.next_id += 1;

        match self.spawner.spawn(id, self.worker_tx.clone()).await {
            Ok(proc) => {
                let pid = proc.pid();
                self.registry.insert(id, pid, SystemTime::now()).await;
                self.procs.insert(id, proc);
                self.bus.publish(
                    Event::now(EventKind::WorkerForked)
                        .with_worker(id)
                        .with_pid(pid),
                );
                Ok(id)
            }
            Err(err) => {
                self.bus
                    .publish(Event::now(EventKind::SpawnFailed).with_error(err.to_string()));
                Err(err)
            }
        }
    }

    // ---------------------------
    // Lifecycle transitions
    // ---------------------------

    /// Rolling reload: replace every worker present at entry, one at a time,
    /// each replacement fully ready before its predecessor drains.
    async fn reload(&mut self) {
        if self.reloading || self.scaling_down || self.shutting_down {
            self.reject(Command::Reload, "transition in progress");
            return;
        }
        self.reloading = true;
        self.bus.publish(Event::now(EventKind::ReloadStarted));

        let snapshot = self.registry.ids().await;
        for old_id in snapshot {
            if self.shutting_down {
                break;
            }
            // The old worker may have died while an earlier step ran.
            if !self.registry.contains(old_id).await {
                continue;
            }

            let new_id = match self.spawn_worker().await {
                Ok(id) => id,
                Err(_) => break,
            };

            match self.wait_ready(new_id).await {
                ReadyWait::Ready => self.retire(old_id).await,
                ReadyWait::Failed => {
                    if self.registry.contains(new_id).await {
                        self.kill_and_remove(new_id).await;
                    }
                    self.bus.publish(
                        Event::now(EventKind::ReloadStepAborted)
                            .with_worker(new_id)
                            .with_error("replacement not ready"),
                    );
                }
                // The replacement stays; shutdown will drain it with the rest.
                ReadyWait::Interrupted => break,
            }
        }

        self.bus.publish(Event::now(EventKind::ReloadFinished));
        self.reloading = false;
    }

    /// Appends one worker. Forbidden during shutdown.
    async fn scale_up(&mut self) {
        if self.shutting_down {
            self.reject(Command::ScaleUp, "shutting down");
            return;
        }
        if let Ok(id) = self.spawn_worker().await {
            self.bus
                .publish(Event::now(EventKind::ScaledUp).with_worker(id));
        }
    }

    /// Retires the oldest worker. Refused below two workers and during any
    /// other transition.
    async fn scale_down(&mut self) {
        if self.reloading || self.scaling_down || self.shutting_down {
            self.reject(Command::ScaleDown, "transition in progress");
            return;
        }
        if self.registry.size().await <= 1 {
            self.reject(Command::ScaleDown, "minimum pool size");
            return;
        }

        self.scaling_down = true;
        if let Some(oldest) = self.registry.oldest().await {
            self.retire(oldest).await;
            // A superseding stop can leave the retire unfinished.
            if !self.registry.contains(oldest).await {
                self.bus
                    .publish(Event::now(EventKind::ScaledDown).with_worker(oldest));
            }
        }
        self.scaling_down = false;
    }

    // ---------------------------
    // Wait primitives
    // ---------------------------

    /// Waits for `id` to reach `ready`, bounded by `ready_timeout`.
    ///
    /// Both readiness sources funnel through the registry state bit: the
    /// in-band token arrives as a worker event, the probe is polled every
    /// `ready_poll`. Worker exits and commands keep being processed; a stop
    /// command interrupts the wait.
    async fn wait_ready(&mut self, id: WorkerId) -> ReadyWait {
        let deadline = Instant::now() + self.cfg.ready_timeout;
        let mut poll = time::interval(self.cfg.ready_poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            match self.registry.state(id).await {
                Some(WorkerState::Ready) => return ReadyWait::Ready,
                None => return ReadyWait::Failed,
                Some(_) => {}
            }
            if self.shutting_down {
                return ReadyWait::Interrupted;
            }

            tokio::select! {
                cmd = self.control_rx.recv(), if self.control_open => {
                    self.on_transition_command(cmd);
                }
                ev = self.worker_rx.recv() => {
                    if let Some(ev) = ev {
                        self.on_worker_event(ev).await;
                    }
                }
                _ = poll.tick() => self.probe_ready(id).await,
                _ = time::sleep_until(deadline) => return ReadyWait::Failed,
            }
        }
    }

    /// Single probe shot against the readiness URL, crediting `id`.
    async fn probe_ready(&mut self, id: WorkerId) {
        let Some(url) = self.cfg.ready_url.clone() else {
            return;
        };
        let outcome = probe::probe(&url, self.cfg.ready_poll).await;
        if outcome.reachable() {
            self.note_ready(id).await;
        }
    }

    /// Retires one worker: mark draining, send the shutdown token, wait up
    /// to `grace` for its exit, force-kill on expiry.
    async fn retire(&mut self, id: WorkerId) {
        if self.registry.mark_draining(id).await {
            self.bus
                .publish(Event::now(EventKind::WorkerDraining).with_worker(id));
        }
        if let Some(proc) = self.procs.get_mut(&id) {
            proc.request_drain().await;
        }

        let deadline = Instant::now() + self.cfg.grace;
        loop {
            if !self.registry.contains(id).await {
                return;
            }
            if self.shutting_down {
                // The global shutdown drains everyone, this one included.
                return;
            }

            tokio::select! {
                cmd = self.control_rx.recv(), if self.control_open => {
                    self.on_transition_command(cmd);
                }
                ev = self.worker_rx.recv() => {
                    if let Some(ev) = ev {
                        self.on_worker_event(ev).await;
                    }
                }
                _ = time::sleep_until(deadline) => {
                    self.bus.publish(
                        Event::now(EventKind::DrainTimeout)
                            .with_worker(id)
                            .with_timeout(self.cfg.grace),
                    );
                    self.kill_and_remove(id).await;
                    return;
                }
            }
        }
    }

    /// Command disposition while a transition is waiting: stop supersedes,
    /// everything else is rejected without state change.
    fn on_transition_command(&mut self, cmd: Option<Command>) {
        match cmd {
            Some(Command::Stop) => self.shutting_down = true,
            None => {
                self.control_open = false;
                self.shutting_down = true;
            }
            Some(other) => self.reject(other, "transition in progress"),
        }
    }

    /// Force-kills a worker and removes it from the registry. A late exit
    /// report for the pid is ignored by `on_worker_exit`.
    async fn kill_and_remove(&mut self, id: WorkerId) {
        if let Some(proc) = self.procs.remove(&id) {
            proc.force_kill();
        }
        self.ready_warned.remove(&id);
        if let Some(info) = self.registry.remove(id).await {
            self.bus.publish(
                Event::now(EventKind::WorkerExited)
                    .with_worker(id)
                    .with_pid(info.pid)
                    .with_error("force-killed"),
            );
        }
    }

    fn reject(&self, cmd: Command, reason: &str) {
        self.bus.publish(
            Event::now(EventKind::CommandRejected)
                .with_command(cmd.as_str())
                .with_error(reason),
        );
    }

    // ---------------------------
    // Shutdown
    // ---------------------------

    /// Graceful termination: drain every worker, bounded by one global
    /// grace timer. Terminal: no spawns happen past this point.
    async fn shutdown_protocol(&mut self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::now(EventKind::ShutdownRequested));

        for id in self.registry.ids().await {
            if self.registry.mark_draining(id).await {
                self.bus
                    .publish(Event::now(EventKind::WorkerDraining).with_worker(id));
            }
            if let Some(proc) = self.procs.get_mut(&id) {
                proc.request_drain().await;
            }
        }

        let deadline = Instant::now() + self.cfg.grace;
        loop {
            if self.registry.is_empty().await {
                self.bus.publish(Event::now(EventKind::AllStoppedWithin));
                return Ok(());
            }

            tokio::select! {
                cmd = self.control_rx.recv(), if self.control_open => match cmd {
                    // Repeated stops are one stop.
                    Some(Command::Stop) => {}
                    None => self.control_open = false,
                    Some(other) => self.reject(other, "shutting down"),
                },
                ev = self.worker_rx.recv() => {
                    if let Some(ev) = ev {
                        self.on_worker_event(ev).await;
                    }
                }
                _ = time::sleep_until(deadline) => {
                    let stuck = self.registry.ids().await;
                    for id in &stuck {
                        self.kill_and_remove(*id).await;
                    }
                    self.bus.publish(
                        Event::now(EventKind::GraceExceeded).with_timeout(self.cfg.grace),
                    );
                    return Err(RuntimeError::GraceExceeded {
                        grace: self.cfg.grace,
                        stuck,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as StdHashMap;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn test_cfg(workers: usize) -> Config {
        Config {
            workers,
            grace: ms(500),
            ready_timeout: ms(300),
            ready_poll: ms(20),
            ready_url: None,
            health_url: None,
            health_interval: ms(1_000),
            health_threshold: 3,
            ipc_port: 0,
            bus_capacity: 256,
        }
    }

    /// In-process stand-in for worker processes. Emits the ready token for
    /// the first `ready_limit` spawns and honors drain requests unless told
    /// not to; tests can inject crashes through the stored event senders.
    struct FakeSpawner {
        ready_limit: usize,
        drain_responds: bool,
        pids: AtomicU32,
        spawns: AtomicUsize,
        senders: StdMutex<StdHashMap<WorkerId, mpsc::Sender<WorkerEvent>>>,
    }

    impl FakeSpawner {
        fn auto_ready() -> Arc<Self> {
            Arc::new(Self {
                ready_limit: usize::MAX,
                drain_responds: true,
                pids: AtomicU32::new(1000),
                spawns: AtomicUsize::new(0),
                senders: StdMutex::new(StdHashMap::new()),
            })
        }

        fn ready_for_first(n: usize) -> Arc<Self> {
            Arc::new(Self {
                ready_limit: n,
                drain_responds: true,
                pids: AtomicU32::new(1000),
                spawns: AtomicUsize::new(0),
                senders: StdMutex::new(StdHashMap::new()),
            })
        }

        fn ignoring_drain() -> Arc<Self> {
            Arc::new(Self {
                ready_limit: usize::MAX,
                drain_responds: false,
                pids: AtomicU32::new(1000),
                spawns: AtomicUsize::new(0),
                senders: StdMutex::new(StdHashMap::new()),
            })
        }

        async fn crash(&self, id: WorkerId) {
            let sender = self
                .senders
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .expect("unknown worker id");
            let _ = sender.send(WorkerEvent::Exited { id, code: Some(1) }).await;
        }
    }

    #[async_trait]
    impl Spawn for FakeSpawner {
        async fn spawn(
            &self,
            id: WorkerId,
            events: mpsc::Sender<WorkerEvent>,
        ) -> Result<Box<dyn WorkerProc>, RuntimeError> {
            let nth = self.spawns.fetch_add(1, Ordering::SeqCst);
            let pid = self.pids.fetch_add(1, Ordering::SeqCst);
            self.senders.lock().unwrap().insert(id, events.clone());

            if nth < self.ready_limit {
                let ready_tx = events.clone();
                tokio::spawn(async move {
                    let _ = ready_tx.send(WorkerEvent::Ready(id)).await;
                });
            }

            Ok(Box::new(FakeWorker {
                id,
                pid,
                drain_responds: self.drain_responds,
                events,
            }))
        }
    }

    struct FakeWorker {
        id: WorkerId,
        pid: u32,
        drain_responds: bool,
        events: mpsc::Sender<WorkerEvent>,
    }

    #[async_trait]
    impl WorkerProc for FakeWorker {
        fn pid(&self) -> u32 {
            self.pid
        }

        async fn request_drain(&mut self) {
            if self.drain_responds {
                let _ = self
                    .events
                    .send(WorkerEvent::Exited {
                        id: self.id,
                        code: Some(0),
                    })
                    .await;
            }
        }

        fn force_kill(&self) {}
    }

    fn collect_events(bus: &Bus) -> Arc<StdMutex<Vec<Event>>> {
        let store = Arc::new(StdMutex::new(Vec::new()));
        let mut rx = bus.subscribe();
        let sink = Arc::clone(&store);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => sink.lock().unwrap().push(ev),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        store
    }

    async fn wait_until<F, Fut>(mut cond: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..400 {
            if cond().await {
                return;
            }
            time::sleep(ms(10)).await;
        }
        panic!("condition not met within deadline");
    }

    fn start(
        cfg: Config,
        spawner: Arc<FakeSpawner>,
    ) -> (
        Arc<WorkerRegistry>,
        Bus,
        ControlHandle,
        tokio::task::JoinHandle<Result<(), RuntimeError>>,
    ) {
        let (mut sup, handle) = Supervisor::new(
            cfg,
            PathBuf::from("./fake-app"),
            spawner,
            Vec::new(),
        );
        let registry = sup.registry();
        let bus = sup.bus();
        let task = tokio::spawn(async move { sup.run().await });
        (registry, bus, handle, task)
    }

    async fn all_ready(registry: &WorkerRegistry, n: usize) -> bool {
        let snap = registry.snapshot().await;
        snap.len() == n && snap.iter().all(|w| w.state == WorkerState::Ready)
    }

    #[tokio::test]
    async fn initial_fill_brings_pool_to_target() {
        let (registry, _bus, _handle, _task) = start(test_cfg(2), FakeSpawner::auto_ready());

        wait_until(|| all_ready(&registry, 2)).await;
        assert_eq!(registry.ids().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn crash_restart_replaces_worker_with_fresh_id() {
        let spawner = FakeSpawner::auto_ready();
        let (registry, _bus, _handle, _task) = start(test_cfg(2), spawner.clone());
        wait_until(|| all_ready(&registry, 2)).await;

        spawner.crash(1).await;

        wait_until(|| all_ready(&registry, 2)).await;
        wait_until(|| async { registry.ids().await == vec![2, 3] }).await;
    }

    #[tokio::test]
    async fn rolling_reload_replaces_pool_without_dropping_capacity() {
        let spawner = FakeSpawner::auto_ready();
        let (registry, bus, handle, _task) = start(test_cfg(2), spawner);
        wait_until(|| all_ready(&registry, 2)).await;

        let events = collect_events(&bus);
        handle.send(Command::Reload).await.unwrap();

        wait_until(|| async { registry.ids().await == vec![3, 4] }).await;
        wait_until(|| all_ready(&registry, 2)).await;

        // Replacement-then-retire: each fork precedes the predecessor's exit.
        let seq_of = |kind: EventKind, id: WorkerId| {
            events
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.kind == kind && e.worker == Some(id))
                .map(|e| e.seq)
                .unwrap_or_else(|| panic!("missing event {kind:?} for {id}"))
        };
        assert!(seq_of(EventKind::WorkerForked, 3) < seq_of(EventKind::WorkerExited, 1));
        assert!(seq_of(EventKind::WorkerExited, 1) < seq_of(EventKind::WorkerForked, 4));
        assert!(seq_of(EventKind::WorkerForked, 4) < seq_of(EventKind::WorkerExited, 2));
    }

    #[tokio::test]
    async fn reload_with_unready_replacement_keeps_old_pool() {
        // First two spawns (the initial fill) get ready; replacements never do.
        let spawner = FakeSpawner::ready_for_first(2);
        let (registry, bus, handle, _task) = start(test_cfg(2), spawner);
        wait_until(|| all_ready(&registry, 2)).await;

        let events = collect_events(&bus);
        handle.send(Command::Reload).await.unwrap();

        wait_until(|| async {
            events
                .lock()
                .unwrap()
                .iter()
                .any(|e| e.kind == EventKind::ReloadFinished)
        })
        .await;

        assert_eq!(registry.ids().await, vec![1, 2], "old workers survive");
        let aborted = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == EventKind::ReloadStepAborted)
            .count();
        assert_eq!(aborted, 2, "one abort per reload step");
    }

    #[tokio::test]
    async fn scale_up_and_down_adjust_the_pool() {
        let (registry, _bus, handle, _task) = start(test_cfg(2), FakeSpawner::auto_ready());
        wait_until(|| all_ready(&registry, 2)).await;

        handle.send(Command::ScaleUp).await.unwrap();
        wait_until(|| all_ready(&registry, 3)).await;
        assert_eq!(registry.ids().await, vec![1, 2, 3]);

        handle.send(Command::ScaleDown).await.unwrap();
        wait_until(|| async { registry.ids().await == vec![2, 3] }).await;
    }

    #[tokio::test]
    async fn scale_down_refused_at_minimum_pool() {
        let (registry, bus, handle, _task) = start(test_cfg(1), FakeSpawner::auto_ready());
        wait_until(|| all_ready(&registry, 1)).await;

        let events = collect_events(&bus);
        handle.send(Command::ScaleDown).await.unwrap();

        wait_until(|| async {
            events
                .lock()
                .unwrap()
                .iter()
                .any(|e| e.kind == EventKind::CommandRejected)
        })
        .await;
        assert_eq!(registry.ids().await, vec![1], "registry unchanged");
    }

    #[tokio::test]
    async fn repeated_stop_has_the_effect_of_one() {
        let (registry, _bus, handle, task) = start(test_cfg(2), FakeSpawner::auto_ready());
        wait_until(|| all_ready(&registry, 2)).await;

        handle.send(Command::Stop).await.unwrap();
        // The second stop may race shutdown completion; it must be harmless
        // either way.
        let _ = handle.send(Command::Stop).await;

        let res = time::timeout(ms(2_000), task).await.unwrap().unwrap();
        assert!(res.is_ok());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn stop_supersedes_an_in_flight_reload() {
        // Replacements never become ready, so the reload would sit in its
        // readiness wait for the full deadline without the stop.
        let mut cfg = test_cfg(2);
        cfg.ready_timeout = ms(5_000);
        let spawner = FakeSpawner::ready_for_first(2);
        let (registry, bus, handle, task) = start(cfg, spawner);
        wait_until(|| all_ready(&registry, 2)).await;

        let events = collect_events(&bus);
        handle.send(Command::Reload).await.unwrap();
        time::sleep(ms(50)).await;
        handle.send(Command::Stop).await.unwrap();

        let res = time::timeout(ms(2_000), task).await.unwrap().unwrap();
        assert!(res.is_ok());
        assert!(registry.is_empty().await);

        // Only the first replacement was forked before the stop landed.
        let forks = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == EventKind::WorkerForked)
            .count();
        assert_eq!(forks, 3, "initial pair plus a single replacement");
    }

    #[tokio::test]
    async fn grace_expiry_force_kills_and_reports_failure() {
        let mut cfg = test_cfg(2);
        cfg.grace = ms(150);
        let (registry, _bus, handle, task) = start(cfg, FakeSpawner::ignoring_drain());
        wait_until(|| all_ready(&registry, 2)).await;

        handle.send(Command::Stop).await.unwrap();

        let res = time::timeout(ms(2_000), task).await.unwrap().unwrap();
        match res {
            Err(RuntimeError::GraceExceeded { stuck, .. }) => {
                assert_eq!(stuck, vec![1, 2]);
            }
            other => panic!("expected GraceExceeded, got {other:?}"),
        }
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn commands_during_reload_are_rejected_without_state_change() {
        let mut cfg = test_cfg(2);
        cfg.ready_timeout = ms(400);
        // Replacements stall in starting so the reload holds its wait.
        let spawner = FakeSpawner::ready_for_first(2);
        let (registry, bus, handle, _task) = start(cfg, spawner);
        wait_until(|| all_ready(&registry, 2)).await;

        let events = collect_events(&bus);
        handle.send(Command::Reload).await.unwrap();
        time::sleep(ms(50)).await;
        handle.send(Command::ScaleDown).await.unwrap();

        wait_until(|| async {
            events.lock().unwrap().iter().any(|e| {
                e.kind == EventKind::CommandRejected
                    && e.command.as_deref() == Some("scale-down")
            })
        })
        .await;

        wait_until(|| async {
            events
                .lock()
                .unwrap()
                .iter()
                .any(|e| e.kind == EventKind::ReloadFinished)
        })
        .await;
        assert_eq!(registry.ids().await, vec![1, 2]);
    }
}
