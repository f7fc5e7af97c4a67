//! System scheduler: graph construction and fork-join ticking.
//!
//! The scheduler owns every registered system. Registration inserts the
//! system into the [`TaskGraph`] so that it runs after every earlier system
//! it conflicts with; ticking dispatches that graph on the worker pool and
//! blocks until the End sentinel is reached.
//!
//! Systems are moved into the scheduler on registration and never handed
//! back, so their lifecycle hooks can only be driven from here. Callers see
//! [`SystemInfo`] snapshots instead.

use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;

use tracing::{debug, info, warn};

use engine_component::Archetype;
use engine_system::{System, TickContext};

use crate::config::SchedulerConfig;
use crate::dispatch::DispatchPlan;
use crate::error::SchedulerError;
use crate::graph::{GraphSnapshot, SystemHandle, Task, TaskGraph, TaskId};
use crate::pool::{RayonPool, ThreadPool};

/// Public view of a registered system.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemInfo {
    /// Registration handle.
    pub handle: SystemHandle,
    /// The system's name.
    pub name: String,
    /// The system's declared access.
    pub archetype: Archetype,
    /// The task wrapping the system.
    pub task: TaskId,
}

/// Builds the task graph from registered systems and runs it every tick.
pub struct Scheduler {
    config: SchedulerConfig,
    pool: Arc<dyn ThreadPool>,
    graph: TaskGraph,
    systems: Vec<Arc<dyn System>>,
    tasks: Vec<TaskId>,
    /// Runnable form of `graph`, rebuilt after registration.
    plan: Option<Arc<DispatchPlan>>,
    tick_id: u64,
    poisoned: bool,
    shut_down: bool,
}

impl Scheduler {
    /// Create a scheduler with its own rayon worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Pool`] if the worker threads cannot be spawned.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let pool = RayonPool::new(config.worker_threads)?;
        Ok(Self::with_pool(config, Arc::new(pool)))
    }

    /// Create a scheduler that submits work to `pool`.
    #[must_use]
    pub fn with_pool(config: SchedulerConfig, pool: Arc<dyn ThreadPool>) -> Self {
        info!(
            workers = pool.worker_count(),
            stall_timeout_ms = config.stall_timeout.map(|t| t.as_millis() as u64),
            "scheduler created"
        );
        Self {
            config,
            pool,
            graph: TaskGraph::new(),
            systems: Vec::new(),
            tasks: Vec::new(),
            plan: None,
            tick_id: 0,
            poisoned: false,
            shut_down: false,
        }
    }

    /// Register a system, link it into the graph and initialize it.
    pub fn register_system<S: System + 'static>(&mut self, system: S) -> SystemHandle {
        self.register_boxed(Box::new(system))
    }

    /// Register an already boxed system.
    ///
    /// The system is stored before its `initialize` hook runs, so a panicking
    /// hook still leaves the handle, task and system in step.
    pub fn register_boxed(&mut self, system: Box<dyn System>) -> SystemHandle {
        let handle = SystemHandle(self.systems.len());
        let name = system.name().to_string();
        let archetype = system.archetype();

        let (task, parents) = self.graph.insert(handle, name.clone(), archetype.clone());
        info!(
            system = %name,
            task = task.index(),
            archetype = %archetype,
            parents = ?parents.iter().map(|p| p.index()).collect::<Vec<_>>(),
            "registered system"
        );

        self.systems.push(Arc::from(system));
        self.tasks.push(task);
        self.plan = None;

        // Freshly stored, so nothing else holds this Arc yet.
        if let Some(system) = self.systems.last_mut().and_then(Arc::get_mut) {
            system.initialize();
        }
        handle
    }

    /// Run every system once, respecting the graph, and block until all of
    /// them have finished.
    ///
    /// Returns immediately when no system is registered.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::SystemPanicked`] if a system panicked; the
    ///   scheduler is poisoned afterwards.
    /// - [`SchedulerError::Stalled`] if the configured stall timeout expired;
    ///   the scheduler is poisoned afterwards.
    /// - [`SchedulerError::Poisoned`] / [`SchedulerError::ShutDown`] if the
    ///   scheduler can no longer tick.
    pub fn tick(&mut self, delta_time: f64) -> Result<(), SchedulerError> {
        if self.shut_down {
            return Err(SchedulerError::ShutDown);
        }
        if self.poisoned {
            return Err(SchedulerError::Poisoned);
        }
        if self.graph.is_trivial() {
            return Ok(());
        }

        self.tick_id += 1;
        let tick_id = self.tick_id;
        let ctx = TickContext::new(tick_id, delta_time);

        let plan = match &self.plan {
            Some(plan) => Arc::clone(plan),
            None => {
                let plan = Arc::new(DispatchPlan::build(
                    &self.graph,
                    &self.systems,
                    Arc::clone(&self.pool),
                ));
                self.plan = Some(Arc::clone(&plan));
                plan
            }
        };

        debug!(tick_id, delta_time, tasks = plan.len(), "tick start");
        let receiver = DispatchPlan::dispatch(&plan, ctx);

        let outcome = match self.config.stall_timeout {
            Some(timeout) => receiver.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => SchedulerError::Stalled { tick_id, timeout },
                RecvTimeoutError::Disconnected => SchedulerError::Disconnected { tick_id },
            }),
            None => receiver
                .recv()
                .map_err(|_| SchedulerError::Disconnected { tick_id }),
        };

        let result = match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(panic)) => Err(SchedulerError::SystemPanicked {
                system: panic.system,
                tick_id,
                message: panic.message,
            }),
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => debug!(tick_id, "tick complete"),
            Err(e) => {
                warn!(tick_id, error = %e, "tick failed; scheduler poisoned");
                self.poisoned = true;
            }
        }
        result
    }

    /// Call every system's shutdown hook, in registration order.
    ///
    /// A poisoned scheduler skips the hooks, since tasks of the failed tick
    /// may still be running. Later calls do nothing; later ticks fail with
    /// [`SchedulerError::ShutDown`].
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        if self.poisoned {
            warn!(
                systems = self.systems.len(),
                "scheduler poisoned; skipping system shutdown hooks"
            );
            self.plan = None;
            return;
        }
        for system in &self.systems {
            debug!(system = system.name(), "shutting down system");
            system.shutdown();
        }
        self.plan = None;
        info!(systems = self.systems.len(), ticks = self.tick_id, "scheduler shut down");
    }

    /// Registered systems in registration order.
    #[must_use]
    pub fn systems(&self) -> Vec<SystemInfo> {
        (0..self.systems.len())
            .filter_map(|i| self.system(SystemHandle(i)))
            .collect()
    }

    /// Look up one registered system.
    #[must_use]
    pub fn system(&self, handle: SystemHandle) -> Option<SystemInfo> {
        let task = *self.tasks.get(handle.index())?;
        let node = self.graph.task(task)?;
        Some(SystemInfo {
            handle,
            name: node.label().to_string(),
            archetype: node.archetype().clone(),
            task,
        })
    }

    /// Visit every task reachable from Start, breadth-first, once each.
    pub fn for_each_task<F>(&self, callback: F)
    where
        F: FnMut(&Task),
    {
        self.graph.for_each_task(callback);
    }

    /// Visit every task reachable from `start`, breadth-first, once each.
    pub fn for_each_task_from<F>(&self, start: TaskId, callback: F)
    where
        F: FnMut(&Task),
    {
        self.graph.for_each_task_from(start, callback);
    }

    /// Total number of tasks, including Start and End.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.graph.len()
    }

    /// The task graph.
    #[must_use]
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// A serialisable copy of the task graph.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        self.graph.snapshot()
    }

    /// The task graph in Graphviz DOT format.
    #[must_use]
    pub fn to_dot(&self) -> String {
        self.graph.to_dot()
    }

    /// Number of ticks dispatched so far.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Returns `true` once a tick has failed.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("workers", &self.pool.worker_count())
            .field("tasks", &self.graph.len())
            .field("tick_id", &self.tick_id)
            .field("poisoned", &self.poisoned)
            .field("shut_down", &self.shut_down)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use engine_component::{Component, QualifiedComponentType};
    use engine_system::{FnSystem, SystemConfig};

    use super::*;
    use crate::pool::Job;

    struct Position;
    struct Health;

    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    /// Counts submissions before handing them to a real pool.
    struct CountingPool {
        inner: RayonPool,
        submitted: AtomicUsize,
    }

    impl ThreadPool for CountingPool {
        fn submit(&self, job: Job) {
            self.submitted.fetch_add(1, Ordering::SeqCst);
            self.inner.submit(job);
        }

        fn worker_count(&self) -> usize {
            self.inner.worker_count()
        }
    }

    fn counting_pool() -> Arc<CountingPool> {
        Arc::new(CountingPool {
            inner: RayonPool::new(4).unwrap(),
            submitted: AtomicUsize::new(0),
        })
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(SchedulerConfig::default().with_worker_threads(4)).unwrap()
    }

    fn noop(
        name: &str,
        archetype: Archetype,
    ) -> FnSystem<impl Fn(&TickContext) + Send + Sync + 'static> {
        FnSystem::new(SystemConfig::new(name, archetype), |_| {})
    }

    /// A system that records lifecycle calls.
    struct Tracked {
        name: &'static str,
        archetype: Archetype,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl System for Tracked {
        fn name(&self) -> &str {
            self.name
        }

        fn archetype(&self) -> Archetype {
            self.archetype.clone()
        }

        fn initialize(&mut self) {
            self.log.lock().unwrap().push(format!("init {}", self.name));
        }

        fn tick(&self, ctx: &TickContext) {
            self.log
                .lock()
                .unwrap()
                .push(format!("tick {} {}", self.name, ctx.tick_id));
        }

        fn shutdown(&self) {
            self.log.lock().unwrap().push(format!("shutdown {}", self.name));
        }
    }

    #[test]
    fn test_task_count_is_systems_plus_two() {
        let mut scheduler = scheduler();
        assert_eq!(scheduler.task_count(), 2);
        for i in 0..5 {
            let component = QualifiedComponentType::named(format!("C{}", i % 2), i % 3 == 0);
            let archetype = Archetype::new().with(component);
            scheduler.register_system(noop("s", archetype));
        }
        assert_eq!(scheduler.task_count(), 7);

        let mut visited = 0;
        scheduler.for_each_task_from(TaskId::START, |task| {
            if task.id() != TaskId::START {
                visited += 1;
            }
        });
        assert_eq!(visited, 6);
    }

    #[test]
    fn test_readers_are_siblings_under_start() {
        let mut scheduler = scheduler();
        let s1 = scheduler.register_system(noop("s1", Archetype::new().read::<Position>()));
        let s2 = scheduler.register_system(noop("s2", Archetype::new().read::<Position>()));

        let t1 = scheduler.system(s1).unwrap().task;
        let t2 = scheduler.system(s2).unwrap().task;
        let graph = scheduler.graph();
        assert_eq!(graph.task(t1).unwrap().parents(), &[TaskId::START]);
        assert_eq!(graph.task(t2).unwrap().parents(), &[TaskId::START]);
        assert!(!graph.reaches(t1, t2) && !graph.reaches(t2, t1));
    }

    #[test]
    fn test_writer_waits_for_reader() {
        let mut scheduler = scheduler();
        let reader = scheduler.register_system(noop("reader", Archetype::new().read::<Position>()));
        let writer =
            scheduler.register_system(noop("writer", Archetype::new().write::<Position>()));

        let t_reader = scheduler.system(reader).unwrap().task;
        let t_writer = scheduler.system(writer).unwrap().task;
        assert!(scheduler.graph().task(t_reader).unwrap().children().contains(&t_writer));
    }

    #[test]
    fn test_health_writers_serialized_before_reader() {
        let mut scheduler = scheduler();
        let s1 = scheduler.register_system(noop("s1", Archetype::new().write::<Health>()));
        let s2 = scheduler.register_system(noop("s2", Archetype::new().write::<Health>()));
        let s3 = scheduler.register_system(noop("s3", Archetype::new().read::<Health>()));

        let [t1, t2, t3] = [s1, s2, s3].map(|h| scheduler.system(h).unwrap().task);
        let graph = scheduler.graph();
        assert!(graph.reaches(t1, t2));
        assert!(graph.reaches(t1, t3));
        assert!(graph.reaches(t2, t3));
    }

    #[test]
    fn test_empty_tick_does_not_touch_pool() {
        let pool = counting_pool();
        let mut scheduler = Scheduler::with_pool(SchedulerConfig::default(), pool.clone());
        scheduler.tick(0.016).unwrap();
        assert_eq!(pool.submitted.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.tick_id(), 0);
    }

    #[test]
    fn test_each_task_submitted_once_per_tick() {
        let pool = counting_pool();
        let mut scheduler = Scheduler::with_pool(SchedulerConfig::default(), pool.clone());
        scheduler.register_system(noop("a", Archetype::new().write::<Health>()));
        scheduler.register_system(noop("b", Archetype::new().read::<Health>()));
        scheduler.register_system(noop("c", Archetype::new().read::<Position>()));

        scheduler.tick(0.016).unwrap();
        scheduler.tick(0.016).unwrap();
        assert_eq!(pool.submitted.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_lifecycle_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = scheduler();
        for name in ["a", "b"] {
            scheduler.register_system(Tracked {
                name,
                archetype: Archetype::new().write::<Health>(),
                log: Arc::clone(&log),
            });
        }

        scheduler.tick(0.5).unwrap();
        scheduler.shutdown();
        scheduler.shutdown();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["init a", "init b", "tick a 1", "tick b 1", "shutdown a", "shutdown b"]
        );
        assert!(matches!(scheduler.tick(0.5), Err(SchedulerError::ShutDown)));
    }

    /// A system whose `initialize` hook panics.
    struct FailsToInitialize;

    impl System for FailsToInitialize {
        fn name(&self) -> &str {
            "fails_to_initialize"
        }

        fn archetype(&self) -> Archetype {
            Archetype::new().write::<Health>()
        }

        fn initialize(&mut self) {
            panic!("no config");
        }

        fn tick(&self, _ctx: &TickContext) {}
    }

    #[test]
    fn test_panicking_initialize_keeps_handles_distinct() {
        let mut scheduler = scheduler();
        let registered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            scheduler.register_system(FailsToInitialize)
        }));
        assert!(registered.is_err());

        let next = scheduler.register_system(noop("next", Archetype::new().read::<Health>()));
        assert_eq!(next, SystemHandle(1));

        let systems = scheduler.systems();
        assert_eq!(systems.len(), 2);
        assert_eq!(systems[0].name, "fails_to_initialize");
        assert_eq!(systems[1].name, "next");
        assert_ne!(systems[0].task, systems[1].task);
        assert_eq!(scheduler.task_count(), 4);
        scheduler.tick(0.016).unwrap();
    }

    #[test]
    fn test_shutdown_after_failed_tick_skips_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = scheduler();
        scheduler.register_system(Tracked {
            name: "tracked",
            archetype: Archetype::new().write::<Health>(),
            log: Arc::clone(&log),
        });
        scheduler.register_system(FnSystem::new(
            SystemConfig::new("broken", Archetype::new().read::<Health>()),
            |_| panic!("bad data"),
        ));

        assert!(scheduler.tick(0.016).is_err());
        scheduler.shutdown();

        assert_eq!(*log.lock().unwrap(), vec!["init tracked", "tick tracked 1"]);
        assert!(matches!(scheduler.tick(0.016), Err(SchedulerError::ShutDown)));
    }

    #[test]
    fn test_conflicting_systems_never_overlap() {
        let mut scheduler = scheduler();
        let running = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));

        for name in ["w1", "w2", "w3", "w4"] {
            let running = Arc::clone(&running);
            let overlapped = Arc::clone(&overlapped);
            scheduler.register_system(FnSystem::new(
                SystemConfig::new(name, Archetype::new().write::<Health>()),
                move |_| {
                    if running.swap(true, Ordering::SeqCst) {
                        overlapped.store(true, Ordering::SeqCst);
                    }
                    std::thread::sleep(Duration::from_millis(2));
                    running.store(false, Ordering::SeqCst);
                },
            ));
        }
        // Readers of an unrelated component fan out alongside.
        for name in ["r1", "r2", "r3"] {
            scheduler.register_system(noop(name, Archetype::new().read::<Position>()));
        }

        for _ in 0..10 {
            scheduler.tick(0.016).unwrap();
        }
        assert!(!overlapped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_readers_run_concurrently() {
        let config = SchedulerConfig::default().with_worker_threads(2);
        let mut scheduler = Scheduler::new(config).unwrap();
        let barrier = Arc::new(std::sync::Barrier::new(2));
        for name in ["r1", "r2"] {
            let barrier = Arc::clone(&barrier);
            scheduler.register_system(FnSystem::new(
                SystemConfig::new(name, Archetype::new().read::<Position>()),
                move |_| {
                    // Deadlocks unless both readers are in flight together.
                    barrier.wait();
                },
            ));
        }
        scheduler.tick(0.016).unwrap();
    }

    #[test]
    fn test_panicking_system_poisons_scheduler() {
        let mut scheduler = scheduler();
        scheduler.register_system(noop("fine", Archetype::new().write::<Health>()));
        scheduler.register_system(FnSystem::new(
            SystemConfig::new("broken", Archetype::new().read::<Health>()),
            |_| panic!("bad data"),
        ));

        match scheduler.tick(0.016) {
            Err(SchedulerError::SystemPanicked { system, tick_id, message }) => {
                assert_eq!(system, "broken");
                assert_eq!(tick_id, 1);
                assert_eq!(message, "bad data");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(scheduler.is_poisoned());
        assert!(matches!(scheduler.tick(0.016), Err(SchedulerError::Poisoned)));
    }

    #[test]
    fn test_stall_timeout() {
        let config = SchedulerConfig::default()
            .with_worker_threads(2)
            .with_stall_timeout(Duration::from_millis(20));
        let mut scheduler = Scheduler::new(config).unwrap();
        scheduler.register_system(FnSystem::new(
            SystemConfig::new("slow", Archetype::new().write::<Health>()),
            |_| std::thread::sleep(Duration::from_millis(300)),
        ));

        assert!(matches!(
            scheduler.tick(0.016),
            Err(SchedulerError::Stalled { tick_id: 1, .. })
        ));
        assert!(scheduler.is_poisoned());
    }

    #[test]
    fn test_registration_between_ticks_rebuilds_plan() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut scheduler = scheduler();
        for name in ["a", "b"] {
            let count = Arc::clone(&count);
            scheduler.register_system(FnSystem::new(
                SystemConfig::new(name, Archetype::new().read::<Position>()),
                move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                },
            ));
            scheduler.tick(0.016).unwrap();
        }
        // One system ran on the first tick, two on the second.
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_systems_in_registration_order() {
        let mut scheduler = scheduler();
        scheduler.register_system(noop("physics", Archetype::new().write::<Position>()));
        scheduler.register_system(noop("render", Archetype::new().read::<Position>()));

        let systems = scheduler.systems();
        let names: Vec<&str> = systems.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["physics", "render"]);
        assert_eq!(systems[1].handle, SystemHandle(1));
        assert_eq!(systems[1].archetype, Archetype::new().read::<Position>());
        assert!(scheduler.system(SystemHandle(2)).is_none());
    }
}
