//! Fork-join dispatch of a [`TaskGraph`].
//!
//! A [`DispatchPlan`] is the runnable form of the graph: per task, the system
//! to tick, the children to notify and the number of parents to wait for.
//! Every completed task bumps its children's counters; the task that brings a
//! counter up to the parent count submits that child. When End becomes ready
//! the tick's outcome is sent over a channel that the ticking thread blocks
//! on.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, trace};

use engine_system::{System, TickContext};

use crate::graph::{TaskGraph, TaskId};
use crate::pool::ThreadPool;

/// A system tick that unwound instead of returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TaskPanic {
    pub system: String,
    pub message: String,
}

pub(crate) type TickOutcome = Result<(), TaskPanic>;

struct DispatchNode {
    label: String,
    system: Option<Arc<dyn System>>,
    children: Vec<usize>,
    parent_count: usize,
    completed: AtomicUsize,
}

/// The runnable form of a task graph.
pub(crate) struct DispatchPlan {
    nodes: Vec<DispatchNode>,
    pool: Arc<dyn ThreadPool>,
    done: Mutex<Option<SyncSender<TickOutcome>>>,
}

impl DispatchPlan {
    /// Snapshot `graph`, resolving each task's system handle in `systems`.
    pub fn build(
        graph: &TaskGraph,
        systems: &[Arc<dyn System>],
        pool: Arc<dyn ThreadPool>,
    ) -> Self {
        let nodes = graph
            .tasks()
            .iter()
            .map(|task| DispatchNode {
                label: task.label().to_string(),
                system: task
                    .system()
                    .and_then(|handle| systems.get(handle.index()))
                    .map(Arc::clone),
                children: task.children().iter().map(|c| c.index()).collect(),
                parent_count: task.parents().len(),
                completed: AtomicUsize::new(0),
            })
            .collect();

        Self {
            nodes,
            pool,
            done: Mutex::new(None),
        }
    }

    /// Number of tasks, sentinels included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Reset every counter, submit Start's children and return the channel
    /// End's completion will be reported on.
    ///
    /// The previous dispatch of this plan must have completed.
    pub fn dispatch(plan: &Arc<Self>, ctx: TickContext) -> Receiver<TickOutcome> {
        for node in &plan.nodes {
            node.completed.store(0, Ordering::Relaxed);
        }

        let (tx, rx) = mpsc::sync_channel(1);
        *plan.done.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);

        for &child in &plan.nodes[TaskId::START.index()].children {
            Self::submit(plan, child, ctx);
        }
        rx
    }

    fn submit(plan: &Arc<Self>, index: usize, ctx: TickContext) {
        let job_plan = Arc::clone(plan);
        plan.pool
            .submit(Box::new(move || Self::run(&job_plan, index, ctx)));
    }

    fn run(plan: &Arc<Self>, index: usize, ctx: TickContext) {
        let node = &plan.nodes[index];

        if let Some(system) = &node.system {
            trace!(system = %node.label, tick_id = ctx.tick_id, "system tick");
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| system.tick(&ctx))) {
                let message = panic_message(payload.as_ref());
                error!(
                    system = %node.label,
                    tick_id = ctx.tick_id,
                    %message,
                    "system panicked; dependent tasks will not run"
                );
                plan.finish(Err(TaskPanic {
                    system: node.label.clone(),
                    message,
                }));
                return;
            }
        }

        for &child in &node.children {
            let target = &plan.nodes[child];
            let completed = target.completed.fetch_add(1, Ordering::AcqRel) + 1;
            if completed != target.parent_count {
                continue;
            }
            if child == TaskId::END.index() {
                plan.finish(Ok(()));
            } else {
                Self::submit(plan, child, ctx);
            }
        }
    }

    /// Report the tick's outcome. Only the first report counts.
    fn finish(&self, outcome: TickOutcome) {
        let sender = self
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            // The receiver is gone only if the ticking thread already gave up.
            let _ = sender.send(outcome);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use engine_component::{Archetype, QualifiedComponentType};
    use engine_system::{FnSystem, SystemConfig};

    use super::*;
    use crate::graph::SystemHandle;
    use crate::pool::RayonPool;

    fn recording_system(
        name: &'static str,
        archetype: Archetype,
        log: Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn System> {
        Arc::new(FnSystem::new(SystemConfig::new(name, archetype), move |_| {
            log.lock().unwrap().push(name);
        }))
    }

    #[test]
    fn test_dispatch_runs_in_dependency_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let writes = Archetype::new().with(QualifiedComponentType::named("Health", false));

        let mut graph = TaskGraph::new();
        let mut systems = Vec::new();
        for name in ["first", "second", "third"] {
            let handle = SystemHandle(systems.len());
            graph.insert(handle, name, writes.clone());
            systems.push(recording_system(name, writes.clone(), Arc::clone(&log)));
        }

        let pool: Arc<dyn ThreadPool> = Arc::new(RayonPool::new(4).unwrap());
        let plan = Arc::new(DispatchPlan::build(&graph, &systems, pool));
        assert_eq!(plan.len(), 5);

        for tick in 1..=3 {
            let rx = DispatchPlan::dispatch(&plan, TickContext::new(tick, 0.1));
            assert_eq!(rx.recv().unwrap(), Ok(()));
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 9);
        for chunk in log.chunks(3) {
            assert_eq!(chunk, ["first", "second", "third"]);
        }
    }

    #[test]
    fn test_panic_is_reported() {
        let mut graph = TaskGraph::new();
        graph.insert(SystemHandle(0), "boom", Archetype::new());
        let systems: Vec<Arc<dyn System>> = vec![Arc::new(FnSystem::new(
            SystemConfig::new("boom", Archetype::new()),
            |_| panic!("exploded"),
        ))];

        let pool: Arc<dyn ThreadPool> = Arc::new(RayonPool::new(1).unwrap());
        let plan = Arc::new(DispatchPlan::build(&graph, &systems, pool));
        let rx = DispatchPlan::dispatch(&plan, TickContext::new(1, 0.1));
        assert_eq!(
            rx.recv().unwrap(),
            Err(TaskPanic {
                system: "boom".to_string(),
                message: "exploded".to_string(),
            })
        );
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u32), "non-string panic payload");
    }
}
