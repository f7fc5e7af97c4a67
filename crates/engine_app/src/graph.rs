//! Task graph: the DAG the scheduler dispatches every tick.
//!
//! Every registered system becomes one [`Task`]. Two sentinel tasks bracket
//! the graph: [`TaskId::START`] (no parents) and [`TaskId::END`] (no
//! children). Tasks live in an arena and refer to each other by [`TaskId`],
//! so edges stay valid however the arena grows.
//!
//! ## Insertion
//!
//! A new task must run after every existing task it conflicts with (see
//! [`Archetype::can_be_executed_in_parallel_with`]) and should run as early
//! as possible otherwise. Searching from Start, a task is a valid attachment
//! point when none of its descendants conflict with the new task; when a
//! child does conflict, the search descends into that child's subtree. The
//! attachment points are the conflicting tasks with no conflicting
//! descendants, or Start when nothing conflicts. The new task becomes a
//! child of each of them and a parent of End; any `point → End` edge is
//! dropped, since `point → new → End` now covers it.
//!
//! Every conflicting task is an ancestor of at least one attachment point,
//! so any two conflicting tasks end up connected by a directed path.

use std::collections::VecDeque;
use std::fmt::Write as _;

use serde::Serialize;

use engine_component::Archetype;

/// Index of a task in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub usize);

impl TaskId {
    /// The entry sentinel.
    pub const START: TaskId = TaskId(0);
    /// The exit sentinel.
    pub const END: TaskId = TaskId(1);

    /// Returns `true` for Start and End.
    #[must_use]
    pub const fn is_sentinel(self) -> bool {
        self.0 <= Self::END.0
    }

    /// The arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Handle to a registered system, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SystemHandle(pub usize);

impl SystemHandle {
    /// Position in registration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A node of the task graph.
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    system: Option<SystemHandle>,
    label: String,
    archetype: Archetype,
    parents: Vec<TaskId>,
    children: Vec<TaskId>,
}

impl Task {
    fn sentinel(id: TaskId, label: &str) -> Self {
        Self {
            id,
            system: None,
            label: label.to_string(),
            archetype: Archetype::new(),
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    /// This task's id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The wrapped system, `None` for sentinels.
    #[must_use]
    pub fn system(&self) -> Option<SystemHandle> {
        self.system
    }

    /// System name, or `"start"` / `"end"` for sentinels.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The wrapped system's archetype (empty for sentinels).
    #[must_use]
    pub fn archetype(&self) -> &Archetype {
        &self.archetype
    }

    /// Tasks that must finish before this one starts.
    #[must_use]
    pub fn parents(&self) -> &[TaskId] {
        &self.parents
    }

    /// Tasks that wait on this one.
    #[must_use]
    pub fn children(&self) -> &[TaskId] {
        &self.children
    }

    /// Returns `true` if this task and `archetype` may run at the same time.
    /// Sentinels touch no data and are compatible with everything.
    #[must_use]
    pub fn is_compatible_with(&self, archetype: &Archetype) -> bool {
        self.id.is_sentinel() || self.archetype.can_be_executed_in_parallel_with(archetype)
    }
}

/// The arena of tasks plus the insertion algorithm.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: Vec<Task>,
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGraph {
    /// A graph holding only `Start → End`.
    #[must_use]
    pub fn new() -> Self {
        let mut graph = Self {
            tasks: vec![
                Task::sentinel(TaskId::START, "start"),
                Task::sentinel(TaskId::END, "end"),
            ],
        };
        graph.link(TaskId::START, TaskId::END);
        graph
    }

    /// Total number of tasks, sentinels included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Never true: the sentinels are always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns `true` while no system has been inserted.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.tasks.len() == 2
    }

    /// Look up a task.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.0)
    }

    /// All tasks in arena order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Returns `true` if a directed path leads from `from` to `to`.
    #[must_use]
    pub fn reaches(&self, from: TaskId, to: TaskId) -> bool {
        let mut found = false;
        self.for_each_task_from(from, |task| found |= task.id == to);
        found
    }

    /// Insert a task for `system` and wire it into the graph.
    ///
    /// Returns the new task's id together with the parents it was attached
    /// under.
    pub fn insert(
        &mut self,
        system: SystemHandle,
        label: impl Into<String>,
        archetype: Archetype,
    ) -> (TaskId, Vec<TaskId>) {
        let parents = self.attachment_points(&archetype);
        let id = TaskId(self.tasks.len());
        self.tasks.push(Task {
            id,
            system: Some(system),
            label: label.into(),
            archetype,
            parents: Vec::new(),
            children: Vec::new(),
        });

        for &parent in &parents {
            self.link(parent, id);
            self.unlink(parent, TaskId::END);
        }
        self.link(id, TaskId::END);

        (id, parents)
    }

    /// The tasks a new task with `archetype` must be attached under.
    fn attachment_points(&self, archetype: &Archetype) -> Vec<TaskId> {
        let mut reach = vec![None; self.tasks.len()];
        self.mark_conflicts(TaskId::START, archetype, &mut reach);

        let points: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|task| !task.is_compatible_with(archetype))
            .filter(|task| task.children.iter().all(|c| reach[c.0] == Some(false)))
            .map(|task| task.id)
            .collect();

        if points.is_empty() {
            vec![TaskId::START]
        } else {
            points
        }
    }

    /// Records, for `at` and everything below it, whether the subtree rooted
    /// there holds a task that conflicts with `archetype`.
    fn mark_conflicts(
        &self,
        at: TaskId,
        archetype: &Archetype,
        reach: &mut [Option<bool>],
    ) -> bool {
        if let Some(hit) = reach[at.0] {
            return hit;
        }
        let task = &self.tasks[at.0];
        let mut hit = !task.is_compatible_with(archetype);
        for &child in &task.children {
            hit |= self.mark_conflicts(child, archetype, reach);
        }
        reach[at.0] = Some(hit);
        hit
    }

    fn link(&mut self, parent: TaskId, child: TaskId) {
        if self.tasks[parent.0].children.contains(&child) {
            return;
        }
        self.tasks[parent.0].children.push(child);
        self.tasks[child.0].parents.push(parent);
    }

    fn unlink(&mut self, parent: TaskId, child: TaskId) {
        self.tasks[parent.0].children.retain(|&c| c != child);
        self.tasks[child.0].parents.retain(|&p| p != parent);
    }

    /// Visit every task reachable from Start, breadth-first, once each.
    pub fn for_each_task<F>(&self, callback: F)
    where
        F: FnMut(&Task),
    {
        self.for_each_task_from(TaskId::START, callback);
    }

    /// Visit every task reachable from `start`, breadth-first, once each.
    /// An unknown `start` visits nothing.
    pub fn for_each_task_from<F>(&self, start: TaskId, mut callback: F)
    where
        F: FnMut(&Task),
    {
        if start.0 >= self.tasks.len() {
            return;
        }
        let mut visited = vec![false; self.tasks.len()];
        let mut queue = VecDeque::from([start]);
        visited[start.0] = true;

        while let Some(id) = queue.pop_front() {
            let task = &self.tasks[id.0];
            callback(task);
            for &child in &task.children {
                if !visited[child.0] {
                    visited[child.0] = true;
                    queue.push_back(child);
                }
            }
        }
    }

    /// A serialisable copy of the graph in breadth-first order.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut tasks = Vec::with_capacity(self.tasks.len());
        self.for_each_task(|task| {
            tasks.push(TaskSnapshot {
                id: task.id,
                label: task.label.clone(),
                system: task.system,
                archetype: task.archetype.to_string(),
                parents: task.parents.clone(),
                children: task.children.clone(),
            });
        });
        GraphSnapshot { tasks }
    }

    /// Render the graph in Graphviz DOT format.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph tasks {\n");
        self.for_each_task(|task| {
            let shape = if task.id.is_sentinel() { "doublecircle" } else { "box" };
            let _ = writeln!(
                out,
                "    t{} [label=\"{}\\n{}\", shape={shape}];",
                task.id.0,
                task.label,
                task.archetype
            );
            for child in &task.children {
                let _ = writeln!(out, "    t{} -> t{};", task.id.0, child.0);
            }
        });
        out.push_str("}\n");
        out
    }
}

/// Serialisable view of a [`TaskGraph`].
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    /// Tasks in breadth-first order from Start.
    pub tasks: Vec<TaskSnapshot>,
}

/// Serialisable view of a [`Task`].
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    /// Task id.
    pub id: TaskId,
    /// System name or sentinel label.
    pub label: String,
    /// The wrapped system, if any.
    pub system: Option<SystemHandle>,
    /// Rendered archetype, e.g. `[&Position, &mut Velocity]`.
    pub archetype: String,
    /// Parent task ids.
    pub parents: Vec<TaskId>,
    /// Child task ids.
    pub children: Vec<TaskId>,
}
