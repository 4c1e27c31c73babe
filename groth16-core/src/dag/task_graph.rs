use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::utils::thread::lock;

pub type TaskId = usize;

type TaskBody<'a, Err> = Box<dyn FnOnce() -> Result<(), Err> + Send + 'a>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Schedule {
    /// Tasks run one after another, in declaration order, on the calling thread.
    Sequential,
    /// Tasks run on the rayon pool as soon as their last dependency completes.
    Concurrent,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskGraphError {
    #[error("Task `{task}` depends on undeclared task id {dependency}")]
    UnknownDependency {
        task: &'static str,
        dependency: TaskId,
    },
    #[error("Task `{task}` read output `{output}` before it was produced")]
    MissingInput {
        task: &'static str,
        output: &'static str,
    },
    #[error("Output `{0}` was produced twice")]
    OutputAlreadySet(&'static str),
}

/// Write-once output slot shared between a producing task and its consumers.
#[derive(Debug)]
pub struct Slot<T> {
    name: &'static str,
    cell: OnceCell<T>,
}

impl<T> Slot<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceCell::new(),
        }
    }

    pub fn set(&self, value: T) -> Result<(), TaskGraphError> {
        self.cell
            .set(value)
            .map_err(|_| TaskGraphError::OutputAlreadySet(self.name))
    }

    /// Reads the output on behalf of `task`.
    pub fn get(&self, task: &'static str) -> Result<&T, TaskGraphError> {
        self.cell.get().ok_or(TaskGraphError::MissingInput {
            task,
            output: self.name,
        })
    }

    pub fn into_inner(self) -> Option<T> {
        self.cell.into_inner()
    }
}

struct TaskNode<'a, Err> {
    name: &'static str,
    deps: Vec<TaskId>,
    body: TaskBody<'a, Err>,
}

/// Acyclic graph of named tasks. A task may only depend on tasks declared before it,
/// so every graph that can be built is a DAG and declaration order is a valid
/// topological order.
pub struct TaskGraph<'a, Err> {
    tasks: Vec<TaskNode<'a, Err>>,
    invalid: Option<TaskGraphError>,
}

impl<'a, Err> Default for TaskGraph<'a, Err> {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            invalid: None,
        }
    }
}

impl<'a, Err> TaskGraph<'a, Err>
where
    Err: From<TaskGraphError> + Send + 'a,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Declared edges as `(task, [dependency names])`, in declaration order.
    pub fn dependencies(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        self.tasks
            .iter()
            .map(|task| {
                let deps = task
                    .deps
                    .iter()
                    .filter_map(|&d| self.tasks.get(d).map(|dep| dep.name))
                    .collect();
                (task.name, deps)
            })
            .collect()
    }

    pub fn add_task<F>(&mut self, name: &'static str, deps: &[TaskId], body: F) -> TaskId
    where
        F: FnOnce() -> Result<(), Err> + Send + 'a,
    {
        let id = self.tasks.len();
        if let Some(&dependency) = deps.iter().find(|&&d| d >= id) {
            self.invalid
                .get_or_insert(TaskGraphError::UnknownDependency {
                    task: name,
                    dependency,
                });
        }
        self.tasks.push(TaskNode {
            name,
            deps: deps.to_vec(),
            body: Box::new(body),
        });
        id
    }

    /// Runs every task. On the first failure no further task is started and that
    /// failure is returned; tasks already in flight finish.
    pub fn run(mut self, schedule: Schedule) -> Result<(), Err> {
        if let Some(e) = self.invalid.take() {
            return Err(e.into());
        }
        match schedule {
            Schedule::Sequential => self.run_sequential(),
            Schedule::Concurrent => self.run_concurrent(),
        }
    }

    fn run_sequential(self) -> Result<(), Err> {
        for task in self.tasks {
            let _span = tracing::debug_span!("task", name = task.name).entered();
            (task.body)()?;
        }
        Ok(())
    }

    fn run_concurrent(self) -> Result<(), Err> {
        let n = self.tasks.len();
        let mut dependants: Vec<Vec<TaskId>> = vec![Vec::new(); n];
        let mut names = Vec::with_capacity(n);
        let mut remaining = Vec::with_capacity(n);
        let mut bodies = Vec::with_capacity(n);
        for (id, task) in self.tasks.into_iter().enumerate() {
            for &dep in &task.deps {
                dependants[dep].push(id);
            }
            names.push(task.name);
            remaining.push(AtomicUsize::new(task.deps.len()));
            bodies.push(Mutex::new(Some(task.body)));
        }

        let state = RunState {
            names,
            dependants,
            remaining,
            bodies,
            failed: AtomicBool::new(false),
            error: Mutex::new(None),
        };

        rayon::scope(|s| {
            for id in 0..n {
                if state.remaining[id].load(Ordering::Acquire) == 0 {
                    spawn_task(s, id, &state);
                }
            }
        });

        match state.error.into_inner() {
            Ok(Some(e)) => Err(e),
            Ok(None) => Ok(()),
            Err(poisoned) => poisoned.into_inner().map_or(Ok(()), Err),
        }
    }
}

struct RunState<'a, Err> {
    names: Vec<&'static str>,
    dependants: Vec<Vec<TaskId>>,
    remaining: Vec<AtomicUsize>,
    bodies: Vec<Mutex<Option<TaskBody<'a, Err>>>>,
    failed: AtomicBool,
    error: Mutex<Option<Err>>,
}

fn spawn_task<'s, 'a: 's, Err: Send + 'a>(
    scope: &rayon::Scope<'s>,
    id: TaskId,
    state: &'s RunState<'a, Err>,
) {
    scope.spawn(move |s| {
        if state.failed.load(Ordering::Acquire) {
            return;
        }
        let Some(body) = lock(&state.bodies[id]).take() else {
            return;
        };
        let result = tracing::debug_span!("task", name = state.names[id]).in_scope(body);
        match result {
            Ok(()) => {
                for &next in &state.dependants[id] {
                    // The decrement that reaches zero belongs to the last dependency.
                    if state.remaining[next].fetch_sub(1, Ordering::AcqRel) == 1 {
                        spawn_task(s, next, state);
                    }
                }
            }
            Err(e) => {
                state.failed.store(true, Ordering::Release);
                lock(&state.error).get_or_insert(e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, PartialEq, Eq)]
    enum TestError {
        Graph(TaskGraphError),
        Failed(&'static str),
    }

    impl From<TaskGraphError> for TestError {
        fn from(e: TaskGraphError) -> Self {
            TestError::Graph(e)
        }
    }

    fn diamond<'a>(log: &'a Mutex<Vec<&'static str>>) -> TaskGraph<'a, TestError> {
        let mut graph = TaskGraph::new();
        let record = |name: &'static str| {
            move || -> Result<(), TestError> {
                lock(log).push(name);
                Ok(())
            }
        };
        let a = graph.add_task("a", &[], record("a"));
        let b = graph.add_task("b", &[a], move || {
            std::thread::sleep(Duration::from_millis(5));
            lock(log).push("b");
            Ok(())
        });
        let c = graph.add_task("c", &[a], record("c"));
        graph.add_task("d", &[b, c], record("d"));
        graph
    }

    #[test]
    fn sequential_runs_in_declaration_order() {
        let log = Mutex::new(Vec::new());
        diamond(&log).run(Schedule::Sequential).unwrap();
        assert_eq!(log.into_inner().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn declared_edges_are_reported_by_name() {
        let log = Mutex::new(Vec::new());
        let graph = diamond(&log);
        assert_eq!(
            graph.dependencies(),
            vec![
                ("a", vec![]),
                ("b", vec!["a"]),
                ("c", vec!["a"]),
                ("d", vec!["b", "c"]),
            ]
        );
    }

    #[test]
    fn concurrent_respects_dependencies() {
        for _ in 0..20 {
            let log = Mutex::new(Vec::new());
            diamond(&log).run(Schedule::Concurrent).unwrap();
            let log = log.into_inner().unwrap();
            assert_eq!(log.len(), 4);
            let pos = |name| log.iter().position(|n| *n == name).unwrap();
            assert_eq!(pos("a"), 0);
            assert_eq!(pos("d"), 3);
        }
    }

    #[test]
    fn outputs_flow_through_slots() {
        for schedule in [Schedule::Sequential, Schedule::Concurrent] {
            let x = Slot::<u64>::new("x");
            let y = Slot::<u64>::new("y");
            let z = Slot::<u64>::new("z");
            let mut graph = TaskGraph::<TestError>::new();
            let tx = graph.add_task("x", &[], || Ok(x.set(3)?));
            let ty = graph.add_task("y", &[], || Ok(y.set(5)?));
            graph.add_task("z", &[tx, ty], || {
                let product = x.get("z")? * y.get("z")?;
                Ok(z.set(product)?)
            });
            graph.run(schedule).unwrap();
            assert_eq!(z.into_inner(), Some(15));
        }
    }

    #[test]
    fn failure_skips_dependants() {
        for schedule in [Schedule::Sequential, Schedule::Concurrent] {
            let ran = AtomicBool::new(false);
            let mut graph = TaskGraph::<TestError>::new();
            let a = graph.add_task("a", &[], || Err(TestError::Failed("a")));
            graph.add_task("b", &[a], || {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            });
            assert_eq!(graph.run(schedule), Err(TestError::Failed("a")));
            assert!(!ran.load(Ordering::SeqCst));
        }
    }

    #[test]
    fn forward_dependency_is_rejected() {
        let mut graph = TaskGraph::<TestError>::new();
        graph.add_task("a", &[1], || Ok(()));
        graph.add_task("b", &[], || Ok(()));
        assert_eq!(
            graph.run(Schedule::Concurrent),
            Err(TestError::Graph(TaskGraphError::UnknownDependency {
                task: "a",
                dependency: 1
            }))
        );
    }

    #[test]
    fn reading_unproduced_output_is_an_error() {
        let x = Slot::<u64>::new("x");
        assert_eq!(
            x.get("reader"),
            Err(TaskGraphError::MissingInput {
                task: "reader",
                output: "x"
            })
        );
        x.set(1).unwrap();
        assert_eq!(x.set(2), Err(TaskGraphError::OutputAlreadySet("x")));
    }
}
