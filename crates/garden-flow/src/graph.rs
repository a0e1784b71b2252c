//! Task graph construction and compilation into leveled execution plans.

use std::collections::HashMap;

use crate::error::CompileError;
use crate::task::{Task, TaskId};

/// A mutable collection of tasks, built once and then compiled.
///
/// Dependencies are referenced by name and may point at tasks added later;
/// they are resolved in [`Graph::compile`].
pub struct Graph<C> {
  name: String,
  tasks: Vec<Task<C>>,
  index: HashMap<String, usize>,
}

impl<C> Graph<C> {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      tasks: Vec::new(),
      index: HashMap::new(),
    }
  }

  /// Register a task.
  ///
  /// # Errors
  /// Returns [`CompileError::DuplicateName`] if a task with the same name exists.
  pub fn add(&mut self, task: Task<C>) -> Result<TaskId, CompileError> {
    if self.index.contains_key(&task.name) {
      return Err(CompileError::DuplicateName { name: task.name });
    }

    let id = TaskId::new(task.name.clone());
    self.index.insert(task.name.clone(), self.tasks.len());
    self.tasks.push(task);
    Ok(id)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }

  /// Validate the graph and compute its topological levels.
  ///
  /// Levels are computed by repeated removal of tasks without remaining
  /// dependencies. Within a level, tasks keep their insertion order.
  ///
  /// # Errors
  /// - [`CompileError::UnknownDependency`] for the first task (in insertion
  ///   order) naming a dependency that is not in the graph.
  /// - [`CompileError::Cycle`] with the offending cycle if the dependency
  ///   relation is not acyclic.
  pub fn compile(self) -> Result<ExecutionPlan<C>, CompileError> {
    let n = self.tasks.len();

    // Resolve names into index-based edges.
    let mut dependencies: Vec<Vec<usize>> = Vec::with_capacity(n);
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, task) in self.tasks.iter().enumerate() {
      let mut resolved = Vec::with_capacity(task.dependencies.len());
      for dep in &task.dependencies {
        let Some(&j) = self.index.get(dep) else {
          return Err(CompileError::UnknownDependency {
            task: task.name.clone(),
            dependency: dep.clone(),
          });
        };
        resolved.push(j);
        dependents[j].push(i);
      }
      dependencies.push(resolved);
    }

    let mut remaining: Vec<usize> = dependencies.iter().map(Vec::len).collect();
    let mut level_of = vec![usize::MAX; n];
    let mut levels: Vec<Vec<usize>> = Vec::new();

    let mut current: Vec<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
    while !current.is_empty() {
      let depth = levels.len();
      let mut next = Vec::new();
      for &i in &current {
        level_of[i] = depth;
        for &d in &dependents[i] {
          remaining[d] -= 1;
          if remaining[d] == 0 {
            next.push(d);
          }
        }
      }
      next.sort_unstable();
      levels.push(current);
      current = next;
    }

    let placed: usize = levels.iter().map(Vec::len).sum();
    if placed < n {
      let path = find_cycle(&self.tasks, &dependencies, &level_of);
      return Err(CompileError::Cycle { path });
    }

    Ok(ExecutionPlan {
      name: self.name,
      tasks: self.tasks,
      levels,
      level_of,
      dependencies,
    })
  }
}

/// Walk unplaced tasks along unplaced dependencies until a task repeats.
///
/// Every task left over by the layered sort still has an unplaced
/// dependency, so the walk always closes a cycle.
fn find_cycle<C>(
  tasks: &[Task<C>],
  dependencies: &[Vec<usize>],
  level_of: &[usize],
) -> Vec<String> {
  let unplaced = |i: usize| level_of[i] == usize::MAX;

  let Some(start) = (0..tasks.len()).find(|&i| unplaced(i)) else {
    return Vec::new();
  };

  let mut position: HashMap<usize, usize> = HashMap::new();
  let mut walk: Vec<usize> = Vec::new();
  let mut cursor = start;

  loop {
    if let Some(&pos) = position.get(&cursor) {
      let mut path: Vec<String> = walk[pos..]
        .iter()
        .map(|&i| tasks[i].name.clone())
        .collect();
      path.push(tasks[cursor].name.clone());
      return path;
    }
    position.insert(cursor, walk.len());
    walk.push(cursor);

    match dependencies[cursor].iter().copied().find(|&d| unplaced(d)) {
      Some(next) => cursor = next,
      None => return walk.iter().map(|&i| tasks[i].name.clone()).collect(),
    }
  }
}

/// An immutable, topologically leveled view of a compiled graph.
///
/// No two tasks in the same level depend on each other, and every task's
/// level is strictly greater than the levels of all its dependencies.
pub struct ExecutionPlan<C> {
  name: String,
  pub(crate) tasks: Vec<Task<C>>,
  pub(crate) levels: Vec<Vec<usize>>,
  level_of: Vec<usize>,
  dependencies: Vec<Vec<usize>>,
}

impl<C> ExecutionPlan<C> {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Total number of tasks.
  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }

  /// Task names grouped by level.
  pub fn levels(&self) -> Vec<Vec<&str>> {
    self
      .levels
      .iter()
      .map(|level| level.iter().map(|&i| self.tasks[i].name()).collect())
      .collect()
  }

  /// Level index of a task, if it exists.
  pub fn level_of(&self, name: &str) -> Option<usize> {
    self
      .tasks
      .iter()
      .position(|t| t.name == name)
      .map(|i| self.level_of[i])
  }

  /// Task names in plan order (level by level).
  pub fn task_names(&self) -> impl Iterator<Item = &str> {
    self
      .levels
      .iter()
      .flatten()
      .map(|&i| self.tasks[i].name())
  }

  pub(crate) fn dependencies_of(&self, index: usize) -> &[usize] {
    &self.dependencies[index]
  }
}
