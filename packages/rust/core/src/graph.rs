//! Named tasks and their flattening into an ordered plan.
//!
//! A task is either a single [`Step`] or a series of other tasks. Planning a
//! task walks its series depth-first and yields the leaf steps in the order
//! they must run. A task reached twice runs twice.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use url::Url;

use themekit_assets::TransformerKind;
use themekit_shared::{Result, ThemekitError};

/// A leaf action the runner knows how to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Delete paths recursively.
    Clean { paths: Vec<PathBuf> },
    /// Copy matching files under `from` into every destination.
    Copy {
        from: PathBuf,
        pattern: String,
        dests: Vec<PathBuf>,
    },
    /// Rename `*.from` to `*.to` under `dir`.
    RenameExtension {
        dir: PathBuf,
        from: String,
        to: String,
    },
    /// Run a transformer over matching files under `src`, writing into `dest`.
    Transform {
        transformer: TransformerKind,
        src: PathBuf,
        pattern: String,
        dest: PathBuf,
    },
    /// Fetch an archive into `dest`; `cache` allows the user download cache.
    Download { url: Url, dest: PathBuf, cache: bool },
    /// Unpack every archive in `dir` into `dest`.
    Extract {
        dir: PathBuf,
        dest: PathBuf,
        strip: usize,
    },
    /// Mirror `root` to the deploy target.
    Deploy { root: PathBuf },
}

impl Step {
    /// Short label for progress output.
    pub fn describe(&self) -> String {
        match self {
            Self::Clean { paths } => format!("clean {} path(s)", paths.len()),
            Self::Copy { from, dests, .. } => {
                format!("copy {} to {} destination(s)", from.display(), dests.len())
            }
            Self::RenameExtension { from, to, .. } => format!("rename .{from} to .{to}"),
            Self::Transform {
                transformer, src, ..
            } => format!("{} {}", transformer.name(), src.display()),
            Self::Download { url, .. } => format!("download {url}"),
            Self::Extract { dir, .. } => format!("extract archives in {}", dir.display()),
            Self::Deploy { root } => format!("deploy {}", root.display()),
        }
    }
}

/// What a task does when run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    Step(Step),
    /// Other tasks, run in order.
    Series(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct TaskDef {
    pub name: String,
    pub description: String,
    pub kind: TaskKind,
}

impl TaskDef {
    pub fn step(name: &str, description: &str, step: Step) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: TaskKind::Step(step),
        }
    }

    pub fn series(name: &str, description: &str, tasks: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: TaskKind::Series(tasks.iter().map(|t| (*t).to_string()).collect()),
        }
    }
}

/// One entry of a flattened plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    /// The step task this came from.
    pub task: String,
    pub step: Step,
}

impl fmt::Display for PlannedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task, self.step.describe())
    }
}

/// Registry of named tasks, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: Vec<TaskDef>,
    index: HashMap<String, usize>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Names are unique.
    ///
    /// Series may reference tasks that are inserted later; [`validate`](Self::validate)
    /// checks the references once the graph is complete.
    pub fn insert(&mut self, def: TaskDef) -> Result<()> {
        if def.name.trim().is_empty() {
            return Err(ThemekitError::task("task name must not be empty"));
        }
        if self.index.contains_key(&def.name) {
            return Err(ThemekitError::task(format!(
                "task '{}' is defined twice",
                def.name
            )));
        }
        self.index.insert(def.name.clone(), self.tasks.len());
        self.tasks.push(def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TaskDef> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// `(name, description)` for every task, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tasks
            .iter()
            .map(|t| (t.name.as_str(), t.description.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Flatten `name` into the ordered steps it runs.
    pub fn plan(&self, name: &str) -> Result<Vec<PlannedStep>> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.flatten(name, &mut path, &mut out)?;
        Ok(out)
    }

    /// Plan every task, failing on the first unknown reference or cycle.
    pub fn validate(&self) -> Result<()> {
        for task in &self.tasks {
            self.plan(&task.name)?;
        }
        Ok(())
    }

    fn flatten<'a>(
        &'a self,
        name: &'a str,
        path: &mut Vec<&'a str>,
        out: &mut Vec<PlannedStep>,
    ) -> Result<()> {
        let Some(def) = self.get(name) else {
            return Err(if path.is_empty() {
                ThemekitError::task(format!("unknown task '{name}'"))
            } else {
                ThemekitError::task(format!(
                    "unknown task '{name}' (referenced from {})",
                    path.join(" -> ")
                ))
            });
        };

        if path.contains(&name) {
            return Err(ThemekitError::task(format!(
                "cycle in task graph: {} -> {name}",
                path.join(" -> ")
            )));
        }

        match &def.kind {
            TaskKind::Step(step) => out.push(PlannedStep {
                task: def.name.clone(),
                step: step.clone(),
            }),
            TaskKind::Series(children) => {
                path.push(name);
                for child in children {
                    self.flatten(child, path, out)?;
                }
                path.pop();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(path: &str) -> Step {
        Step::Clean {
            paths: vec![PathBuf::from(path)],
        }
    }

    fn graph(defs: Vec<TaskDef>) -> TaskGraph {
        let mut graph = TaskGraph::new();
        for def in defs {
            graph.insert(def).unwrap();
        }
        graph
    }

    fn task_names(plan: &[PlannedStep]) -> Vec<&str> {
        plan.iter().map(|p| p.task.as_str()).collect()
    }

    #[test]
    fn series_flatten_depth_first() {
        let g = graph(vec![
            TaskDef::step("a", "", clean("/tmp/a")),
            TaskDef::step("b", "", clean("/tmp/b")),
            TaskDef::step("c", "", clean("/tmp/c")),
            TaskDef::series("ab", "", &["a", "b"]),
            TaskDef::series("all", "", &["ab", "c", "a"]),
        ]);

        let plan = g.plan("all").unwrap();
        assert_eq!(task_names(&plan), vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut g = TaskGraph::new();
        g.insert(TaskDef::step("clean", "", clean("/tmp/x"))).unwrap();
        let err = g
            .insert(TaskDef::step("clean", "", clean("/tmp/y")))
            .unwrap_err();
        assert!(err.to_string().contains("defined twice"));
    }

    #[test]
    fn unknown_reference_names_path() {
        let g = graph(vec![
            TaskDef::series("build", "", &["styles"]),
            TaskDef::series("release", "", &["build"]),
        ]);

        let err = g.plan("release").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown task 'styles'"), "{msg}");
        assert!(msg.contains("release -> build"), "{msg}");

        assert!(g.plan("nope").unwrap_err().to_string().contains("'nope'"));
    }

    #[test]
    fn cycles_are_detected() {
        let g = graph(vec![
            TaskDef::series("a", "", &["b"]),
            TaskDef::series("b", "", &["a"]),
        ]);

        let err = g.plan("a").unwrap_err();
        assert!(err.to_string().contains("a -> b -> a"));
        assert!(g.validate().is_err());
    }

    #[test]
    fn names_keep_insertion_order() {
        let g = graph(vec![
            TaskDef::step("clean", "Delete output", clean("/tmp/d")),
            TaskDef::series("build", "Everything", &["clean"]),
        ]);
        let names: Vec<_> = g.names().collect();
        assert_eq!(names, vec![("clean", "Delete output"), ("build", "Everything")]);
        assert!(g.validate().is_ok());
    }
}
