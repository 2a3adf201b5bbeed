// src/registry/graph.rs

use std::collections::{BTreeMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, ThemepipeError};

/// What a task does when its turn comes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    /// Compile the entry stylesheet through the transform chain.
    Stylesheets,
    /// Bundle and minify the script groups.
    Scripts,
    /// Optimize icons and merge them into the sprite.
    Svgs,
    /// Optimize the image directory.
    ImgOpt,
    /// Long-lived: watch the image directory and re-run `img-opt`.
    WatchImages,
    /// Long-lived: start the dev proxy and the asset watchers.
    Serve,
    /// No action of its own; exists only for its prerequisites.
    Aggregate,
}

impl TaskAction {
    /// Long-lived actions keep the process alive until it is terminated.
    pub fn is_long_lived(self) -> bool {
        matches!(self, TaskAction::WatchImages | TaskAction::Serve)
    }
}

/// A named task: an action plus the tasks that must complete before it.
#[derive(Debug, Clone)]
pub struct TaskDef {
    pub name: String,
    pub action: TaskAction,
    pub prerequisites: Vec<String>,
}

/// Registry of all invocable tasks, keyed by name.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, TaskDef>,
}

impl TaskRegistry {
    pub fn new(defs: Vec<TaskDef>) -> Result<Self> {
        let mut tasks = BTreeMap::new();
        for def in defs {
            tasks.insert(def.name.clone(), def);
        }
        let registry = Self { tasks };
        registry.validate()?;
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.get(name)
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    /// Resolve the execution plan for a requested task: the transitive
    /// closure of its prerequisites, in topological order, ending with the
    /// task itself.
    pub fn execution_plan(&self, name: &str) -> Result<Vec<&TaskDef>> {
        if !self.tasks.contains_key(name) {
            return Err(ThemepipeError::UnknownTask(name.to_string()));
        }

        // Collect the closure of the requested task.
        let mut wanted: HashSet<&str> = HashSet::new();
        let mut stack = vec![name];
        while let Some(current) = stack.pop() {
            if !wanted.insert(current) {
                continue;
            }
            if let Some(def) = self.tasks.get(current) {
                stack.extend(def.prerequisites.iter().map(|s| s.as_str()));
            }
        }

        let order = self.topological_order()?;
        Ok(order
            .into_iter()
            .filter(|n| wanted.contains(n))
            .filter_map(|n| self.tasks.get(n))
            .collect())
    }

    /// Check that every prerequisite names a registered task, that no task
    /// depends on itself, and that the graph is acyclic.
    fn validate(&self) -> Result<()> {
        for (name, def) in self.tasks.iter() {
            for dep in def.prerequisites.iter() {
                if !self.tasks.contains_key(dep) {
                    return Err(ThemepipeError::UnknownPrerequisite {
                        task: name.clone(),
                        dep: dep.clone(),
                    });
                }
                if dep == name {
                    return Err(ThemepipeError::TaskCycle(name.clone()));
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Full topological order over all tasks.
    ///
    /// Edge direction: prerequisite -> task, so a successful sort yields
    /// prerequisites before their dependents.
    fn topological_order(&self) -> Result<Vec<&str>> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for name in self.tasks.keys() {
            graph.add_node(name.as_str());
        }
        for (name, def) in self.tasks.iter() {
            for dep in def.prerequisites.iter() {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        toposort(&graph, None)
            .map_err(|cycle| ThemepipeError::TaskCycle(cycle.node_id().to_string()))
    }
}

/// The standard themepipe task surface.
///
/// `default` runs the content tasks once, then keeps watching via `serve`
/// and `watch-images`. `build` is the explicit one-shot aggregate; `images`
/// aliases the standalone image optimizer.
pub fn standard_registry() -> TaskRegistry {
    let def = |name: &str, action: TaskAction, prerequisites: &[&str]| TaskDef {
        name: name.to_string(),
        action,
        prerequisites: prerequisites.iter().map(|s| s.to_string()).collect(),
    };

    let defs = vec![
        def("stylesheets", TaskAction::Stylesheets, &[]),
        def("scripts", TaskAction::Scripts, &[]),
        def("svgs", TaskAction::Svgs, &[]),
        def("img-opt", TaskAction::ImgOpt, &[]),
        def("watch-images", TaskAction::WatchImages, &[]),
        def("serve", TaskAction::Serve, &["stylesheets", "scripts", "svgs"]),
        def("build", TaskAction::Aggregate, &["stylesheets", "scripts", "svgs"]),
        def("images", TaskAction::Aggregate, &["img-opt"]),
        def(
            "default",
            TaskAction::Aggregate,
            &["stylesheets", "scripts", "svgs", "watch-images", "serve"],
        ),
    ];

    // The standard surface is statically acyclic.
    TaskRegistry::new(defs).unwrap_or_else(|e| panic!("standard registry invalid: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_validates() {
        let reg = standard_registry();
        assert!(reg.get("default").is_some());
        assert_eq!(reg.task_names().count(), 9);
    }

    #[test]
    fn build_plan_runs_content_tasks_before_build() {
        let reg = standard_registry();
        let plan = reg.execution_plan("build").unwrap();
        let names: Vec<&str> = plan.iter().map(|d| d.name.as_str()).collect();

        assert_eq!(names.len(), 4);
        assert_eq!(*names.last().unwrap(), "build");
        for t in ["stylesheets", "scripts", "svgs"] {
            assert!(names.contains(&t));
        }
    }

    #[test]
    fn serve_plan_puts_serve_after_its_prerequisites() {
        let reg = standard_registry();
        let plan = reg.execution_plan("serve").unwrap();
        let names: Vec<&str> = plan.iter().map(|d| d.name.as_str()).collect();

        let serve_pos = names.iter().position(|n| *n == "serve").unwrap();
        for t in ["stylesheets", "scripts", "svgs"] {
            let pos = names.iter().position(|n| *n == t).unwrap();
            assert!(pos < serve_pos, "{t} must precede serve");
        }
    }

    #[test]
    fn images_plan_is_img_opt_then_alias() {
        let reg = standard_registry();
        let plan = reg.execution_plan("images").unwrap();
        let names: Vec<&str> = plan.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["img-opt", "images"]);
    }

    #[test]
    fn unknown_task_is_rejected() {
        let reg = standard_registry();
        assert!(matches!(
            reg.execution_plan("nope"),
            Err(ThemepipeError::UnknownTask(_))
        ));
    }

    #[test]
    fn unknown_prerequisite_is_rejected() {
        let defs = vec![TaskDef {
            name: "a".into(),
            action: TaskAction::Aggregate,
            prerequisites: vec!["missing".into()],
        }];
        assert!(matches!(
            TaskRegistry::new(defs),
            Err(ThemepipeError::UnknownPrerequisite { .. })
        ));
    }

    #[test]
    fn cycles_are_rejected() {
        let defs = vec![
            TaskDef {
                name: "a".into(),
                action: TaskAction::Aggregate,
                prerequisites: vec!["b".into()],
            },
            TaskDef {
                name: "b".into(),
                action: TaskAction::Aggregate,
                prerequisites: vec!["a".into()],
            },
        ];
        assert!(matches!(
            TaskRegistry::new(defs),
            Err(ThemepipeError::TaskCycle(_))
        ));
    }
}
