//! Dependency resolution.
//!
//! Orders registered modules so every module comes after the modules it
//! requires. Ordering uses Kahn's algorithm with registration order as the
//! tie-break; when it stalls, a depth-first walk recovers one concrete cycle
//! for the error message.

use std::collections::VecDeque;

use tracing::debug;

use crate::descriptor::ModuleName;
use crate::error::{ModuleError, ModuleResult};
use crate::registry::ModuleRegistry;

/// Compute the instantiation order of every registered module.
///
/// # Errors
///
/// - [`ModuleError::MissingDependency`] for the first required module that is
///   not registered (registration order, then declaration order).
/// - [`ModuleError::CircularDependency`] if the graph has a cycle; the cycle
///   starts and ends with the same module.
pub fn resolve_dependencies(registry: &ModuleRegistry) -> ModuleResult<Vec<ModuleName>> {
    let graph = DependencyGraph::build(registry)?;
    let order = graph.topological_order();

    if order.len() < graph.names.len() {
        let cycle = graph.find_cycle(&order);
        return Err(ModuleError::CircularDependency {
            cycle: cycle
                .into_iter()
                .map(|node| graph.names[node].to_string())
                .collect(),
        });
    }

    let order: Vec<ModuleName> = order
        .into_iter()
        .map(|node| graph.names[node].clone())
        .collect();
    debug!(
        order = ?order.iter().map(ModuleName::as_str).collect::<Vec<_>>(),
        "Resolved instantiation order"
    );
    Ok(order)
}

/// Index-based view of the registry: node `i` is the `i`th registered module.
struct DependencyGraph {
    names: Vec<ModuleName>,
    /// `requires[i]`: nodes that node `i` depends on.
    requires: Vec<Vec<usize>>,
    /// `dependents[i]`: nodes that depend on node `i`.
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    fn build(registry: &ModuleRegistry) -> ModuleResult<Self> {
        let names: Vec<ModuleName> = registry.names().into_iter().cloned().collect();
        let mut requires = vec![Vec::new(); names.len()];
        let mut dependents = vec![Vec::new(); names.len()];

        for (node, descriptor) in registry.iter().enumerate() {
            for dependency in descriptor.required_modules() {
                let target =
                    registry
                        .position(dependency)
                        .ok_or_else(|| ModuleError::MissingDependency {
                            dependent: descriptor.name().to_string(),
                            missing: dependency.clone(),
                        })?;
                requires[node].push(target);
                dependents[target].push(node);
            }
        }

        Ok(Self {
            names,
            requires,
            dependents,
        })
    }

    fn topological_order(&self) -> Vec<usize> {
        let mut in_degree: Vec<usize> = self.requires.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(node, _)| node)
            .collect();
        let mut order = Vec::with_capacity(self.names.len());

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                let degree = &mut in_degree[dependent];
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }
        order
    }

    /// Walk `requires` edges from the first unresolved node until a node on
    /// the current path is revisited.
    fn find_cycle(&self, resolved: &[usize]) -> Vec<usize> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            Visiting,
            Visited,
        }

        fn visit(
            node: usize,
            requires: &[Vec<usize>],
            marks: &mut [Mark],
            path: &mut Vec<usize>,
        ) -> Option<Vec<usize>> {
            marks[node] = Mark::Visiting;
            path.push(node);

            for &next in &requires[node] {
                match marks[next] {
                    Mark::Visiting => {
                        let start = path.iter().position(|&n| n == next)?;
                        let mut cycle = path.split_off(start);
                        cycle.push(next);
                        return Some(cycle);
                    },
                    Mark::Unvisited => {
                        if let Some(cycle) = visit(next, requires, marks, path) {
                            return Some(cycle);
                        }
                    },
                    Mark::Visited => {},
                }
            }

            path.pop();
            marks[node] = Mark::Visited;
            None
        }

        let mut marks = vec![Mark::Unvisited; self.names.len()];
        for &node in resolved {
            marks[node] = Mark::Visited;
        }

        let mut path = Vec::new();
        for node in 0..self.names.len() {
            if marks[node] == Mark::Unvisited {
                if let Some(cycle) = visit(node, &self.requires, &mut marks, &mut path) {
                    return cycle;
                }
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::api::ModuleApi;
    use crate::descriptor::ModuleDefinition;
    use crate::manifest::ModuleManifest;

    fn registry(modules: &[(&str, &[&str])]) -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        for (name, deps) in modules {
            let manifest = deps
                .iter()
                .fold(ModuleManifest::new(), |m, d| m.depends_on(*d));
            registry
                .register(
                    ModuleName::new(*name).unwrap(),
                    ModuleDefinition::new(manifest, |_| Ok(ModuleApi::new())).unwrap(),
                )
                .unwrap();
        }
        registry
    }

    fn names(order: &[ModuleName]) -> Vec<&str> {
        order.iter().map(ModuleName::as_str).collect()
    }

    #[test]
    fn test_empty_registry() {
        assert!(resolve_dependencies(&ModuleRegistry::new()).unwrap().is_empty());
    }

    #[test]
    fn test_dependencies_first() {
        let registry = registry(&[("b", &["a"]), ("a", &[])]);
        let order = resolve_dependencies(&registry).unwrap();
        assert_eq!(names(&order), vec!["a", "b"]);
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        let registry = registry(&[
            ("threads", &["personas", "storage"]),
            ("storage", &[]),
            ("personas", &["storage"]),
            ("ai", &[]),
        ]);
        let order = resolve_dependencies(&registry).unwrap();
        assert_eq!(names(&order), vec!["storage", "ai", "personas", "threads"]);
    }

    #[test]
    fn test_missing_dependency() {
        let registry = registry(&[("a", &[]), ("z", &["nonexistent"])]);
        match resolve_dependencies(&registry).unwrap_err() {
            ModuleError::MissingDependency { dependent, missing } => {
                assert_eq!(dependent, "z");
                assert_eq!(missing, "nonexistent");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_two_node_cycle() {
        let registry = registry(&[("x", &["y"]), ("y", &["x"])]);
        let err = resolve_dependencies(&registry).unwrap_err();
        assert_eq!(err.to_string(), "circular dependency: x -> y -> x");
    }

    #[test]
    fn test_cycle_behind_acyclic_prefix() {
        let registry = registry(&[
            ("root", &[]),
            ("entry", &["root", "c1"]),
            ("c1", &["c2"]),
            ("c2", &["c3"]),
            ("c3", &["c1"]),
        ]);
        match resolve_dependencies(&registry).unwrap_err() {
            ModuleError::CircularDependency { cycle } => {
                assert_eq!(cycle, vec!["c1", "c2", "c3", "c1"]);
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Random DAG: module `i` may only depend on modules with a lower index,
    /// registered in a shuffled order.
    fn dag() -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
        (1usize..12)
            .prop_flat_map(|n| {
                let edges =
                    proptest::collection::vec(proptest::bool::weighted(0.3), n.saturating_mul(n));
                (Just(n), edges, Just((0..n).collect::<Vec<_>>()).prop_shuffle())
            })
            .prop_map(|(n, edges, order)| {
                order
                    .into_iter()
                    .map(|i| {
                        let deps: Vec<String> = (0..i)
                            .filter(|&j| edges[i.saturating_mul(n).saturating_add(j)])
                            .map(|j| format!("m{j}"))
                            .collect();
                        (format!("m{i}"), deps)
                    })
                    .collect::<Vec<_>>()
            })
    }

    fn owned_registry(modules: &[(String, Vec<String>)]) -> ModuleRegistry {
        let borrowed: Vec<(&str, Vec<&str>)> = modules
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.iter().map(String::as_str).collect()))
            .collect();
        let refs: Vec<(&str, &[&str])> = borrowed
            .iter()
            .map(|(name, deps)| (*name, deps.as_slice()))
            .collect();
        registry(&refs)
    }

    proptest! {
        #[test]
        fn prop_acyclic_order_respects_dependencies(modules in dag()) {
            let registry = owned_registry(&modules);
            let order = resolve_dependencies(&registry).unwrap();

            prop_assert_eq!(order.len(), modules.len());
            let position: HashMap<&str, usize> = order
                .iter()
                .enumerate()
                .map(|(i, name)| (name.as_str(), i))
                .collect();
            prop_assert_eq!(position.len(), modules.len());

            for (name, deps) in &modules {
                for dep in deps {
                    prop_assert!(position[dep.as_str()] < position[name.as_str()]);
                }
            }
        }

        #[test]
        fn prop_planted_cycle_is_reported(modules in dag(), len in 1usize..5) {
            let mut modules = modules;
            for k in 0..len {
                let next = k.saturating_add(1).checked_rem(len).unwrap_or(0);
                modules.push((format!("c{k}"), vec![format!("c{next}")]));
            }
            if let Some((_, deps)) = modules.first_mut() {
                deps.push("c0".to_string());
            }

            let registry = owned_registry(&modules);
            let cycle = match resolve_dependencies(&registry) {
                Err(ModuleError::CircularDependency { cycle }) => cycle,
                other => return Err(TestCaseError::fail(format!("expected cycle, got {other:?}"))),
            };

            prop_assert!(cycle.len() >= 2);
            prop_assert_eq!(cycle.first(), cycle.last());
            for step in cycle.windows(2) {
                let requires = registry.get(&step[0]).unwrap().required_modules();
                prop_assert!(requires.contains(&step[1]));
            }
        }

        #[test]
        fn prop_missing_dependency_named(modules in dag()) {
            let mut modules = modules;
            let dependent = modules[0].0.clone();
            modules[0].1.push("ghost".to_string());

            let registry = owned_registry(&modules);
            match resolve_dependencies(&registry) {
                Err(ModuleError::MissingDependency { dependent: d, missing }) => {
                    prop_assert_eq!(d, dependent);
                    prop_assert_eq!(missing, "ghost");
                },
                other => {
                    return Err(TestCaseError::fail(format!("expected missing, got {other:?}")));
                },
            }
        }
    }
}
