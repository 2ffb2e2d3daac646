use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    declaration::Declaration,
    errors::{GraphErrors, ResolveError},
    types::{Injectable, Instance},
};

/// Fully normalized graph, every key maps to a [Declaration]
pub type StrictGraph = BTreeMap<String, Declaration>;

/// Graph before normalization
pub type LooseGraph = BTreeMap<String, LooseDeclaration>;

/// Either a plain value or a full declaration
#[derive(Clone, Debug)]
pub enum LooseDeclaration {
    Value(Instance),
    Declaration(Declaration),
}
impl LooseDeclaration {
    pub fn value<T: Injectable>(value: T) -> Self {
        LooseDeclaration::Value(Instance::new(value))
    }
}
impl From<Declaration> for LooseDeclaration {
    fn from(declaration: Declaration) -> Self {
        LooseDeclaration::Declaration(declaration)
    }
}
impl From<Instance> for LooseDeclaration {
    fn from(instance: Instance) -> Self {
        LooseDeclaration::Value(instance)
    }
}

/// Normalizes a loose graph, plain values become declarations without dependencies
pub fn ensure_strict(graph: LooseGraph) -> StrictGraph {
    graph
        .into_iter()
        .map(|(key, loose)| {
            let declaration = match loose {
                LooseDeclaration::Declaration(declaration) => declaration,
                LooseDeclaration::Value(instance) => Declaration::instance(instance),
            };
            (key, declaration)
        })
        .collect()
}

/// A declaration visited during resolution
///
/// `history` holds the keys on the path from the root to this node, so the same key can
/// appear in unrelated branches without being mistaken for a cycle.
#[derive(Clone, Debug)]
pub struct DependencyNode {
    pub key: String,
    pub declaration: Declaration,
    pub history: Vec<String>,
}
impl DependencyNode {
    pub fn root(key: impl Into<String>, declaration: Declaration) -> Self {
        Self {
            key: key.into(),
            declaration,
            history: Vec::new(),
        }
    }

    /// Node for a dependency of this node, one step further down the path
    pub fn child(&self, key: impl Into<String>, declaration: Declaration) -> Self {
        let mut history = self.history.clone();
        history.push(self.key.clone());
        Self {
            key: key.into(),
            declaration,
            history,
        }
    }

    pub fn dependencies(&self) -> &[String] {
        self.declaration.dependencies()
    }

    /// True if `key` is this node or one of its ancestors on the current path
    pub fn on_path(&self, key: &str) -> bool {
        self.key == key || self.history.iter().any(|visited| visited == key)
    }

    /// Path from the root through this node to `key`
    pub fn path_to(&self, key: &str) -> Vec<String> {
        let mut path = self.history.clone();
        path.push(self.key.clone());
        path.push(key.to_string());
        path
    }
}

/// Declared dependency structure of a graph as a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub children: Vec<TreeNode>,
}
impl TreeNode {
    /// Names of all nodes without children
    pub fn leaves(&self) -> HashSet<&str> {
        let mut leaves = HashSet::new();
        let mut unvisited = vec![self];
        while let Some(node) = unvisited.pop() {
            if node.children.is_empty() {
                leaves.insert(node.name.as_str());
            }
            unvisited.extend(node.children.iter());
        }
        leaves
    }
}

/// Builds the tree view of a graph, rooted at `container` with one subtree per key
///
/// Missing dependencies are leaves. A dependency already on the current path is a leaf as well,
/// so cyclic graphs still produce a finite tree.
pub fn to_tree(graph: &StrictGraph) -> TreeNode {
    let mut path = Vec::new();
    let children = graph
        .keys()
        .map(|key| treeify(graph, key, &mut path))
        .collect();

    return TreeNode {
        name: "container".to_string(),
        children,
    };

    fn treeify<'a>(graph: &'a StrictGraph, name: &'a str, path: &mut Vec<&'a str>) -> TreeNode {
        let mut node = TreeNode {
            name: name.to_string(),
            children: Vec::new(),
        };

        if path.contains(&name) {
            return node;
        }

        if let Some(declaration) = graph.get(name) {
            path.push(name);
            node.children = declaration
                .dependencies()
                .iter()
                .map(|dependency| treeify(graph, dependency, path))
                .collect();
            path.pop();
        }

        node
    }
}

/// The given keys and every key which transitively depends on one of them
pub fn dependents_of<'a>(
    graph: &'a StrictGraph,
    keys: impl IntoIterator<Item = &'a str>,
) -> HashSet<&'a str> {
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (key, declaration) in graph {
        for dependency in declaration.dependencies() {
            dependents.entry(dependency).or_default().push(key);
        }
    }

    let mut found = HashSet::new();
    let mut unvisited: Vec<&str> = keys.into_iter().collect();
    while let Some(key) = unvisited.pop() {
        if !found.insert(key) {
            continue;
        }
        if let Some(next) = dependents.get(key) {
            unvisited.extend(next.iter().copied());
        }
    }
    found
}

/// `key` and every key it transitively depends on
pub fn dependencies_of<'a>(graph: &'a StrictGraph, key: &'a str) -> HashSet<&'a str> {
    let mut found = HashSet::new();
    let mut unvisited = vec![key];
    while let Some(key) = unvisited.pop() {
        if !found.insert(key) {
            continue;
        }
        if let Some(declaration) = graph.get(key) {
            unvisited.extend(declaration.dependencies().iter().map(String::as_str));
        }
    }
    found
}

/// Validates a whole graph without running any provider
///
/// Returns a list of all issues: missing dependencies, and cycles unless `cycles_allowed`
pub fn check(graph: &StrictGraph, cycles_allowed: bool) -> Result<(), GraphErrors> {
    let mut checked = HashSet::new();
    let mut errors = Vec::new();
    for (key, declaration) in graph {
        let mut dependency_chain = Vec::new();
        check_recurse(
            graph,
            cycles_allowed,
            &mut checked,
            &mut errors,
            &mut dependency_chain,
            key,
            declaration,
        );
    }

    if !errors.is_empty() {
        return Err(GraphErrors { errors });
    }

    return Ok(());

    fn check_recurse<'a>(
        graph: &'a StrictGraph,
        cycles_allowed: bool,
        checked: &mut HashSet<&'a str>,
        errors: &mut Vec<ResolveError>,
        dependency_chain: &mut Vec<&'a str>,
        key: &'a str,
        declaration: &'a Declaration,
    ) {
        // Circular Dependency Check
        if dependency_chain.contains(&key) {
            if !cycles_allowed {
                let mut path: Vec<String> =
                    dependency_chain.iter().map(|key| key.to_string()).collect();
                path.push(key.to_string()); // Add current so chain is complete
                errors.push(ResolveError::CircularDependency { path });
            }
            return;
        }

        // Skip other checks if already checked
        if !checked.insert(key) {
            return;
        };

        dependency_chain.push(key);

        for dependency in declaration.dependencies() {
            let Some((next_key, next_declaration)) = graph.get_key_value(dependency) else {
                errors.push(ResolveError::MissingDependency {
                    requested_by: Some(key.to_string()),
                    missing: dependency.clone(),
                });
                continue;
            };

            check_recurse(
                graph,
                cycles_allowed,
                checked,
                errors,
                dependency_chain,
                next_key,
                next_declaration,
            );
        }

        dependency_chain.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf() -> Declaration {
        Declaration::from_fn(|| Ok(()))
    }

    fn depends_on(keys: &[&str]) -> Declaration {
        Declaration::new(keys.to_vec(), |_| Ok(()))
    }

    fn graph(entries: Vec<(&str, Declaration)>) -> StrictGraph {
        entries
            .into_iter()
            .map(|(key, declaration)| (key.to_string(), declaration))
            .collect()
    }

    #[test]
    fn ensure_strict_keeps_declarations_and_wraps_values() {
        let declaration = depends_on(&["b"]);
        let mut loose = LooseGraph::new();
        loose.insert("a".into(), declaration.clone().into());
        loose.insert("b".into(), LooseDeclaration::value(20_i32));

        let strict = ensure_strict(loose);
        assert_eq!(strict["a"], declaration);
        assert!(strict["b"].dependencies().is_empty());
    }

    #[test]
    fn child_extends_history() {
        let root = DependencyNode::root("a", depends_on(&["b"]));
        let child = root.child("b", depends_on(&["c"]));

        assert_eq!(child.history, ["a"]);
        assert!(child.on_path("a"));
        assert!(child.on_path("b"));
        assert!(!child.on_path("c"));
        assert_eq!(child.path_to("a"), ["a", "b", "a"]);
    }

    #[test]
    fn tree_leaves_are_zero_dependency_keys() {
        let graph = graph(vec![
            ("a", depends_on(&["b", "c"])),
            ("b", depends_on(&["c"])),
            ("c", leaf()),
        ]);

        let tree = to_tree(&graph);
        assert_eq!(tree.name, "container");
        assert_eq!(tree.children.len(), 3);
        assert_eq!(tree.leaves(), HashSet::from(["c"]));

        let a = &tree.children[0];
        assert_eq!(a.name, "a");
        assert_eq!(a.children[0].children[0].name, "c");
    }

    #[test]
    fn tree_stops_at_back_edges() {
        let graph = graph(vec![("a", depends_on(&["b"])), ("b", depends_on(&["a"]))]);

        let tree = to_tree(&graph);
        let a = &tree.children[0];
        assert_eq!(a.children[0].name, "b");
        assert_eq!(a.children[0].children[0].name, "a");
        assert!(a.children[0].children[0].children.is_empty());
    }

    #[test]
    fn check_reports_all_missing_dependencies() {
        let graph = graph(vec![("a", depends_on(&["x"])), ("b", depends_on(&["y"]))]);

        let errors = check(&graph, true).unwrap_err().errors;
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|error| matches!(
            error,
            ResolveError::MissingDependency { requested_by: Some(_), .. }
        )));
    }

    #[test]
    fn check_reports_cycles_unless_allowed() {
        let graph = graph(vec![
            ("a", depends_on(&["b"])),
            ("b", depends_on(&["c"])),
            ("c", depends_on(&["a"])),
        ]);

        assert!(check(&graph, true).is_ok());

        let errors = check(&graph, false).unwrap_err().errors;
        match errors.as_slice() {
            [ResolveError::CircularDependency { path }] => assert_eq!(path, &["a", "b", "c", "a"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn dependents_are_found_transitively() {
        let graph = graph(vec![
            ("a", depends_on(&["b"])),
            ("b", depends_on(&["c"])),
            ("c", leaf()),
            ("d", leaf()),
        ]);

        assert_eq!(dependents_of(&graph, ["c"]), HashSet::from(["a", "b", "c"]));
        assert_eq!(dependents_of(&graph, ["d"]), HashSet::from(["d"]));
    }

    #[test]
    fn dependencies_are_found_transitively() {
        let graph = graph(vec![
            ("a", depends_on(&["b"])),
            ("b", depends_on(&["c", "a"])),
            ("c", leaf()),
            ("d", depends_on(&["a"])),
        ]);

        assert_eq!(dependencies_of(&graph, "b"), HashSet::from(["a", "b", "c"]));
        assert_eq!(dependencies_of(&graph, "c"), HashSet::from(["c"]));
    }

    #[test]
    fn check_accepts_shared_dependencies() {
        let graph = graph(vec![
            ("a", depends_on(&["b", "c"])),
            ("b", depends_on(&["c"])),
            ("c", leaf()),
        ]);
        assert!(check(&graph, false).is_ok());
    }
}
