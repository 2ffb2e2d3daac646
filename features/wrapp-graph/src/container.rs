use std::{
    collections::HashMap,
    fmt::Debug,
    future::IntoFuture,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use futures::{
    future::{self, BoxFuture},
    FutureExt,
};

use crate::{
    dependency_graph::{self, ensure_strict, LooseGraph, StrictGraph, TreeNode},
    errors::{GraphErrors, ResolveError},
    options::{ContainerOptions, PartialOptions},
    outcome::Outcome,
    resolver::{resolve, GraphLookup, ProxyPatch, SharedValue},
    types::Instance,
};

/// Container owning a graph and the memoized values of its keys
///
/// Values are built lazily on first request and never built twice by the same container.
/// Clones share the same graph, values and options.
#[derive(Clone)]
pub struct Container(pub Arc<ContainerInner>);
pub struct ContainerInner {
    graph: StrictGraph,
    cache: Mutex<GraphLookup>,
    /// Circular dependencies whose redirection may still be in flight, always locked after `cache`
    patches: Mutex<Vec<ProxyPatch>>,
    options: RwLock<ContainerOptions>,
    /// Options the container was created with, restored by [Container::reset_options]
    initial_options: ContainerOptions,
}
impl Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.cache();
        let mut map = f.debug_struct("Container");
        for key in self.0.graph.keys() {
            let state = match cache.get(key).map(|value| value.peek()) {
                None => "unresolved",
                Some(None) => "pending",
                Some(Some(Ok(_))) => "resolved",
                Some(Some(Err(_))) => "failed",
            };
            map.field(key, &state);
        }
        map.finish()
    }
}

impl Container {
    pub fn new(graph: StrictGraph) -> Self {
        Self::with_options(graph, ContainerOptions::default())
    }

    pub fn with_options(graph: StrictGraph, options: ContainerOptions) -> Self {
        Self::from_parts(graph, options, GraphLookup::new(), Vec::new())
    }

    /// Creates a container from a graph which may contain plain values
    pub fn from_loose(graph: LooseGraph) -> Self {
        Self::new(ensure_strict(graph))
    }

    pub(crate) fn from_parts(
        graph: StrictGraph,
        options: ContainerOptions,
        cache: GraphLookup,
        patches: Vec<ProxyPatch>,
    ) -> Self {
        tracing::debug!(
            "Creating container with {} declarations, {} already resolved",
            graph.len(),
            cache.len()
        );
        Self(Arc::new(ContainerInner {
            graph,
            cache: Mutex::new(cache),
            patches: Mutex::new(patches),
            options: RwLock::new(options.clone()),
            initial_options: options,
        }))
    }

    /// Resolves the value of `key`, building it and its dependencies if needed
    ///
    /// Circular dependencies are redirected to their real values before this returns, also when
    /// another caller started resolving them.
    pub async fn get(&self, key: &str) -> Result<Instance, ResolveError> {
        let (value, patches) = self.prepare(key)?;

        if !patches.is_empty() {
            tracing::debug!(
                "Waiting for {} circular dependencies of '{key}' to be redirected",
                patches.len()
            );
            // A failed redirection also fails every key depending on it, reported below
            future::join_all(patches.iter().map(ProxyPatch::redirected)).await;
        }

        value.await
    }

    /// Resolves several keys, fails with the first failure
    pub async fn get_some(&self, keys: &[&str]) -> Result<HashMap<String, Instance>, ResolveError> {
        let values = future::try_join_all(keys.iter().map(|key| self.get(key))).await?;
        Ok(keys.iter().map(|key| key.to_string()).zip(values).collect())
    }

    /// Resolves every key of the graph
    pub async fn get_all(&self) -> Result<HashMap<String, Instance>, ResolveError> {
        let keys: Vec<&str> = self.0.graph.keys().map(String::as_str).collect();
        self.get_some(&keys).await
    }

    /// Merges a loose graph into a new container, see [Container::merge_strict]
    pub fn merge(&self, other: LooseGraph) -> Outcome<Container> {
        self.merge_strict(ensure_strict(other))
    }

    /// Creates a new container holding the declarations of both graphs
    ///
    /// If `fail_on_clobber` is set, a key present in both fails the merge. Otherwise `other` wins.
    /// The new container starts with the values this container resolved so far, except for
    /// overwritten keys and everything depending on them.
    pub fn merge_strict(&self, other: StrictGraph) -> Outcome<Container> {
        let options = self.options();
        let mut graph = self.0.graph.clone();
        let mut overwritten = Vec::new();

        for (key, declaration) in other {
            if graph.contains_key(&key) {
                if options.fail_on_clobber {
                    tracing::warn!("Merge would overwrite '{key}'");
                    return Err(ResolveError::KeyClobber { key });
                }
                overwritten.push(key.clone());
            }
            graph.insert(key, declaration);
        }

        let mut cache = self.cache().clone();
        let mut patches = self.pending_patches().clone();
        if !overwritten.is_empty() {
            let stale =
                dependency_graph::dependents_of(&self.0.graph, overwritten.iter().map(String::as_str));
            tracing::debug!("Merge overwrote {:?}, dropping {} memoized values", overwritten, stale.len());
            cache.retain(|key, _| !stale.contains(key.as_str()));
            patches.retain(|patch| !stale.contains(patch.node.key.as_str()));
        }

        Ok(Container::from_parts(graph, options, cache, patches))
    }

    /// Overrides the given options for subsequent calls
    pub fn set_options(&self, partial: PartialOptions) -> &Self {
        let mut options = self
            .0
            .options
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *options = options.clone().merged(partial);
        self
    }

    /// Reverts to the options the container was created with
    pub fn reset_options(&self) -> &Self {
        *self
            .0
            .options
            .write()
            .unwrap_or_else(PoisonError::into_inner) = self.0.initial_options.clone();
        self
    }

    /// Currently effective options
    pub fn options(&self) -> ContainerOptions {
        self.0
            .options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// A copy of the graph
    pub fn get_graph(&self) -> StrictGraph {
        self.0.graph.clone()
    }

    pub fn graph(&self) -> &StrictGraph {
        &self.0.graph
    }

    /// The declared dependency structure as a tree
    pub fn get_tree(&self) -> TreeNode {
        dependency_graph::to_tree(&self.0.graph)
    }

    /// Checks the whole graph for missing dependencies, and for cycles if they are not handled
    pub fn check(&self) -> Result<(), GraphErrors> {
        let cycles_allowed = self.options().handle_circular.is_some();
        dependency_graph::check(&self.0.graph, cycles_allowed)
    }

    /// Looks up the future of `key`, running a resolution pass if it is not known yet
    ///
    /// Also returns the unsettled redirections among `key` and its dependencies, whichever
    /// call created them.
    fn prepare(&self, key: &str) -> Result<(SharedValue, Vec<ProxyPatch>), ResolveError> {
        if !self.0.graph.contains_key(key) {
            return Err(ResolveError::MissingDependency {
                requested_by: None,
                missing: key.to_string(),
            });
        }

        let options = self.options();
        let mut cache = self.cache();
        let value = match cache.get(key) {
            Some(value) => value.clone(),
            None => {
                let created = resolve(
                    key,
                    &self.0.graph,
                    &mut cache,
                    options.handle_circular.as_ref(),
                    &options.post_process,
                )?;
                self.pending_patches().extend(created);

                match cache.get(key) {
                    Some(value) => value.clone(),
                    None => {
                        return Err(ResolveError::MissingDependency {
                            requested_by: None,
                            missing: key.to_string(),
                        })
                    }
                }
            }
        };

        let mut pending = self.pending_patches();
        pending.retain(|patch| !patch.is_settled());
        if pending.is_empty() {
            return Ok((value, Vec::new()));
        }

        let related = dependency_graph::dependencies_of(&self.0.graph, key);
        let patches = pending
            .iter()
            .filter(|patch| related.contains(patch.node.key.as_str()))
            .cloned()
            .collect();
        Ok((value, patches))
    }

    fn cache(&self) -> MutexGuard<'_, GraphLookup> {
        self.0.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_patches(&self) -> MutexGuard<'_, Vec<ProxyPatch>> {
        self.0.patches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Awaiting a container resolves all of its keys
impl<'a> IntoFuture for &'a Container {
    type Output = Result<HashMap<String, Instance>, ResolveError>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.get_all().boxed()
    }
}
