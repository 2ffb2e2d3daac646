//! Resolution of a single key and everything it transitively depends on
//!
//! The graph is walked iteratively with an explicit stack instead of recursion. A node whose
//! dependencies are all known is turned into a future right away, otherwise it is deferred and
//! its missing dependencies are pushed. Deferred nodes are replayed in reverse order once the
//! stack is empty, at which point all their dependencies are known.
//!
//! All cache mutations happen synchronously inside [resolve]. Providers only run once the
//! stored futures are polled.

use std::{collections::HashMap, sync::Arc};

use futures::{
    future::{self, BoxFuture, Shared},
    FutureExt,
};

use crate::{
    dependency_graph::{DependencyNode, StrictGraph},
    errors::ResolveError,
    outcome::Outcome,
    proxy::{ProxyController, Proxify},
    types::{Instance, Resolved},
};

/// Pending or settled value of one key, shared by everyone waiting on it
pub type SharedValue = Shared<BoxFuture<'static, Result<Instance, ResolveError>>>;

/// Memoization cache - key to its (possibly pending) value
pub type GraphLookup = HashMap<String, SharedValue>;

/// Hook called with every value right after its provider settled, before it is cached
pub type PostProcess = Arc<dyn Fn(&DependencyNode, Instance) -> Instance + Send + Sync>;

/// Post process which leaves values untouched
pub fn identity_post_process() -> PostProcess {
    Arc::new(|_, value| value)
}

/// An indirection created for a circular dependency, and the node it stands in for
#[derive(Clone)]
pub struct ProxyPatch {
    pub node: DependencyNode,
    pub controller: ProxyController,
    resolved: SharedValue,
}
impl ProxyPatch {
    /// Completes once the indirection was redirected to the real value
    pub fn redirected(&self) -> BoxFuture<'static, Result<(), ResolveError>> {
        self.resolved.clone().map(|result| result.map(|_| ())).boxed()
    }

    /// True once the real value settled and the indirection was redirected, or failed to be
    pub fn is_settled(&self) -> bool {
        self.resolved.peek().is_some()
    }
}

/// Resolves `root_key`, storing the futures of it and all its missing dependencies in `cache`
///
/// With `handle_circular` set, cycles are broken with indirections which are returned as patches,
/// they are redirected to their real values as soon as those settle. Without it cycles fail.
///
/// On failure `cache` is left as it was before the call.
pub fn resolve(
    root_key: &str,
    graph: &StrictGraph,
    cache: &mut GraphLookup,
    handle_circular: Option<&Proxify>,
    post_process: &PostProcess,
) -> Outcome<Vec<ProxyPatch>> {
    let Some(root_declaration) = graph.get(root_key) else {
        return Err(ResolveError::MissingDependency {
            requested_by: None,
            missing: root_key.to_string(),
        });
    };

    let mut pass = Pass {
        graph,
        cache,
        handle_circular,
        post_process,
        placeholders: HashMap::new(),
        controllers: Vec::new(),
        inserted: Vec::new(),
    };

    match pass.run(DependencyNode::root(root_key, root_declaration.clone())) {
        Ok(()) => Ok(pass.into_patches()),
        Err(error) => {
            tracing::debug!("Resolution of '{root_key}' failed: {error}");
            pass.rollback();
            Err(error)
        }
    }
}

/// State of one resolution pass
struct Pass<'a> {
    graph: &'a StrictGraph,
    cache: &'a mut GraphLookup,
    handle_circular: Option<&'a Proxify>,
    post_process: &'a PostProcess,
    /// Indirections standing in for keys which are still being resolved
    placeholders: GraphLookup,
    controllers: Vec<(DependencyNode, ProxyController)>,
    /// Keys added to the cache during this pass
    inserted: Vec<String>,
}

impl Pass<'_> {
    fn run(&mut self, root: DependencyNode) -> Outcome<()> {
        tracing::debug!("Resolving '{}'", root.key);

        let graph = self.graph;
        let mut unvisited = vec![root];
        let mut deferred = Vec::new();

        while let Some(current) = unvisited.pop() {
            // Reached through another branch already
            if self.lookup(&current.key).is_some() {
                continue;
            }

            if current.dependencies().is_empty() {
                let value = provide(current.clone(), Vec::new(), self.post_process.clone()).boxed();
                self.store(current.key, value);
                continue;
            }

            let missing = match self.try_fulfill(&current) {
                Ok(value) => {
                    self.store(current.key, value);
                    continue;
                }
                Err(missing) => missing,
            };

            tracing::trace!("Deferring '{}', waiting for {:?}", current.key, missing);
            for dependency in missing {
                let Some(declaration) = graph.get(&dependency) else {
                    return Err(ResolveError::MissingDependency {
                        requested_by: Some(current.key.clone()),
                        missing: dependency,
                    });
                };

                if current.on_path(&dependency) {
                    let Some(proxify) = self.handle_circular else {
                        return Err(ResolveError::CircularDependency {
                            path: current.path_to(&dependency),
                        });
                    };

                    // Listed twice by the same declaration
                    if self.lookup(&dependency).is_some() {
                        continue;
                    }

                    tracing::debug!(
                        "'{}' has circular dependency '{}' - using a placeholder",
                        current.key,
                        dependency
                    );
                    let controller = proxify(None);
                    let handle = future::ready(Ok(controller.handle())).boxed().shared();
                    self.placeholders.insert(dependency.clone(), handle);
                    self.controllers
                        .push((current.child(dependency, declaration.clone()), controller));
                    continue;
                }

                unvisited.push(current.child(dependency, declaration.clone()));
            }
            deferred.push(current);
        }

        // Every dependency of a deferred node is now either cached or a placeholder
        while let Some(current) = deferred.pop() {
            if self.cache.contains_key(&current.key) {
                continue;
            }

            let value = match self.try_fulfill(&current) {
                Ok(value) => value,
                Err(missing) => {
                    return Err(ResolveError::MissingDependency {
                        requested_by: Some(current.key.clone()),
                        missing: missing.into_iter().next().unwrap_or_default(),
                    })
                }
            };

            let value = match self.controller_for(&current.key) {
                Some(controller) => redirect(current.key.clone(), value, controller),
                None => value,
            };
            self.store(current.key, value);
        }

        tracing::debug!(
            "Resolution pass done - {} new, {} circular",
            self.inserted.len(),
            self.controllers.len()
        );
        Ok(())
    }

    /// Builds the future of a node if all its dependencies are known,
    /// returns the unknown dependencies otherwise
    fn try_fulfill(
        &self,
        node: &DependencyNode,
    ) -> Result<BoxFuture<'static, Result<Instance, ResolveError>>, Vec<String>> {
        let mut unfulfillable = Vec::new();
        let mut active = Vec::new();

        for key in node.dependencies() {
            match self.lookup(key) {
                Some(value) => active.push(value.clone()),
                None => unfulfillable.push(key.clone()),
            }
        }

        if !unfulfillable.is_empty() {
            return Err(unfulfillable);
        }

        let node = node.clone();
        let post_process = self.post_process.clone();
        Ok(async move {
            let values = future::try_join_all(active).await?;
            provide(node, values, post_process).await
        }
        .boxed())
    }

    fn lookup(&self, key: &str) -> Option<&SharedValue> {
        self.cache.get(key).or_else(|| self.placeholders.get(key))
    }

    fn controller_for(&self, key: &str) -> Option<ProxyController> {
        self.controllers
            .iter()
            .find(|(node, _)| node.key == key)
            .map(|(_, controller)| controller.clone())
    }

    fn store(&mut self, key: String, value: BoxFuture<'static, Result<Instance, ResolveError>>) {
        self.cache.insert(key.clone(), value.shared());
        self.inserted.push(key);
    }

    fn rollback(self) {
        for key in self.inserted {
            self.cache.remove(&key);
        }
    }

    fn into_patches(self) -> Vec<ProxyPatch> {
        let cache = self.cache;
        self.controllers
            .into_iter()
            .filter_map(|(node, controller)| {
                let resolved = cache.get(&node.key)?.clone();
                Some(ProxyPatch {
                    node,
                    controller,
                    resolved,
                })
            })
            .collect()
    }
}

/// Invokes the provider of `node` and post processes its value
///
/// Provider errors are passed on untouched.
async fn provide(
    node: DependencyNode,
    values: Vec<Instance>,
    post_process: PostProcess,
) -> Result<Instance, ResolveError> {
    tracing::trace!("Invoking provider of '{}'", node.key);
    let value = node
        .declaration
        .provide(Resolved::new(values))
        .await
        .map_err(|error| ResolveError::Provider(Arc::new(error)))?;

    tracing::debug!("Constructed '{}' as {}", node.key, value.type_name());
    Ok(post_process(&node, value))
}

/// Points `controller` at the value once it settled
fn redirect(
    key: String,
    value: BoxFuture<'static, Result<Instance, ResolveError>>,
    controller: ProxyController,
) -> BoxFuture<'static, Result<Instance, ResolveError>> {
    async move {
        let instance = value.await?;
        controller.set_target(instance.clone())?;
        tracing::debug!("Redirected placeholder of '{key}'");
        Ok(instance)
    }
    .boxed()
}
