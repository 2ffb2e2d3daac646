use std::future::Future;

use crate::{
    container::Container,
    declaration::Declaration,
    dependency_graph::StrictGraph,
    errors::ResolveError,
    options::{ContainerOptions, PartialOptions},
    outcome::Outcome,
    types::{DynError, Injectable, Instance, Resolved},
};

/// Collects declarations and options for a new [Container]
///
/// ```
/// use wrapp_graph::ContainerBuilder;
///
/// let container = ContainerBuilder::new()
///     .add_value("base", 2_i32)
///     .add_provider("double", ["base"], |resolved| Ok(*resolved.get::<i32>(0)? * 2))
///     .build()
///     .unwrap();
///
/// let double = futures::executor::block_on(container.get("double")).unwrap();
/// assert_eq!(*double.downcast::<i32>().unwrap(), 4);
/// ```
pub struct ContainerBuilder {
    /// Registered declarations, in registration order
    declarations: Vec<(String, Declaration)>,
    options: ContainerOptions,
}
impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        ContainerBuilder {
            declarations: Vec::new(),
            options: ContainerOptions::default(),
        }
    }
}
impl ContainerBuilder {
    pub fn add_value<T: Injectable>(self, key: impl Into<String>, value: T) -> Self {
        self.add_declaration(key, Declaration::value(value))
    }

    pub fn add_instance(self, key: impl Into<String>, instance: Instance) -> Self {
        self.add_declaration(key, Declaration::instance(instance))
    }

    pub fn add_provider<T, F>(
        self,
        key: impl Into<String>,
        dependencies: impl IntoIterator<Item = impl Into<String>>,
        provider: F,
    ) -> Self
    where
        T: Injectable,
        F: Fn(&Resolved) -> Result<T, DynError> + Send + Sync + 'static,
    {
        self.add_declaration(key, Declaration::new(dependencies, provider))
    }

    pub fn add_async_provider<T, F, Fut>(
        self,
        key: impl Into<String>,
        dependencies: impl IntoIterator<Item = impl Into<String>>,
        provider: F,
    ) -> Self
    where
        T: Injectable,
        F: Fn(Resolved) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DynError>> + Send + 'static,
    {
        self.add_declaration(key, Declaration::new_async(dependencies, provider))
    }

    pub fn add_declaration(mut self, key: impl Into<String>, declaration: Declaration) -> Self {
        self.declarations.push((key.into(), declaration));
        self
    }

    pub fn options(mut self, partial: PartialOptions) -> Self {
        self.options = self.options.merged(partial);
        self
    }

    /// Builds the container
    ///
    /// Registering a key twice fails if `fail_on_clobber` is set, otherwise the last one wins.
    pub fn build(self) -> Outcome<Container> {
        let ContainerBuilder {
            declarations,
            options,
        } = self;

        let mut graph = StrictGraph::new();
        for (key, declaration) in declarations {
            if graph.contains_key(&key) && options.fail_on_clobber {
                return Err(ResolveError::KeyClobber { key });
            }
            graph.insert(key, declaration);
        }

        Ok(Container::with_options(graph, options))
    }
}
