use std::{fmt::Debug, future::Future, sync::Arc};

use futures::{future, future::BoxFuture, FutureExt};

use crate::types::{DynError, Injectable, Instance, Resolved};

/// Type erased provider, builds a value from the resolved dependencies
pub type ProviderFn =
    dyn Fn(Resolved) -> BoxFuture<'static, Result<Instance, DynError>> + Send + Sync;

/// Recipe for one named component of the graph
///
/// Holds the keys it depends on, in the order the provider receives them, and the provider itself.
/// Dependency keys must be unique within one declaration.
/// Cloning is cheap, the provider is shared.
#[derive(Clone)]
pub struct Declaration {
    dependencies: Vec<String>,
    provider: Arc<ProviderFn>,
}
impl Debug for Declaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Declaration")
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}
/// Declarations are equal if they have the same dependencies and share the same provider
impl PartialEq for Declaration {
    fn eq(&self, other: &Self) -> bool {
        self.dependencies == other.dependencies
            && Arc::as_ptr(&self.provider) as *const () == Arc::as_ptr(&other.provider) as *const ()
    }
}

impl Declaration {
    /// Declares an existing value
    pub fn value<T: Injectable>(value: T) -> Self {
        Self::instance(Instance::new(value))
    }

    /// Declares an existing instance, every resolution yields a clone of it
    pub fn instance(instance: Instance) -> Self {
        Self::from_provider(Vec::<String>::new(), move |_| {
            future::ready(Ok(instance.clone())).boxed()
        })
    }

    /// Declares a synchronous provider without dependencies
    pub fn from_fn<T, F>(provider: F) -> Self
    where
        T: Injectable,
        F: Fn() -> Result<T, DynError> + Send + Sync + 'static,
    {
        Self::new(Vec::<String>::new(), move |_| provider())
    }

    /// Declares a synchronous provider
    pub fn new<T, F>(dependencies: impl IntoIterator<Item = impl Into<String>>, provider: F) -> Self
    where
        T: Injectable,
        F: Fn(&Resolved) -> Result<T, DynError> + Send + Sync + 'static,
    {
        Self::from_provider(dependencies, move |resolved| {
            future::ready(provider(&resolved).map(Instance::new)).boxed()
        })
    }

    /// Declares an asynchronous provider
    pub fn new_async<T, F, Fut>(
        dependencies: impl IntoIterator<Item = impl Into<String>>,
        provider: F,
    ) -> Self
    where
        T: Injectable,
        F: Fn(Resolved) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DynError>> + Send + 'static,
    {
        Self::from_provider(dependencies, move |resolved| {
            provider(resolved)
                .map(|result| result.map(Instance::new))
                .boxed()
        })
    }

    /// Declares a provider working on [Instance]s directly
    ///
    /// Allows returning one of the dependencies as is.
    pub fn from_provider<F>(
        dependencies: impl IntoIterator<Item = impl Into<String>>,
        provider: F,
    ) -> Self
    where
        F: Fn(Resolved) -> BoxFuture<'static, Result<Instance, DynError>> + Send + Sync + 'static,
    {
        Declaration {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            provider: Arc::new(provider),
        }
    }

    /// Keys this declaration depends on, in call order
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Invokes the provider
    pub(crate) fn provide(&self, resolved: Resolved) -> BoxFuture<'static, Result<Instance, DynError>> {
        (self.provider)(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_provider_receives_dependencies_in_order() {
        let declaration = Declaration::new(["b", "c"], |resolved| {
            Ok(*resolved.get::<i32>(0)? * 10 + *resolved.get::<i32>(1)?)
        });
        assert_eq!(declaration.dependencies(), ["b", "c"]);

        let resolved = Resolved::new(vec![Instance::new(1_i32), Instance::new(2_i32)]);
        let value = futures::executor::block_on(declaration.provide(resolved)).unwrap();
        assert_eq!(*value.downcast::<i32>().unwrap(), 12);
    }

    #[test]
    fn value_declarations_share_the_instance() {
        let declaration = Declaration::value(String::from("shared"));
        let first = futures::executor::block_on(declaration.provide(Resolved::new(vec![]))).unwrap();
        let second = futures::executor::block_on(declaration.provide(Resolved::new(vec![]))).unwrap();
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn equality_is_by_provider_identity() {
        let declaration = Declaration::from_fn(|| Ok(1_u8));
        assert_eq!(declaration, declaration.clone());
        assert_ne!(declaration, Declaration::from_fn(|| Ok(1_u8)));
    }

    #[test]
    fn provider_errors_are_returned() {
        let declaration = Declaration::from_fn::<u8, _>(|| Err("nope".into()));
        let error = futures::executor::block_on(declaration.provide(Resolved::new(vec![])))
            .unwrap_err();
        assert_eq!(error.to_string(), "nope");
    }
}
