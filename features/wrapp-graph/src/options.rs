use std::{fmt::Debug, sync::Arc};

use crate::{
    dependency_graph::DependencyNode,
    proxy::{default_proxify, Proxify},
    resolver::{identity_post_process, PostProcess},
    types::Instance,
};

/// Options used by a [Container](crate::container::Container)
#[derive(Clone)]
pub struct ContainerOptions {
    /// Fail merges which would overwrite an existing key
    pub fail_on_clobber: bool,
    /// Indirection factory used to break cycles, `None` turns cycles into failures
    pub handle_circular: Option<Proxify>,
    /// Called with every value after its provider settled
    pub post_process: PostProcess,
}
impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            fail_on_clobber: true,
            handle_circular: Some(default_proxify()),
            post_process: identity_post_process(),
        }
    }
}
impl Debug for ContainerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerOptions")
            .field("fail_on_clobber", &self.fail_on_clobber)
            .field("handle_circular", &self.handle_circular.is_some())
            .finish_non_exhaustive()
    }
}
impl ContainerOptions {
    /// Returns these options with every field set in `partial` replaced
    pub fn merged(mut self, partial: PartialOptions) -> Self {
        let PartialOptions {
            fail_on_clobber,
            handle_circular,
            post_process,
        } = partial;

        if let Some(fail_on_clobber) = fail_on_clobber {
            self.fail_on_clobber = fail_on_clobber;
        }
        if let Some(handle_circular) = handle_circular {
            self.handle_circular = handle_circular;
        }
        if let Some(post_process) = post_process {
            self.post_process = post_process;
        }
        self
    }
}

/// A set of option overrides, unset fields keep their current value
#[derive(Clone, Default)]
pub struct PartialOptions {
    pub fail_on_clobber: Option<bool>,
    pub handle_circular: Option<Option<Proxify>>,
    pub post_process: Option<PostProcess>,
}
impl PartialOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on_clobber(mut self, fail_on_clobber: bool) -> Self {
        self.fail_on_clobber = Some(fail_on_clobber);
        self
    }

    /// Break cycles with indirections from the given factory
    pub fn handle_circular(mut self, proxify: Proxify) -> Self {
        self.handle_circular = Some(Some(proxify));
        self
    }

    /// Fail on cycles instead of breaking them
    pub fn disable_circular(mut self) -> Self {
        self.handle_circular = Some(None);
        self
    }

    pub fn post_process<F>(mut self, post_process: F) -> Self
    where
        F: Fn(&DependencyNode, Instance) -> Instance + Send + Sync + 'static,
    {
        self.post_process = Some(Arc::new(post_process));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ContainerOptions::default();
        assert!(options.fail_on_clobber);
        assert!(options.handle_circular.is_some());
    }

    #[test]
    fn merge_only_replaces_given_fields() {
        let options = ContainerOptions::default().merged(PartialOptions::new().disable_circular());
        assert!(options.fail_on_clobber);
        assert!(options.handle_circular.is_none());

        let options = options.merged(PartialOptions::new().fail_on_clobber(false));
        assert!(!options.fail_on_clobber);
        assert!(options.handle_circular.is_none());
    }
}
