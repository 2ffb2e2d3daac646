//! Stand-ins for circular dependencies
//!
//! When the resolver finds a dependency which is still being built further up the current path,
//! it hands out an indirection instead of waiting for it. The indirection is an [Instance] which
//! forwards every read to whatever its cell currently holds. Once the real value is built the
//! resolver points the cell at it.
//!
//! A consumer receiving an indirection may store it, but must not read through it while it is
//! being constructed - the target is only installed after the whole graph settled.

use std::{
    fmt::Debug,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{errors::ResolveError, outcome::Outcome, types::Instance};

/// Factory creating indirections, `seed` is the initial target if any
pub type Proxify = Arc<dyn Fn(Option<Instance>) -> ProxyController + Send + Sync>;

/// The default indirection factory
pub fn default_proxify() -> Proxify {
    Arc::new(proxify)
}

/// Creates a new indirection, optionally already forwarding to `seed`
pub fn proxify(seed: Option<Instance>) -> ProxyController {
    let cell = Arc::new(ProxyCell {
        target: RwLock::new(seed),
    });
    ProxyController { cell }
}

/// Holds the current forwarding target of one indirection
pub(crate) struct ProxyCell {
    target: RwLock<Option<Instance>>,
}
impl ProxyCell {
    pub(crate) fn target(&self) -> Option<Instance> {
        self.target
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Owner of an indirection, allows redirecting it to its real target
#[derive(Clone)]
pub struct ProxyController {
    cell: Arc<ProxyCell>,
}
impl Debug for ProxyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyController")
            .field("target", &self.cell.target())
            .finish()
    }
}

impl ProxyController {
    /// Handle usable wherever the real value would be used
    pub fn handle(&self) -> Instance {
        Instance::indirect(self.cell.clone())
    }

    /// Points the indirection at `target`
    ///
    /// Fails if `target` forwards back into this indirection, as reads would never reach a value
    pub fn set_target(&self, target: Instance) -> Outcome<()> {
        if target.forwards_to(&self.cell) {
            return Err(ResolveError::InvalidProxyTarget {
                reason: "target forwards back to the indirection itself".to_string(),
            });
        }

        *self
            .cell
            .target
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(target);
        Ok(())
    }

    pub fn is_set(&self) -> bool {
        self.cell.target().is_some()
    }
}
