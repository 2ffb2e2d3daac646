use std::{
    any::{type_name, Any},
    fmt::Debug,
    sync::Arc,
};

use crate::{errors::AccessError, proxy::ProxyCell};

/// All errors must be Send + Sync so resolution futures can move between threads
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// We assume that we are using a multithreaded async runtime
/// So anything stored in the graph needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// A resolved component of the graph
///
/// Either a concrete value, or an indirection standing in for a value which was
/// still being built when a circular dependency was found.
/// Cloning an [Instance] is cheap, all clones point to the same value.
#[derive(Clone)]
pub struct Instance {
    slot: Slot,
}

#[derive(Clone)]
enum Slot {
    Value {
        type_name: &'static str,
        value: Arc<dyn Any + Send + Sync + 'static>,
    },
    Indirect(Arc<ProxyCell>),
}

impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.slot {
            Slot::Value { type_name, .. } => f.debug_tuple("Instance").field(type_name).finish(),
            Slot::Indirect(cell) => f
                .debug_tuple("Indirection")
                .field(&cell.target().map(|target| target.type_name()))
                .finish(),
        }
    }
}

impl Instance {
    pub fn new<T: Injectable>(value: T) -> Self {
        Instance {
            slot: Slot::Value {
                type_name: type_name::<T>(),
                value: Arc::new(value),
            },
        }
    }

    /// Wraps an already shared value without allocating again
    pub fn from_arc<T: Injectable>(value: Arc<T>) -> Self {
        Instance {
            slot: Slot::Value {
                type_name: type_name::<T>(),
                value,
            },
        }
    }

    pub(crate) fn indirect(cell: Arc<ProxyCell>) -> Self {
        Instance {
            slot: Slot::Indirect(cell),
        }
    }

    /// Attempts to access the value as `T`
    ///
    /// Indirections are followed to their current target.
    /// Fails with [AccessError::Unresolved] if an indirection has no target yet.
    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, AccessError> {
        let (actual_type, value) = self.concrete()?;
        Arc::downcast::<T>(value).map_err(|_| AccessError::DowncastFailed {
            required_type: type_name::<T>(),
            actual_type,
        })
    }

    /// Name of the concrete type behind this instance
    pub fn type_name(&self) -> &'static str {
        match self.concrete() {
            Ok((type_name, _)) => type_name,
            Err(_) => "<unresolved indirection>",
        }
    }

    /// True if this instance is a stand-in for a circular dependency
    pub fn is_indirection(&self) -> bool {
        matches!(self.slot, Slot::Indirect(_))
    }

    /// True if both instances end up at the same value
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        match (self.concrete(), other.concrete()) {
            (Ok((_, a)), Ok((_, b))) => Arc::ptr_eq(&a, &b),
            _ => false,
        }
    }

    /// Single dereference point for all reads - follows indirections until a value is found
    fn concrete(&self) -> Result<(&'static str, Arc<dyn Any + Send + Sync + 'static>), AccessError> {
        let mut current = self.clone();
        loop {
            match current.slot {
                Slot::Value { type_name, value } => return Ok((type_name, value)),
                Slot::Indirect(cell) => match cell.target() {
                    Some(next) => current = next,
                    None => return Err(AccessError::Unresolved),
                },
            }
        }
    }

    /// True if following this instance passes through the given cell
    pub(crate) fn forwards_to(&self, cell: &Arc<ProxyCell>) -> bool {
        let mut current = self.clone();
        loop {
            match current.slot {
                Slot::Value { .. } => return false,
                Slot::Indirect(next_cell) => {
                    if Arc::ptr_eq(&next_cell, cell) {
                        return true;
                    }
                    match next_cell.target() {
                        Some(next) => current = next,
                        None => return false,
                    }
                }
            }
        }
    }
}

/// The resolved values of a declaration's dependencies, in declaration order
#[derive(Clone, Debug)]
pub struct Resolved {
    values: Vec<Instance>,
}

impl Resolved {
    pub(crate) fn new(values: Vec<Instance>) -> Self {
        Self { values }
    }

    /// Typed access to the dependency at `index`
    ///
    /// Must not be used on a circular dependency during construction, store the
    /// [Instance] from [Resolved::instance] instead and read it later.
    pub fn get<T: Injectable>(&self, index: usize) -> Result<Arc<T>, AccessError> {
        self.instance(index)?.downcast()
    }

    pub fn instance(&self, index: usize) -> Result<&Instance, AccessError> {
        self.values.get(index).ok_or(AccessError::OutOfRange {
            index,
            len: self.values.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.values.iter()
    }

    pub fn into_inner(self) -> Vec<Instance> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_to_stored_type() {
        let instance = Instance::new(5_u32);
        assert_eq!(*instance.downcast::<u32>().unwrap(), 5);
        assert_eq!(instance.type_name(), "u32");
    }

    #[test]
    fn downcast_to_wrong_type_names_both() {
        let instance = Instance::new("text".to_string());
        match instance.downcast::<u32>() {
            Err(AccessError::DowncastFailed {
                required_type,
                actual_type,
            }) => {
                assert_eq!(required_type, "u32");
                assert_eq!(actual_type, "alloc::string::String");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn clones_share_the_value() {
        let instance = Instance::new(vec![1, 2, 3]);
        let clone = instance.clone();
        assert!(instance.ptr_eq(&clone));
        assert!(!instance.ptr_eq(&Instance::new(vec![1, 2, 3])));
    }

    #[test]
    fn resolved_reports_out_of_range() {
        let resolved = Resolved::new(vec![Instance::new(1_i32)]);
        assert_eq!(*resolved.get::<i32>(0).unwrap(), 1);
        assert!(matches!(
            resolved.get::<i32>(3),
            Err(AccessError::OutOfRange { index: 3, len: 1 })
        ));
    }
}
