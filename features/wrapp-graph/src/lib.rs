//! Wrapp Graph lazily builds a graph of named components from their declarations.
//!
//! Every component is declared under a key, either as a plain value or as a provider together with
//! the keys it depends on. Requesting a key from the [Container] builds it and all of its
//! dependencies, each at most once, awaiting asynchronous providers as needed.
//!
//! Circular dependencies are tolerated by default: a component which depends on something still
//! being built receives a placeholder [Instance] instead. The placeholder forwards to the real
//! value once the whole graph has settled, so it may be stored but must not be read during
//! construction.
//!
//! # Examples
//!
//! ```rust
//! use wrapp_graph::{Container, Declaration, DynError, StrictGraph};
//!
//! let mut graph = StrictGraph::new();
//! graph.insert("port".to_string(), Declaration::value(8080_u16));
//! graph.insert(
//!     "address".to_string(),
//!     Declaration::new(["port"], |resolved| {
//!         Ok(format!("localhost:{}", resolved.get::<u16>(0)?))
//!     }),
//! );
//!
//! let container = Container::new(graph);
//! let address = futures::executor::block_on(container.get("address")).unwrap();
//! assert_eq!(*address.downcast::<String>().unwrap(), "localhost:8080");
//! ```
//!
//! Wrapp Graph consists of the following components:
//!
//! 1. Declaration - recipes for components and the graph they form
//! 2. Resolver - walks the graph and memoizes the futures of every component
//! 3. Proxy - placeholders standing in for circular dependencies
//! 4. Container - owns a graph, its memoized values and options
//! 5. Errors & Outcome - failures of resolution and merges

pub mod builder;
pub mod container;
pub mod declaration;
pub mod dependency_graph;
pub mod errors;
pub mod options;
pub mod outcome;
pub mod proxy;
pub mod resolver;
pub mod types;

pub use builder::ContainerBuilder;
pub use container::Container;
pub use declaration::Declaration;
pub use dependency_graph::{
    ensure_strict, DependencyNode, LooseDeclaration, LooseGraph, StrictGraph, TreeNode,
};
pub use errors::{AccessError, GraphErrors, ResolveError};
pub use options::{ContainerOptions, PartialOptions};
pub use outcome::{make_outcome, OrThrow, Outcome};
pub use proxy::{proxify, ProxyController, Proxify};
pub use types::{DynError, Injectable, Instance, Resolved};
