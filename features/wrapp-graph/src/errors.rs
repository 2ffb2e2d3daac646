use std::sync::Arc;

use thiserror::Error;

use crate::types::DynError;

/// Failures of graph resolution and graph manipulation
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// A requested or transitively required key has no declaration
    #[error("{}", missing_message(.requested_by, .missing))]
    MissingDependency {
        /// Key which required the missing one, `None` if it was requested directly
        requested_by: Option<String>,
        missing: String,
    },
    /// A cycle was found while cycle handling is disabled
    #[error("Circular dependency through {}", join_path(.path))]
    CircularDependency {
        /// Path from the root to the repeated key
        path: Vec<String>,
    },
    /// A merge would overwrite an existing key
    #[error("'{key}' overloaded by merging graph")]
    KeyClobber { key: String },
    /// An indirection was pointed at something which can't stand in for a value
    #[error("Invalid proxy target: {reason}")]
    InvalidProxyTarget { reason: String },
    /// A provider failed - the provider's error is kept as is
    #[error("{0}")]
    Provider(Arc<DynError>),
}

impl ResolveError {
    /// The unmodified error returned by a provider, if that is what failed
    pub fn provider_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            ResolveError::Provider(error) => Some(&***error),
            _ => None,
        }
    }
}

fn missing_message(requested_by: &Option<String>, missing: &str) -> String {
    match requested_by {
        Some(requested_by) => format!("'{requested_by}' required missing dependency '{missing}'"),
        None => format!("Graph does not contain key '{missing}'"),
    }
}

fn join_path(path: &[String]) -> String {
    path.join(" -> ")
}

/// Errors when reading a value out of an [Instance](crate::types::Instance)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
    /// Read through a circular dependency placeholder before its target was set
    #[error("Placeholder accessed before forwarding was configured - circular dependencies can only be read after resolution")]
    Unresolved,
    #[error("Dependency {index} requested, but only {len} were declared")]
    OutOfRange { index: usize, len: usize },
}

/// All issues found when checking a whole graph
#[derive(Error, Debug, Clone)]
pub struct GraphErrors {
    pub errors: Vec<ResolveError>,
}
impl std::fmt::Display for GraphErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The dependency graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}
