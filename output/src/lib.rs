//! Deferred values ("outputs") for infrastructure programs.
//!
//! An output stands in for a value that isn't known until some remote
//! operation completes, e.g. the id a cloud provider assigns to a new resource.
//! Outputs can be transformed with `apply` and joined with [`all`] before their
//! values exist; every derived output remembers the set of resources
//! it depends on, so consumers can order their work accordingly.
//!
//! An output settles exactly once, to one of:
//! - a known value,
//! - an unknown value (a placeholder used when previewing changes), or
//! - an error.
//!
//! Errors and unknown values flow through `apply` chains without
//! ever invoking the chained functions.

/// Errors carried by rejected outputs.
mod error;
pub use error::Error;

/// Opaque values and element types.
mod element;
pub use element::{Element, ElementType, Resolved, Value};

/// Resource identifiers and dependency sets.
mod deps;
pub use deps::{Dependencies, Id, Urn};

/// Cancellation contexts.
mod context;
pub use context::Context;

/// Shared promise state behind every output.
mod cell;
pub use cell::State;

/// Handles for awaiting and settling a cell.
mod state;
pub use state::{OutputState, Resolver};

/// Normalized transformation functions.
mod applier;
pub use applier::Applier;

mod output;
pub use output::{Output, TypedOutput};

/// Element type -> output variant mapping.
mod registry;
pub use registry::{Construct, Error as RegistryError, Registry, Variant};

/// Joining outputs.
mod all;
pub use all::{all, all_with_context};

/// Builtin output variants.
mod builtins;
pub use builtins::*;

pub type Hasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;
pub type HashMap<K, V> = std::collections::HashMap<K, V, Hasher>;
pub type HashSet<T> = std::collections::HashSet<T, Hasher>;
