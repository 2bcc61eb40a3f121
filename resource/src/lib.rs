//! Resources: the boundary where outputs are created and consumed.
//!
//! A [`Deployment`] registers resources with their [`Provider`]s. Registering
//! hands back a [`Resource`] whose outputs are pending until the provider
//! answers; the inputs of one resource are usually outputs of another, which
//! is how dependencies between resources get recorded.

/// Input property maps and awaiting them.
mod property;
pub use property::{await_properties, Inputs, PropertyMap, PropertyValue};

/// The provider interface.
mod provider;
pub use provider::{CheckFailure, Created, OutputSpec, Provider, Schema};

mod resource;
pub use resource::Resource;

/// Registering resources and tracking their completion.
mod deployment;
pub use deployment::{Deployment, Mode, Outcome};

use output::{ElementType, Urn};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("while awaiting property \"{name}\"")]
    Property {
        name: String,
        #[source]
        source: output::Error,
    },
    #[error("input \"{0}\" is unknown, but a known value is required to create a resource")]
    UnknownInput(String),
    #[error("{urn} failed validation: {}", join_failures(.failures))]
    CheckFailed {
        urn: Urn,
        failures: Vec<CheckFailure>,
    },
    #[error("provider did not return output \"{name}\" for {urn}")]
    MissingOutput { urn: Urn, name: String },
    #[error("{urn} has no output named \"{name}\"")]
    NoSuchOutput { urn: Urn, name: String },
    #[error("output \"{name}\" of {urn} holds {found}, not {expected}")]
    OutputType {
        urn: Urn,
        name: String,
        found: ElementType,
        expected: ElementType,
    },
    #[error("a resource named {0} is already registered")]
    DuplicateResource(Urn),
    #[error("unable to spawn task for {0}")]
    Spawn(Urn, #[source] std::io::Error),
    #[error("provider panicked while handling {0}: {1}")]
    Panicked(Urn, String),
}

fn join_failures(failures: &[CheckFailure]) -> String {
    let strs: Vec<String> = failures.iter().map(ToString::to_string).collect();
    strs.join("; ")
}

// separates the parts of a urn, e.g. "urn:eventual:dev::memory:Bucket::photos"
pub const URN_DELIM: &str = "::";
const URN_PREFIX: &str = "urn:eventual:";

/// Build the urn of resource `name` of type `type_token` in `stack`.
pub fn make_urn(stack: &str, type_token: &str, name: &str) -> Urn {
    Urn::new(format!("{URN_PREFIX}{stack}{URN_DELIM}{type_token}{URN_DELIM}{name}"))
}

/// The resource name part of `urn`.
pub fn urn_name(urn: &Urn) -> &str {
    let s = urn.as_str();
    match s.rfind(URN_DELIM) {
        Some(i) => &s[i + URN_DELIM.len()..],
        None => s,
    }
}
