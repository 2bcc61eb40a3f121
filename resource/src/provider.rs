use std::collections::BTreeMap;
use std::fmt;

use output::{Context, Element, ElementType, Id, Urn, Value};

use crate::PropertyMap;

/// A declared output property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSpec {
    name: &'static str,
    element: ElementType,
}

impl OutputSpec {
    pub fn of<T: Element>(name: &'static str) -> Self {
        Self {
            name,
            element: T::element_type(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn element_type(&self) -> ElementType {
        self.element
    }
}

/// The output properties a resource type produces, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    outputs: Vec<OutputSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare output `name` holding values of type `T`.
    pub fn with<T: Element>(mut self, name: &'static str) -> Self {
        debug_assert!(self.get(name).is_none(), "output {name} declared twice");
        self.outputs.push(OutputSpec::of::<T>(name));
        self
    }

    pub fn get(&self, name: &str) -> Option<&OutputSpec> {
        self.outputs.iter().find(|spec| spec.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputSpec> {
        self.outputs.iter()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// One reason a provider rejected a resource's inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    pub property: String,
    pub reason: String,
}

impl CheckFailure {
    pub fn new(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property, self.reason)
    }
}

/// Result of creating a resource.
#[derive(Debug, Clone)]
pub struct Created {
    pub id: Id,
    pub outputs: BTreeMap<String, Value>,
}

impl Created {
    pub fn new(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with<T: Element>(mut self, name: impl Into<String>, value: T) -> Self {
        self.outputs.insert(name.into(), value.into_value());
        self
    }
}

/// Manages the lifecycle of one type of resource.
///
/// Methods are called from the deployment's worker threads,
/// possibly for several resources at once.
pub trait Provider: Send + Sync + 'static {
    /// Type token of the resources this provider manages, e.g. "memory:index:Bucket".
    fn type_token(&self) -> &str;

    fn schema(&self) -> &Schema;

    /// Validate `inputs` before anything is created. Unknown inputs should be
    /// accepted, since they may become valid once known.
    fn check(&self, _inputs: &PropertyMap) -> Vec<CheckFailure> {
        Vec::new()
    }

    /// Predict the outputs of creating resource `urn`.
    /// Outputs left out of the returned map are unknown;
    /// returning `None` leaves them all unknown.
    fn preview(&self, _urn: &Urn, _inputs: &PropertyMap) -> Option<PropertyMap> {
        None
    }

    /// Create resource `urn`. Every input is known.
    fn create(&self, ctx: &Context, urn: &Urn, inputs: &PropertyMap) -> anyhow::Result<Created>;

    fn delete(&self, ctx: &Context, id: &Id) -> anyhow::Result<()>;
}
