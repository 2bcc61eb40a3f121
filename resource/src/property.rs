use std::collections::BTreeMap;

use output::{Context, Dependencies, Element, Output, Resolved, Value};

use crate::Error;

/// A property value as seen by a provider.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Known(Value),
    /// Stands in for a value that won't be known until a dependency is created.
    Unknown,
}

impl PropertyValue {
    pub fn known<T: Element>(value: T) -> Self {
        Self::Known(value.into_value())
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown => None,
        }
    }

    /// The known value, if it has type `T`.
    pub fn get<T: Element>(&self) -> Option<T> {
        self.value().and_then(T::from_value)
    }
}

impl From<Resolved<Value>> for PropertyValue {
    fn from(resolved: Resolved<Value>) -> Self {
        match resolved {
            Resolved::Known(value) => Self::Known(value),
            Resolved::Unknown => Self::Unknown,
        }
    }
}

pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Named outputs used as the inputs of a resource.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    props: BTreeMap<String, Box<dyn Output>>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add input `name`, replacing any existing input with that name.
    pub fn with(mut self, name: impl Into<String>, output: impl Output) -> Self {
        self.insert(name, Box::new(output));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, output: Box<dyn Output>) {
        self.props.insert(name.into(), output);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Output> {
        self.props.get(name).map(|o| o.as_ref())
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Output)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Union of every input's dependencies.
    pub fn dependencies(&self) -> Dependencies {
        Dependencies::union(self.props.values().map(|o| o.dependencies()))
    }
}

/// Await every input, in name order.
///
/// Unknown inputs are kept in the result as [`PropertyValue::Unknown`].
/// Stops at the first rejected input.
pub fn await_properties(ctx: &Context, inputs: &Inputs) -> Result<PropertyMap, Error> {
    let mut props = PropertyMap::new();
    for (name, output) in inputs.iter() {
        let resolved = output.await_any(ctx).map_err(|source| Error::Property {
            name: name.to_owned(),
            source,
        })?;
        props.insert(name.to_owned(), resolved.into());
    }
    Ok(props)
}
