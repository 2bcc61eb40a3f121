use std::fmt;

use crate::{AnyOutput, ElementType, HashMap, Output, OutputState, TypedOutput};

/// Builds an output variant around an output state.
pub type Construct = fn(OutputState) -> Box<dyn Output>;

/// A registered output variant.
#[derive(Clone, Copy)]
pub struct Variant {
    name: &'static str,
    element: ElementType,
    construct: Construct,
}

impl Variant {
    pub fn of<O: TypedOutput>() -> Self {
        Self {
            name: O::default().variant_name(),
            element: <O::Element as crate::Element>::element_type(),
            construct: construct::<O>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn element_type(&self) -> ElementType {
        self.element
    }

    pub fn construct(&self, state: OutputState) -> Box<dyn Output> {
        (self.construct)(state)
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variant")
            .field("name", &self.name)
            .field("element", &self.element)
            .finish()
    }
}

fn construct<O: TypedOutput>(state: OutputState) -> Box<dyn Output> {
    Box::new(O::from_state(state))
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("an output type for {0} is already registered: {1}")]
    AlreadyRegistered(ElementType, &'static str),
}

/// Maps element types to the output variant produced when an applier returns that type.
///
/// Each element type can be registered once. Build the registry at startup,
/// then share it read-only (e.g. behind an `Arc`) with everything that needs lookups.
#[derive(Debug, Default)]
pub struct Registry {
    variants: HashMap<ElementType, Variant>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every builtin variant.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtins::register_builtins(&mut registry);
        registry
    }

    pub fn try_register<O: TypedOutput>(&mut self) -> Result<(), Error> {
        let variant = Variant::of::<O>();
        if let Some(existing) = self.variants.get(&variant.element) {
            return Err(Error::AlreadyRegistered(variant.element, existing.name));
        }
        log::trace!("registering {} for {}", variant.name, variant.element);
        self.variants.insert(variant.element, variant);
        Ok(())
    }

    /// Register variant `O` for its element type.
    ///
    /// Panics if a variant is already registered for that element type:
    /// two variants for one type means the program is misconfigured.
    pub fn register<O: TypedOutput>(&mut self) {
        if let Err(e) = self.try_register::<O>() {
            panic!("{e}");
        }
    }

    /// The variant registered for `element`, if any.
    pub fn get(&self, element: ElementType) -> Option<&Variant> {
        self.variants.get(&element)
    }

    /// The variant registered for `element`, or the untyped [`AnyOutput`] variant.
    pub fn lookup(&self, element: ElementType) -> Variant {
        match self.variants.get(&element) {
            Some(variant) => *variant,
            None => Variant::of::<AnyOutput>(),
        }
    }

    pub fn contains(&self, element: ElementType) -> bool {
        self.variants.contains_key(&element)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
