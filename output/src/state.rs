use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::cell::{Cell, Outcome, State};
use crate::{Context, Dependencies, Element, ElementType, Error, Output, Resolved, Value};

/// Shared handle to the cell behind an output.
///
/// Cloning the handle shares the cell, so every clone observes the same outcome.
/// The default (nil) handle has no cell and behaves like an output
/// that is already resolved to an unknown value, with no dependencies.
#[derive(Clone, Default)]
pub struct OutputState {
    cell: Option<Arc<Cell>>,
}

impl OutputState {
    /// The nil handle.
    pub fn nil() -> Self {
        Self::default()
    }

    /// Create a pending output of the given element type, along with the
    /// resolver its producer will use to settle it.
    pub fn pending(element: ElementType, deps: Dependencies) -> (Self, Resolver) {
        let cell = Arc::new(Cell::new(element, deps));
        let resolver = Resolver {
            cell: cell.clone(),
            _element: PhantomData,
        };
        (Self { cell: Some(cell) }, resolver)
    }

    pub fn is_nil(&self) -> bool {
        self.cell.is_none()
    }

    /// Element type of the underlying cell.
    pub fn element_type(&self) -> ElementType {
        match &self.cell {
            Some(cell) => cell.element_type(),
            None => ElementType::any(),
        }
    }

    pub fn dependencies(&self) -> Dependencies {
        match &self.cell {
            Some(cell) => cell.dependencies().clone(),
            None => Dependencies::new(),
        }
    }

    pub fn state(&self) -> State {
        match &self.cell {
            Some(cell) => cell.state(),
            None => State::Resolved,
        }
    }

    /// True if both handles share one cell. Nil handles are never the same.
    pub fn same_cell(&self, other: &OutputState) -> bool {
        match (&self.cell, &other.cell) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Block until the output is settled, following outputs that resolved to other outputs.
    ///
    /// Rejected and unknown outputs are returned as-is, without looking any further.
    pub fn await_value(&self, ctx: &Context) -> Result<Resolved<Value>, Error> {
        let mut current = self.cell.clone();
        loop {
            let Some(cell) = current else {
                return Ok(Resolved::Unknown);
            };
            let value = match cell.wait(ctx)? {
                Resolved::Known(value) => value,
                Resolved::Unknown => return Ok(Resolved::Unknown),
            };
            match value.downcast_ref::<OutputState>() {
                Some(inner) => current = inner.cell.clone(),
                None => return Ok(Resolved::Known(value)),
            }
        }
    }
}

impl fmt::Debug for OutputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cell {
            None => f.write_str("OutputState(nil)"),
            Some(cell) => f
                .debug_struct("OutputState")
                .field("element", &cell.element_type())
                .field("state", &cell.state())
                .field("dependencies", &cell.dependencies().sorted())
                .finish(),
        }
    }
}

/// Producer-side handle that settles exactly one output.
///
/// Only the first call to any of the settling methods takes effect;
/// each returns true if it was that first call.
pub struct Resolver<T = Value> {
    cell: Arc<Cell>,
    _element: PhantomData<fn(T)>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            _element: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("element", &self.cell.element_type())
            .field("state", &self.cell.state())
            .finish()
    }
}

impl<T> Resolver<T> {
    pub(crate) fn fulfill_raw(&self, outcome: Outcome) -> bool {
        self.cell.fulfill(outcome)
    }

    /// Resolve to a placeholder that stands in for a value that can't be computed yet.
    pub fn resolve_unknown(&self) -> bool {
        self.fulfill_raw(Ok(Resolved::Unknown))
    }

    pub fn reject(&self, err: impl Into<Error>) -> bool {
        self.fulfill_raw(Err(err.into()))
    }

    /// Resolve to whatever `output` resolves to.
    pub fn resolve_with(&self, output: &dyn Output) -> bool {
        let inner: Value = Arc::new(output.state().clone());
        self.fulfill_raw(Ok(Resolved::Known(inner)))
    }

    pub fn is_settled(&self) -> bool {
        self.cell.state() != State::Pending
    }

    pub fn element_type(&self) -> ElementType {
        self.cell.element_type()
    }

    /// Reinterpret this resolver with element type `U`.
    pub(crate) fn cast<U>(self) -> Resolver<U> {
        Resolver {
            cell: self.cell,
            _element: PhantomData,
        }
    }
}

impl<T: Element> Resolver<T> {
    pub fn resolve(&self, value: T) -> bool {
        self.fulfill_raw(Ok(Resolved::Known(value.into_value())))
    }

    pub fn fulfill(&self, outcome: Result<Resolved<T>, Error>) -> bool {
        self.fulfill_raw(outcome.map(|resolved| resolved.map(Element::into_value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nil_is_resolved_unknown() {
        let nil = OutputState::nil();
        assert!(nil.is_nil());
        assert_eq!(nil.state(), State::Resolved);
        assert!(nil.dependencies().is_empty());
        assert!(nil.element_type().is_any());
        let resolved = nil.await_value(&Context::background()).unwrap();
        assert_eq!(resolved.is_known(), false);
    }

    #[test]
    fn test_clones_share_cell() {
        let (state, resolver) = OutputState::pending(ElementType::any(), Dependencies::new());
        let copy = state.clone();
        assert!(state.same_cell(&copy));
        resolver.resolve(Arc::new(3u8) as Value);
        assert_eq!(copy.state(), State::Resolved);
    }

    #[test]
    fn test_nested_output_is_unwrapped() {
        let (outer, outer_resolver) = OutputState::pending(ElementType::any(), Dependencies::new());
        let (middle, middle_resolver) = OutputState::pending(ElementType::any(), Dependencies::new());
        let (inner, inner_resolver) = OutputState::pending(ElementType::any(), Dependencies::new());

        outer_resolver.fulfill_raw(Ok(Resolved::Known(Arc::new(middle))));
        middle_resolver.fulfill_raw(Ok(Resolved::Known(Arc::new(inner))));
        inner_resolver.resolve(Arc::new(String::from("leaf")) as Value);

        let value = outer.await_value(&Context::background()).unwrap().known().unwrap();
        assert_eq!(value.downcast_ref::<String>().unwrap(), "leaf");
    }

    #[test]
    fn test_nested_nil_is_unknown() {
        let (outer, resolver) = OutputState::pending(ElementType::any(), Dependencies::new());
        resolver.fulfill_raw(Ok(Resolved::Known(Arc::new(OutputState::nil()))));
        let resolved = outer.await_value(&Context::background()).unwrap();
        assert!(!resolved.is_known());
    }

    #[test]
    fn test_nested_rejection_propagates() {
        let (outer, outer_resolver) = OutputState::pending(ElementType::any(), Dependencies::new());
        let (inner, inner_resolver) = OutputState::pending(ElementType::any(), Dependencies::new());
        outer_resolver.fulfill_raw(Ok(Resolved::Known(Arc::new(inner))));
        inner_resolver.reject(Error::failed(anyhow::anyhow!("inner failed")));
        let err = outer.await_value(&Context::background()).unwrap_err();
        assert_eq!(err.to_string(), "inner failed");
    }
}
