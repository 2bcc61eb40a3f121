use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::TypedOutput;

/// Opaque payload stored in an output.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Logical type of the value an output will eventually hold.
#[derive(Clone, Copy)]
pub struct ElementType {
    id: TypeId,
    name: &'static str,
}

impl ElementType {
    /// Element type for values of type `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Element type of untyped outputs, which accept a value of any type.
    pub fn any() -> Self {
        Self {
            id: TypeId::of::<Value>(),
            name: "any",
        }
    }

    pub fn is_any(&self) -> bool {
        self.id == TypeId::of::<Value>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True if a value of this type can be passed to a parameter of type `param`.
    pub fn assignable_to(&self, param: ElementType) -> bool {
        param.is_any() || self.id == param.id
    }

    /// True if `value` can be stored in an output of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        self.is_any() || Any::type_id(&**value) == self.id
    }
}

impl PartialEq for ElementType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ElementType {}

impl Hash for ElementType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementType({})", self.name)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A type that can be the element of a typed output.
///
/// Each element type names the output variant that holds it, so `apply`
/// can pick the result variant from the applier's return type alone.
/// Implemented for every builtin element type by the [`output_variant`] macro.
///
/// [`output_variant`]: crate::output_variant
pub trait Element: Clone + Send + Sync + 'static {
    /// Output variant that holds values of this type.
    type Output: TypedOutput<Element = Self>;

    fn element_type() -> ElementType {
        ElementType::of::<Self>()
    }

    fn into_value(self) -> Value {
        Arc::new(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.downcast_ref::<Self>().cloned()
    }
}

impl Element for Value {
    type Output = crate::AnyOutput;

    fn element_type() -> ElementType {
        ElementType::any()
    }

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// Non-error outcome of awaiting an output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    /// An actual computed value.
    Known(T),
    /// A placeholder for a value that can't be computed yet (e.g. during preview).
    Unknown,
}

impl<T> Resolved<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn known(self) -> Option<T> {
        match self {
            Self::Known(v) => Some(v),
            Self::Unknown => None,
        }
    }

    pub fn as_ref(&self) -> Resolved<&T> {
        match self {
            Self::Known(v) => Resolved::Known(v),
            Self::Unknown => Resolved::Unknown,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        match self {
            Self::Known(v) => Resolved::Known(f(v)),
            Self::Unknown => Resolved::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignable() {
        let string = ElementType::of::<String>();
        let int = ElementType::of::<i64>();
        assert!(string.assignable_to(string));
        assert!(string.assignable_to(ElementType::any()));
        assert!(!string.assignable_to(int));
        assert!(!ElementType::any().assignable_to(int));
    }

    #[test]
    fn test_accepts() {
        let value: Value = Arc::new(5i64);
        assert!(ElementType::of::<i64>().accepts(&value));
        assert!(!ElementType::of::<i32>().accepts(&value));
        assert!(ElementType::any().accepts(&value));
    }

    #[test]
    fn test_untyped_value_round_trip_is_identity() {
        let value: Value = Arc::new(String::from("foo"));
        let back = Value::from_value(&value.clone().into_value()).unwrap();
        assert!(Arc::ptr_eq(&value, &back));
    }
}
