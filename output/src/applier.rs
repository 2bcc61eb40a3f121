use std::fmt;
use std::thread;

use crate::state::Resolver;
use crate::{Context, Element, ElementType, Error, OutputState, Resolved, Value};

type Body = Box<dyn FnOnce(&Context, Value) -> Result<Value, Error> + Send>;

/// A transformation chained onto an output, with its shape made explicit.
///
/// Every constructor normalizes the user function into one cancellable,
/// fallible calling convention, so the chaining machinery only ever deals
/// with `FnOnce(&Context, Value) -> Result<Value, Error>`.
/// Arity and return shape are fixed by the constructor used;
/// the one rule left to check at runtime is that the applier's parameter
/// accepts the element type of the output it's applied to (see [`Applier::check`]).
pub struct Applier {
    input: ElementType,
    output: ElementType,
    body: Body,
}

impl Applier {
    /// `f(value) -> result`
    pub fn new<T, U, F>(f: F) -> Self
    where
        T: Element,
        U: Element,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Self::with_context(move |_: &Context, v: T| f(v))
    }

    /// `f(value) -> Result<result, error>`
    pub fn fallible<T, U, E, F>(f: F) -> Self
    where
        T: Element,
        U: Element,
        E: Into<anyhow::Error>,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        Self::with_context_fallible(move |_: &Context, v: T| f(v))
    }

    /// `f(ctx, value) -> result`
    pub fn with_context<T, U, F>(f: F) -> Self
    where
        T: Element,
        U: Element,
        F: FnOnce(&Context, T) -> U + Send + 'static,
    {
        Self::from_parts(T::element_type(), U::element_type(), move |ctx, value| {
            Ok(f(ctx, downcast::<T>(&value)?).into_value())
        })
    }

    /// `f(ctx, value) -> Result<result, error>`
    pub fn with_context_fallible<T, U, E, F>(f: F) -> Self
    where
        T: Element,
        U: Element,
        E: Into<anyhow::Error>,
        F: FnOnce(&Context, T) -> Result<U, E> + Send + 'static,
    {
        Self::from_parts(T::element_type(), U::element_type(), move |ctx, value| {
            match f(ctx, downcast::<T>(&value)?) {
                Ok(result) => Ok(result.into_value()),
                Err(e) => Err(Error::failed(e)),
            }
        })
    }

    /// Build an applier from an already-normalized body and its declared types.
    pub fn from_parts<F>(input: ElementType, output: ElementType, body: F) -> Self
    where
        F: FnOnce(&Context, Value) -> Result<Value, Error> + Send + 'static,
    {
        Self {
            input,
            output,
            body: Box::new(body),
        }
    }

    pub fn input_type(&self) -> ElementType {
        self.input
    }

    pub fn output_type(&self) -> ElementType {
        self.output
    }

    /// Panic unless this applier can accept values of type `source`.
    ///
    /// A mismatch is a programming error, not a data error, so it fails loudly
    /// at the call to `apply` rather than rejecting the resulting output.
    pub fn check(&self, source: ElementType) {
        if !source.assignable_to(self.input) {
            panic!(
                "applier must have 1 input parameter assignable from {source}, found {}",
                self.input
            );
        }
    }

    pub(crate) fn call(self, ctx: &Context, value: Value) -> Result<Value, Error> {
        (self.body)(ctx, value)
    }
}

impl fmt::Debug for Applier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Applier")
            .field("input", &self.input)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

fn downcast<T: Element>(value: &Value) -> Result<T, Error> {
    T::from_value(value).ok_or(Error::TypeMismatch {
        expected: T::element_type(),
    })
}

/// Chain `applier` onto `source`, returning the state of the new output.
///
/// The new output shares `source`'s dependencies. One task is spawned to await
/// `source` and run the applier; errors and unknown values skip the applier
/// and pass straight through.
pub(crate) fn spawn_apply(source: &OutputState, ctx: &Context, applier: Applier) -> OutputState {
    // a nil source never reaches the applier, so any applier shape is fine:
    if !source.is_nil() {
        applier.check(source.element_type());
    }

    let (result, resolver) = OutputState::pending(applier.output_type(), source.dependencies());
    let fallback = resolver.clone();
    let source = source.clone();
    let ctx = ctx.clone();
    spawn_task("output-apply", &fallback, move || {
        let outcome = match source.await_value(&ctx) {
            Ok(Resolved::Known(value)) => applier.call(&ctx, value).map(Resolved::Known),
            other => other,
        };
        resolver.fulfill_raw(outcome);
    });
    result
}

/// Run `f` on a new thread. If the thread can't be started,
/// the output `f` would have settled is rejected instead.
pub(crate) fn spawn_task<T, F>(name: &str, resolver: &Resolver<T>, f: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Err(e) = thread::Builder::new().name(name.to_owned()).spawn(f) {
        resolver.reject(Error::failed(e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_plain_applier_shape() {
        let applier = Applier::new(|x: i64| x.to_string());
        assert_eq!(applier.input_type(), ElementType::of::<i64>());
        assert_eq!(applier.output_type(), ElementType::of::<String>());
        let out = applier.call(&Context::background(), Arc::new(12i64)).unwrap();
        assert_eq!(out.downcast_ref::<String>().unwrap(), "12");
    }

    #[test]
    fn test_fallible_applier_error() {
        let applier = Applier::fallible(|x: i64| {
            if x < 0 {
                Err(anyhow::anyhow!("negative: {x}"))
            } else {
                Ok(x)
            }
        });
        let err = applier.call(&Context::background(), Arc::new(-1i64)).unwrap_err();
        assert_eq!(err.to_string(), "negative: -1");
    }

    #[test]
    fn test_contextful_applier_sees_context() {
        let ctx = Context::new();
        ctx.cancel();
        let applier = Applier::with_context(|ctx: &Context, _: bool| ctx.is_canceled());
        let out = applier.call(&ctx, Arc::new(true)).unwrap();
        assert_eq!(out.downcast_ref::<bool>(), Some(&true));
    }

    #[test]
    fn test_wrong_runtime_value_is_type_mismatch() {
        let applier = Applier::new(|x: i64| x);
        let err = applier.call(&Context::background(), Arc::new("nope")).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_check_accepts_any_parameter() {
        let applier = Applier::new(|v: Value| v);
        applier.check(ElementType::of::<String>());
        applier.check(ElementType::any());
    }

    #[test]
    #[should_panic(expected = "applier must have 1 input parameter assignable from")]
    fn test_check_rejects_mismatched_parameter() {
        let applier = Applier::new(|x: i64| x);
        applier.check(ElementType::of::<String>());
    }

    #[test]
    #[should_panic(expected = "applier must have 1 input parameter assignable from")]
    fn test_check_rejects_typed_parameter_for_untyped_source() {
        let applier = Applier::new(|x: i64| x);
        applier.check(ElementType::any());
    }
}
