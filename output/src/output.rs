use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::applier::{spawn_apply, Applier};
use crate::{
    AnyOutput, Context, Dependencies, Element, ElementType, Error, OutputState, Registry,
    Resolved, Resolver, Value,
};

/// A deferred value: a handle to an output whose value is produced later,
/// along with the set of resources that value derives from.
///
/// This trait is object-safe, so heterogeneous outputs can be collected
/// as `Box<dyn Output>` or `&dyn Output`. Typed operations live on [`TypedOutput`].
pub trait Output: Any + Send + Sync + fmt::Debug {
    fn state(&self) -> &OutputState;

    /// Element type of the values this variant holds.
    fn element_type(&self) -> ElementType;

    fn variant_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn boxed_clone(&self) -> Box<dyn Output>;

    fn dependencies(&self) -> Dependencies {
        self.state().dependencies()
    }

    /// Block until settled, returning the untyped value.
    fn await_any(&self, ctx: &Context) -> Result<Resolved<Value>, Error> {
        self.state().await_value(ctx)
    }

    /// Untyped handle sharing this output's cell.
    fn to_any(&self) -> AnyOutput {
        AnyOutput::from_state(self.state().clone())
    }

    /// Chain a dynamically-typed applier onto this output.
    ///
    /// The variant of the returned output is looked up in `registry`
    /// from the applier's declared return type, falling back to [`AnyOutput`].
    /// Panics if the applier can't accept this output's element type.
    fn apply_dyn(&self, registry: &Registry, ctx: &Context, applier: Applier) -> Box<dyn Output> {
        let variant = registry.lookup(applier.output_type());
        variant.construct(spawn_apply(self.state(), ctx, applier))
    }
}

impl Clone for Box<dyn Output> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

impl dyn Output {
    /// This output as the concrete variant `O`, if that's what it is.
    pub fn downcast_ref<O: TypedOutput>(&self) -> Option<&O> {
        self.as_any().downcast_ref::<O>()
    }
}

/// An output variant with a statically-known element type.
pub trait TypedOutput: Output + Clone + Default + Sized {
    type Element: Element;

    fn from_state(state: OutputState) -> Self;

    fn into_state(self) -> OutputState;

    /// A pending output with dependencies `deps`, and the resolver that settles it.
    fn pending(deps: Dependencies) -> (Self, Resolver<Self::Element>) {
        let (state, resolver) = OutputState::pending(Self::Element::element_type(), deps);
        (Self::from_state(state), resolver.cast())
    }

    /// An output already resolved to `value`, with no dependencies.
    fn known(value: Self::Element) -> Self {
        let (output, resolver) = Self::pending(Dependencies::new());
        resolver.resolve(value);
        output
    }

    /// An output already resolved to an unknown value.
    fn unknown(deps: Dependencies) -> Self {
        let (output, resolver) = Self::pending(deps);
        resolver.resolve_unknown();
        output
    }

    /// An output already rejected with `err`.
    fn rejected(err: Error) -> Self {
        let (output, resolver) = Self::pending(Dependencies::new());
        resolver.reject(err);
        output
    }

    /// Block until settled.
    fn await_value(&self, ctx: &Context) -> Result<Resolved<Self::Element>, Error> {
        match self.state().await_value(ctx)? {
            Resolved::Known(value) => Self::Element::from_value(&value)
                .map(Resolved::Known)
                .ok_or(Error::TypeMismatch {
                    expected: Self::Element::element_type(),
                }),
            Resolved::Unknown => Ok(Resolved::Unknown),
        }
    }

    /// Transform the eventual value with `f`.
    ///
    /// The result keeps this output's dependencies. `f` runs on its own task once
    /// the value is known; it is never called if this output is rejected or unknown.
    fn apply<U, F>(&self, f: F) -> U::Output
    where
        U: Element,
        F: FnOnce(Self::Element) -> U + Send + 'static,
    {
        self.apply_with_context(&Context::background(), move |_: &Context, v| f(v))
    }

    /// Like [`TypedOutput::apply`], but `f` can fail, rejecting the result.
    fn try_apply<U, E, F>(&self, f: F) -> U::Output
    where
        U: Element,
        E: Into<anyhow::Error>,
        F: FnOnce(Self::Element) -> Result<U, E> + Send + 'static,
    {
        self.try_apply_with_context(&Context::background(), move |_: &Context, v| f(v))
    }

    /// Like [`TypedOutput::apply`], but awaits under `ctx` and passes it to `f`.
    /// If `ctx` is canceled while waiting, the result is rejected.
    fn apply_with_context<U, F>(&self, ctx: &Context, f: F) -> U::Output
    where
        U: Element,
        F: FnOnce(&Context, Self::Element) -> U + Send + 'static,
    {
        U::Output::from_state(spawn_apply(self.state(), ctx, Applier::with_context(f)))
    }

    fn try_apply_with_context<U, E, F>(&self, ctx: &Context, f: F) -> U::Output
    where
        U: Element,
        E: Into<anyhow::Error>,
        F: FnOnce(&Context, Self::Element) -> Result<U, E> + Send + 'static,
    {
        let applier = Applier::with_context_fallible(f);
        U::Output::from_state(spawn_apply(self.state(), ctx, applier))
    }

    /// Transform the eventual value into another output, flattening the result:
    /// the returned output resolves to whatever the output returned by `f` resolves to.
    fn apply_output<O, F>(&self, f: F) -> O
    where
        O: TypedOutput,
        F: FnOnce(Self::Element) -> O + Send + 'static,
    {
        self.apply_output_with_context(&Context::background(), move |_: &Context, v| f(v))
    }

    fn apply_output_with_context<O, F>(&self, ctx: &Context, f: F) -> O
    where
        O: TypedOutput,
        F: FnOnce(&Context, Self::Element) -> O + Send + 'static,
    {
        let input = Self::Element::element_type();
        let output = O::Element::element_type();
        let applier = Applier::from_parts(input, output, move |ctx, value| {
            let v = Self::Element::from_value(&value)
                .ok_or(Error::TypeMismatch { expected: input })?;
            let inner: Value = Arc::new(f(ctx, v).into_state());
            Ok(inner)
        });
        O::from_state(spawn_apply(self.state(), ctx, applier))
    }

    /// Transform the eventual value into a value of a type with no output variant.
    fn apply_any<U, F>(&self, f: F) -> AnyOutput
    where
        U: Any + Send + Sync,
        F: FnOnce(Self::Element) -> U + Send + 'static,
    {
        let input = Self::Element::element_type();
        let applier = Applier::from_parts(input, ElementType::of::<U>(), move |_, value| {
            let v = Self::Element::from_value(&value)
                .ok_or(Error::TypeMismatch { expected: input })?;
            let result: Value = Arc::new(f(v));
            Ok(result)
        });
        AnyOutput::from_state(spawn_apply(self.state(), &Context::background(), applier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Int32Output, Int64Output, State, StringOutput, Urn};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn bg() -> Context {
        Context::background()
    }

    fn deps(urns: &[&str]) -> Dependencies {
        urns.iter().map(|u| Urn::from(*u)).collect()
    }

    #[test]
    fn test_apply_known_value() {
        let (d0, resolver) = Int64Output::pending(deps(&["bucket"]));
        let d1 = d0.apply(|x| x * 2);
        resolver.resolve(5);
        assert_eq!(d1.await_value(&bg()).unwrap(), Resolved::Known(10));
    }

    #[test]
    fn test_apply_unknown_skips_applier() {
        let called = Arc::new(AtomicBool::new(false));
        let d2 = Int64Output::unknown(deps(&["bucket"]));
        let d3 = {
            let called = called.clone();
            d2.apply(move |x| {
                called.store(true, Ordering::SeqCst);
                x
            })
        };
        assert_eq!(d3.await_value(&bg()).unwrap(), Resolved::Unknown);
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_apply_rejected_skips_applier() {
        let called = Arc::new(AtomicBool::new(false));
        let source = StringOutput::rejected(Error::failed(anyhow::anyhow!("create failed")));
        let result = {
            let called = called.clone();
            source.apply(move |s| {
                called.store(true, Ordering::SeqCst);
                s.len() as i64
            })
        };
        let err = result.await_value(&bg()).unwrap_err();
        assert_eq!(err.to_string(), "create failed");
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_chain_preserves_value_and_dependencies() {
        let (d0, resolver) = Int64Output::pending(deps(&["a", "b"]));
        let mut dn = d0.clone();
        for _ in 0..5 {
            dn = dn.apply(|x| x + 3);
        }
        let dn = dn.apply(|x| x.to_string());
        resolver.resolve(1);

        assert_eq!(dn.await_value(&bg()).unwrap(), Resolved::Known(String::from("16")));
        assert_eq!(dn.dependencies(), d0.dependencies());
    }

    #[test]
    fn test_try_apply_error_rejects() {
        let result = StringOutput::known(String::from("not a number"))
            .try_apply(|s| s.parse::<i64>());
        let err = result.await_value(&bg()).unwrap_err();
        assert!(matches!(err, Error::Failed(_)));
        assert_eq!(result.state().state(), State::Rejected);
    }

    #[test]
    fn test_try_apply_ok() {
        let result = StringOutput::known(String::from("42")).try_apply(|s| s.parse::<i64>());
        assert_eq!(result.await_value(&bg()).unwrap(), Resolved::Known(42));
    }

    #[test]
    fn test_apply_output_is_flattened() {
        let (inner, inner_resolver) = StringOutput::pending(deps(&["inner"]));
        let outer = Int64Output::known(3);
        let result: StringOutput = {
            let inner = inner.clone();
            outer.apply_output(move |_| inner)
        };
        inner_resolver.resolve(String::from("flat"));
        assert_eq!(result.await_value(&bg()).unwrap(), Resolved::Known(String::from("flat")));
    }

    #[test]
    fn test_apply_on_nil_is_unknown() {
        let nil = StringOutput::default();
        let result = nil.apply(|s| s.len() as u64);
        assert_eq!(result.await_value(&bg()).unwrap(), Resolved::Unknown);
        assert!(result.dependencies().is_empty());
    }

    #[test]
    fn test_apply_on_nil_downcast_is_unknown() {
        let nil = AnyOutput::default().downcast::<Int64Output>().unwrap();
        let result = nil.try_apply(|x| Ok::<_, anyhow::Error>(x + 1));
        assert_eq!(result.await_value(&bg()).unwrap(), Resolved::Unknown);

        let chained = StringOutput::default()
            .apply_with_context(&bg(), |_, s| s.len() as u64)
            .apply(|n| n * 2);
        assert_eq!(chained.await_value(&bg()).unwrap(), Resolved::Unknown);
    }

    #[test]
    fn test_apply_dyn_on_nil_is_unknown() {
        let registry = Registry::with_builtins();
        let result = AnyOutput::default().apply_dyn(&registry, &bg(), Applier::new(|x: i64| x));
        assert!(!result.await_any(&bg()).unwrap().is_known());
    }

    #[test]
    fn test_cancel_mid_chain_rejects() {
        let (source, _resolver) = Int64Output::pending(Dependencies::new());
        let ctx = Context::new();
        let result = source.apply_with_context(&ctx, |_, x| x + 1);
        thread::sleep(Duration::from_millis(20));
        ctx.cancel();
        let err = result.await_value(&bg()).unwrap_err();
        assert!(matches!(err, Error::Canceled));
    }

    #[test]
    fn test_applier_can_await_shared_upstream() {
        let (d0, resolver) = Int64Output::pending(Dependencies::new());
        let d1 = {
            let d0 = d0.clone();
            d0.clone().apply_with_context(&bg(), move |ctx, x| {
                let again = d0.await_value(ctx).unwrap().known().unwrap();
                x + again
            })
        };
        resolver.resolve(21);
        assert_eq!(d1.await_value(&bg()).unwrap(), Resolved::Known(42));
    }

    #[test]
    fn test_concurrent_awaiters_agree() {
        const WAITERS: usize = 8;
        let (output, resolver) = AnyOutput::new();
        let barrier = Arc::new(Barrier::new(WAITERS + 1));
        let handles: Vec<_> = (0..WAITERS)
            .map(|_| {
                let output = output.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    output.await_value(&Context::background())
                })
            })
            .collect();

        barrier.wait();
        let value: Value = Arc::new(String::from("shared"));
        resolver.resolve(value.clone());

        for handle in handles {
            let seen = handle.join().unwrap().unwrap().known().unwrap();
            assert!(Arc::ptr_eq(&seen, &value));
        }
    }

    #[test]
    fn test_applier_runs_once_per_apply() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (source, resolver) = Int64Output::pending(Dependencies::new());
        let result = {
            let calls = calls.clone();
            source.apply(move |x| {
                calls.fetch_add(1, Ordering::SeqCst);
                x
            })
        };
        resolver.resolve(1);
        resolver.resolve(2);
        for _ in 0..3 {
            assert_eq!(result.await_value(&bg()).unwrap(), Resolved::Known(1));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_apply_any_unregistered_type() {
        #[derive(Debug, PartialEq)]
        struct Opaque(i64);

        let result = Int64Output::known(9).apply_any(Opaque);
        let value = result.await_any(&bg()).unwrap().known().unwrap();
        assert_eq!(value.downcast_ref::<Opaque>(), Some(&Opaque(9)));
    }

    #[test]
    fn test_apply_dyn_uses_registered_variant() {
        let registry = Registry::with_builtins();
        let source = Int64Output::known(7);
        let result = source.apply_dyn(&registry, &bg(), Applier::new(|x: i64| format!("#{x}")));
        assert_eq!(result.variant_name(), "StringOutput");
        let typed = result.downcast_ref::<StringOutput>().unwrap();
        assert_eq!(typed.await_value(&bg()).unwrap(), Resolved::Known(String::from("#7")));
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct Point {
        x: i32,
        y: i32,
    }

    crate::output_variant!(PointOutput, Point);

    #[test]
    fn test_apply_dyn_falls_back_to_any() {
        let registry = Registry::with_builtins();
        let source = Int32Output::known(4);
        let result = source.apply_dyn(&registry, &bg(), Applier::new(|x: i32| Point { x, y: -x }));
        assert_eq!(result.variant_name(), "AnyOutput");

        let point: PointOutput = result.to_any().downcast().unwrap();
        assert_eq!(point.await_value(&bg()).unwrap(), Resolved::Known(Point { x: 4, y: -4 }));
    }

    #[test]
    fn test_apply_dyn_custom_variant() {
        let mut registry = Registry::with_builtins();
        registry.register::<PointOutput>();
        let source = Int32Output::known(1);
        let result = source.apply_dyn(&registry, &bg(), Applier::new(|x: i32| Point { x, y: x }));
        assert!(result.downcast_ref::<PointOutput>().is_some());
    }

    #[test]
    #[should_panic(expected = "applier must have 1 input parameter assignable from")]
    fn test_apply_dyn_mismatched_applier_panics() {
        let registry = Registry::with_builtins();
        let source = StringOutput::known(String::from("x"));
        source.apply_dyn(&registry, &bg(), Applier::new(|x: i64| x));
    }

    #[test]
    fn test_downcast_checks_element_type() {
        let any = Int64Output::known(1).to_any();
        assert!(any.downcast::<Int64Output>().is_ok());
        assert!(matches!(
            any.downcast::<StringOutput>(),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(AnyOutput::default().downcast::<StringOutput>().is_ok());
    }

    #[test]
    fn test_resolve_with_output() {
        let (outer, resolver) = StringOutput::pending(Dependencies::new());
        let inner = StringOutput::known(String::from("through"));
        resolver.resolve_with(&inner);
        assert_eq!(outer.await_value(&bg()).unwrap(), Resolved::Known(String::from("through")));
    }
}
