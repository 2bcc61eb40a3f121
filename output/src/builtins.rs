use std::collections::BTreeMap;

use crate::{Context, Dependencies, Error, Id, Registry, Resolved, Resolver, TypedOutput, Urn, Value};

/// Declare an output variant holding values of type `$elem`.
///
/// Generates the variant struct, its [`Output`](crate::Output) and
/// [`TypedOutput`](crate::TypedOutput) impls, and an [`Element`](crate::Element)
/// impl linking `$elem` back to the variant. The variant still has to be
/// added to a [`Registry`](crate::Registry) to take part in dynamic lookups.
#[macro_export]
macro_rules! output_variant {
    (@variant $(#[$meta:meta])* $name:ident, $elem:ty) => {
        $(#[$meta])*
        #[derive(Clone, Default)]
        pub struct $name($crate::OutputState);

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }

        impl $crate::Output for $name {
            fn state(&self) -> &$crate::OutputState {
                &self.0
            }

            fn element_type(&self) -> $crate::ElementType {
                <$elem as $crate::Element>::element_type()
            }

            fn variant_name(&self) -> &'static str {
                stringify!($name)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn boxed_clone(&self) -> ::std::boxed::Box<dyn $crate::Output> {
                ::std::boxed::Box::new(self.clone())
            }
        }

        impl $crate::TypedOutput for $name {
            type Element = $elem;

            fn from_state(state: $crate::OutputState) -> Self {
                Self(state)
            }

            fn into_state(self) -> $crate::OutputState {
                self.0
            }
        }
    };
    ($(#[$meta:meta])* $name:ident, $elem:ty) => {
        $crate::output_variant!(@variant $(#[$meta])* $name, $elem);

        impl $crate::Element for $elem {
            type Output = $name;
        }
    };
}

// scalar, array, and map variants for each builtin element type:
macro_rules! builtins {
    ($($scalar:ident, $array:ident, $map:ident => $elem:ty;)*) => {
        $(
            output_variant!(
                #[doc = concat!("Output of `", stringify!($elem), "` values.")]
                $scalar, $elem
            );
            output_variant!(
                #[doc = concat!("Output of `Vec<", stringify!($elem), ">` values.")]
                $array, Vec<$elem>
            );
            output_variant!(
                #[doc = concat!("Output of `BTreeMap<String, ", stringify!($elem), ">` values.")]
                $map, BTreeMap<String, $elem>
            );
        )*

        /// Register every builtin variant, including the untyped ones.
        pub(crate) fn register_builtins(registry: &mut Registry) {
            registry.register::<AnyOutput>();
            registry.register::<AnyArrayOutput>();
            registry.register::<AnyMapOutput>();
            $(
                registry.register::<$scalar>();
                registry.register::<$array>();
                registry.register::<$map>();
            )*
        }
    };
}

builtins! {
    BoolOutput, BoolArrayOutput, BoolMapOutput => bool;
    Float32Output, Float32ArrayOutput, Float32MapOutput => f32;
    Float64Output, Float64ArrayOutput, Float64MapOutput => f64;
    IdOutput, IdArrayOutput, IdMapOutput => Id;
    Int8Output, Int8ArrayOutput, Int8MapOutput => i8;
    Int16Output, Int16ArrayOutput, Int16MapOutput => i16;
    Int32Output, Int32ArrayOutput, Int32MapOutput => i32;
    Int64Output, Int64ArrayOutput, Int64MapOutput => i64;
    StringOutput, StringArrayOutput, StringMapOutput => String;
    UrnOutput, UrnArrayOutput, UrnMapOutput => Urn;
    Uint8Output, Uint8ArrayOutput, Uint8MapOutput => u8;
    Uint16Output, Uint16ArrayOutput, Uint16MapOutput => u16;
    Uint32Output, Uint32ArrayOutput, Uint32MapOutput => u32;
    Uint64Output, Uint64ArrayOutput, Uint64MapOutput => u64;
}

output_variant!(
    @variant
    /// Output of values of any type. Also the fallback variant for unregistered types.
    AnyOutput, Value
);
output_variant!(
    /// Output of arrays of untyped values, as produced by [`all`](crate::all).
    AnyArrayOutput, Vec<Value>
);
output_variant!(
    /// Output of maps of untyped values.
    AnyMapOutput, BTreeMap<String, Value>
);

impl AnyOutput {
    /// A pending untyped output with no dependencies, and the resolver that settles it.
    pub fn new() -> (Self, Resolver<Value>) {
        Self::pending(Dependencies::new())
    }

    /// A typed view sharing this output's cell.
    ///
    /// Fails unless the underlying output was created with `O`'s element type.
    /// The nil output converts to any variant.
    pub fn downcast<O: TypedOutput>(&self) -> Result<O, Error> {
        let expected = <O::Element as crate::Element>::element_type();
        if self.0.is_nil() || self.0.element_type() == expected {
            Ok(O::from_state(self.0.clone()))
        } else {
            Err(Error::TypeMismatch { expected })
        }
    }
}

impl IdOutput {
    /// Await the id as a plain string.
    pub fn await_string(&self, ctx: &Context) -> Result<Resolved<String>, Error> {
        Ok(self.await_value(ctx)?.map(|id| id.as_str().to_owned()))
    }
}

impl UrnOutput {
    /// Await the urn as a plain string.
    pub fn await_string(&self, ctx: &Context) -> Result<Resolved<String>, Error> {
        Ok(self.await_value(ctx)?.map(|urn| urn.as_str().to_owned()))
    }
}
