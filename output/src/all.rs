use crate::applier::spawn_task;
use crate::{
    AnyArrayOutput, Context, Dependencies, Error, Output, OutputState, Resolved, TypedOutput, Value,
};

/// Join `outputs` into one output that resolves to the array of their values.
///
/// See [`all_with_context`].
pub fn all(outputs: &[&dyn Output]) -> AnyArrayOutput {
    all_with_context(&Context::background(), outputs)
}

/// Join `outputs` into one output that resolves to the array of their values,
/// in input order.
///
/// The result depends on every input's dependencies. It is unknown if any input is
/// unknown, and rejected with the first error (in input order) if any input is rejected.
/// Every input is awaited before the result settles, even after an error.
pub fn all_with_context(ctx: &Context, outputs: &[&dyn Output]) -> AnyArrayOutput {
    let deps = Dependencies::union(outputs.iter().map(|o| o.dependencies()));
    let states: Vec<OutputState> = outputs.iter().map(|o| o.state().clone()).collect();

    let (result, resolver) = AnyArrayOutput::pending(deps);
    let fallback = resolver.clone();
    let ctx = ctx.clone();
    spawn_task("output-all", &fallback, move || {
        resolver.fulfill(drain(&ctx, &states));
    });
    result
}

fn drain(ctx: &Context, states: &[OutputState]) -> Result<Resolved<Vec<Value>>, Error> {
    let mut slots: Vec<Option<Value>> = Vec::with_capacity(states.len());
    let mut known = true;
    let mut first_err = None;

    for state in states {
        match state.await_value(ctx) {
            Ok(Resolved::Known(value)) => slots.push(Some(value)),
            Ok(Resolved::Unknown) => {
                known = false;
                slots.push(None);
            }
            Err(e) => {
                first_err.get_or_insert(e);
                slots.push(None);
            }
        }
    }
    debug_assert_eq!(slots.len(), states.len());

    if let Some(e) = first_err {
        return Err(e);
    }
    if !known {
        return Ok(Resolved::Unknown);
    }
    Ok(Resolved::Known(slots.into_iter().flatten().collect()))
}
