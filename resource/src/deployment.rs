use std::collections::BTreeMap;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use anyhow::Context as _;
use parking_lot::Mutex;

use output::{
    Context, Dependencies, Id, IdOutput, OutputState, Registry, Resolved, Resolver,
    TypedOutput, Urn, Value,
};

use crate::{
    await_properties, make_urn, Error, Inputs, OutputSpec, PropertyValue, Provider, Resource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Predict outputs without creating anything.
    Preview,
    /// Create resources for real.
    Update,
}

/// How one registered resource ended up.
#[derive(Debug)]
pub struct Outcome {
    pub urn: Urn,
    /// The resource's id; unknown for a successful preview.
    pub result: Result<Resolved<Id>, output::Error>,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Clone)]
struct Entry {
    urn: Urn,
    provider: Arc<dyn Provider>,
    id: IdOutput,
}

/// Registers resources and drives their providers.
///
/// Each registered resource gets its own worker thread, which waits for the
/// resource's inputs, asks the provider for outputs, and settles them.
/// Resources whose inputs come from other resources therefore wait on
/// each other without any explicit ordering by the caller.
pub struct Deployment {
    stack: String,
    mode: Mode,
    registry: Arc<Registry>,
    ctx: Context,
    entries: Mutex<Vec<Entry>>,
}

impl Deployment {
    pub fn new(stack: impl Into<String>, mode: Mode, registry: Arc<Registry>, ctx: Context) -> Self {
        Self {
            stack: stack.into(),
            mode,
            registry,
            ctx,
            entries: Mutex::new(Vec::with_capacity(8)),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register resource `name`, managed by `provider`, created from `inputs`.
    ///
    /// Returns immediately. The resource's outputs all depend on its urn,
    /// and settle once the provider has answered (or the inputs failed).
    pub fn register(
        &self,
        provider: Arc<dyn Provider>,
        name: &str,
        inputs: Inputs,
    ) -> Result<Resource, Error> {
        let urn = make_urn(&self.stack, provider.type_token(), name);

        // held until the entry is pushed, so duplicates can't race:
        let mut entries = self.entries.lock();
        if entries.iter().any(|entry| entry.urn == urn) {
            return Err(Error::DuplicateResource(urn));
        }

        let deps = Dependencies::single(urn.clone());
        let schema = provider.schema();
        let mut outputs = BTreeMap::new();
        let mut pending = Vec::with_capacity(schema.len());
        for spec in schema.iter() {
            let (state, resolver) = OutputState::pending(spec.element_type(), deps.clone());
            let variant = self.registry.lookup(spec.element_type());
            outputs.insert(spec.name().to_owned(), variant.construct(state));
            pending.push((*spec, resolver));
        }
        let (id, id_resolver) = IdOutput::pending(deps);
        let input_deps = inputs.dependencies();

        log::debug!(
            "registering {urn} with {} inputs depending on {} resources",
            inputs.len(),
            input_deps.len()
        );

        let job = Job {
            urn: urn.clone(),
            mode: self.mode,
            ctx: self.ctx.clone(),
            provider: provider.clone(),
            inputs,
            outputs: pending,
            id: id_resolver,
        };
        thread::Builder::new()
            .name(format!("register {name}"))
            .spawn(move || job.run())
            .map_err(|e| Error::Spawn(urn.clone(), e))?;

        entries.push(Entry {
            urn: urn.clone(),
            provider,
            id: id.clone(),
        });
        Ok(Resource::new(urn, id, outputs, input_deps))
    }

    /// Block until every registered resource has settled.
    ///
    /// Outcomes are in registration order.
    pub fn wait(&self, ctx: &Context) -> Vec<Outcome> {
        let entries = self.entries.lock().clone();
        entries
            .into_iter()
            .map(|entry| Outcome {
                result: entry.id.await_value(ctx),
                urn: entry.urn,
            })
            .collect()
    }

    /// Delete every created resource, in reverse registration order.
    ///
    /// Resources that failed to create are skipped. Returns the number deleted.
    pub fn destroy(&self, ctx: &Context) -> anyhow::Result<usize> {
        if self.mode == Mode::Preview {
            return Ok(0);
        }
        let entries = self.entries.lock().clone();
        let mut deleted = 0;
        for entry in entries.iter().rev() {
            match entry.id.await_value(ctx) {
                Ok(Resolved::Known(id)) => {
                    entry
                        .provider
                        .delete(ctx, &id)
                        .with_context(|| format!("while deleting {}", entry.urn))?;
                    log::info!("deleted {} ({id})", entry.urn);
                    deleted += 1;
                }
                Ok(Resolved::Unknown) => (),
                Err(e) if ctx.err().is_some() => return Err(e.into()),
                Err(e) => log::debug!("not deleting {}: {e}", entry.urn),
            }
        }
        Ok(deleted)
    }
}

impl fmt::Debug for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployment")
            .field("stack", &self.stack)
            .field("mode", &self.mode)
            .field("resources", &self.entries.lock().len())
            .finish()
    }
}

/// Work done on a resource's thread.
struct Job {
    urn: Urn,
    mode: Mode,
    ctx: Context,
    provider: Arc<dyn Provider>,
    inputs: Inputs,
    outputs: Vec<(OutputSpec, Resolver)>,
    id: Resolver<Id>,
}

impl Job {
    fn run(self) {
        // a panicking provider must still settle every output, or waiters hang:
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.complete()))
            .unwrap_or_else(|payload| {
                Err(Error::Panicked(self.urn.clone(), panic_message(payload.as_ref())).into())
            });
        match result {
            Ok(Resolved::Known(id)) => {
                log::info!("created {} ({id})", self.urn);
                self.id.resolve(id);
            }
            Ok(Resolved::Unknown) => {
                log::debug!("previewed {}", self.urn);
                self.id.resolve_unknown();
            }
            Err(e) => {
                log::warn!("{} failed: {e:#}", self.urn);
                let err = output::Error::from(e);
                for (_, resolver) in &self.outputs {
                    resolver.reject(err.clone());
                }
                self.id.reject(err);
            }
        }
    }

    /// Settle every output, returning the id to settle last.
    ///
    /// On error, no output has been settled yet. If the provider panics,
    /// outputs it already settled keep their values and the rest are rejected.
    fn complete(&self) -> anyhow::Result<Resolved<Id>> {
        let inputs = await_properties(&self.ctx, &self.inputs)?;

        let failures = self.provider.check(&inputs);
        if !failures.is_empty() {
            return Err(Error::CheckFailed {
                urn: self.urn.clone(),
                failures,
            }
            .into());
        }

        match self.mode {
            Mode::Preview => {
                let mut values = self
                    .provider
                    .preview(&self.urn, &inputs)
                    .unwrap_or_default();
                for (spec, resolver) in &self.outputs {
                    match values.remove(spec.name()) {
                        Some(PropertyValue::Known(value)) => settle(resolver, spec, value),
                        _ => {
                            resolver.resolve_unknown();
                        }
                    }
                }
                Ok(Resolved::Unknown)
            }
            Mode::Update => {
                if let Some((name, _)) = inputs.iter().find(|(_, v)| !v.is_known()) {
                    return Err(Error::UnknownInput(name.clone()).into());
                }
                let mut created = self
                    .provider
                    .create(&self.ctx, &self.urn, &inputs)
                    .with_context(|| format!("while creating {}", self.urn))?;
                for (spec, resolver) in &self.outputs {
                    match created.outputs.remove(spec.name()) {
                        Some(value) => settle(resolver, spec, value),
                        None => {
                            let missing = Error::MissingOutput {
                                urn: self.urn.clone(),
                                name: spec.name().to_owned(),
                            };
                            resolver.reject(output::Error::failed(missing));
                        }
                    }
                }
                Ok(Resolved::Known(created.id))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        String::from(*s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic")
    }
}

fn settle(resolver: &Resolver, spec: &OutputSpec, value: Value) {
    if spec.element_type().accepts(&value) {
        resolver.resolve(value);
    } else {
        resolver.reject(output::Error::TypeMismatch {
            expected: spec.element_type(),
        });
    }
}
