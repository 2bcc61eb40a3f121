use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use parking_lot::Mutex;

use output::{Context, Id, Urn};
use resource::{urn_name, CheckFailure, Created, PropertyMap, PropertyValue, Provider, Schema};

/// The kinds of resource a [`MemoryProvider`] can manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Inputs: `prefix` (required), `versioned`. Outputs: `name`, `versioned`.
    Bucket,
    /// Inputs: `bucket`, `key` (both required), `content`. Outputs: `url`, `size`.
    Object,
}

impl Kind {
    fn type_token(&self) -> &'static str {
        match self {
            Self::Bucket => "memory:index:Bucket",
            Self::Object => "memory:index:Object",
        }
    }

    fn schema(&self) -> Schema {
        match self {
            Self::Bucket => Schema::new().with::<String>("name").with::<bool>("versioned"),
            Self::Object => Schema::new().with::<String>("url").with::<u64>("size"),
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::Object => "object",
        }
    }
}

/// A provider that keeps its resources in memory.
///
/// Every create call sleeps for the configured latency first,
/// so that the outputs of a deployment stay pending for a while.
pub struct MemoryProvider {
    kind: Kind,
    schema: Schema,
    latency: Duration,
    /// name of a resource whose creation should fail
    fail: Option<String>,
    next_id: AtomicU64,
    store: Mutex<BTreeMap<Id, PropertyMap>>,
}

impl MemoryProvider {
    pub fn new(kind: Kind, latency: Duration, fail: Option<String>) -> Self {
        Self {
            kind,
            schema: kind.schema(),
            latency,
            fail,
            next_id: AtomicU64::new(1),
            store: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of resources currently stored.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    fn create_bucket(&self, n: u64, inputs: &PropertyMap) -> Result<Created> {
        let prefix = required_string(inputs, "prefix")?;
        let versioned = inputs
            .get("versioned")
            .and_then(PropertyValue::get::<bool>)
            .unwrap_or(false);
        Ok(Created::new(format!("bucket-{n:04}"))
            .with("name", format!("{prefix}-{n:04x}"))
            .with("versioned", versioned))
    }

    fn create_object(&self, n: u64, inputs: &PropertyMap) -> Result<Created> {
        let bucket = required_string(inputs, "bucket")?;
        let key = required_string(inputs, "key")?;
        let content = optional_string(inputs, "content").unwrap_or_default();
        Ok(Created::new(format!("object-{n:04}"))
            .with("url", format!("memory://{bucket}/{key}"))
            .with("size", content.len() as u64))
    }
}

impl Provider for MemoryProvider {
    fn type_token(&self) -> &str {
        self.kind.type_token()
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn check(&self, inputs: &PropertyMap) -> Vec<CheckFailure> {
        let required: &[&str] = match self.kind {
            Kind::Bucket => &["prefix"],
            Kind::Object => &["bucket", "key"],
        };
        let mut failures = Vec::new();
        for name in required {
            match inputs.get(*name) {
                None => failures.push(CheckFailure::new(*name, "required")),
                Some(PropertyValue::Known(value)) => match value.downcast_ref::<String>() {
                    Some(s) if s.is_empty() => failures.push(CheckFailure::new(*name, "empty")),
                    Some(_) => (),
                    None => failures.push(CheckFailure::new(*name, "must be a string")),
                },
                // can't tell yet:
                Some(PropertyValue::Unknown) => (),
            }
        }
        if let Some(prefix) = optional_string(inputs, "prefix") {
            if prefix.chars().any(|c| c.is_ascii_uppercase()) {
                failures.push(CheckFailure::new("prefix", "must be lowercase"));
            }
        }
        failures
    }

    fn preview(&self, _urn: &Urn, inputs: &PropertyMap) -> Option<PropertyMap> {
        let mut values = PropertyMap::new();
        match self.kind {
            Kind::Bucket => {
                // the name gets a generated suffix, so only `versioned` is predictable:
                let versioned = inputs
                    .get("versioned")
                    .cloned()
                    .unwrap_or_else(|| PropertyValue::known(false));
                values.insert(String::from("versioned"), versioned);
            }
            Kind::Object => {
                if let Some(content) = optional_string(inputs, "content") {
                    values.insert(String::from("size"), PropertyValue::known(content.len() as u64));
                }
                let bucket = optional_string(inputs, "bucket");
                let key = optional_string(inputs, "key");
                if let (Some(bucket), Some(key)) = (bucket, key) {
                    let url = format!("memory://{bucket}/{key}");
                    values.insert(String::from("url"), PropertyValue::known(url));
                }
            }
        }
        Some(values)
    }

    fn create(&self, ctx: &Context, urn: &Urn, inputs: &PropertyMap) -> Result<Created> {
        thread::sleep(self.latency);
        if let Some(e) = ctx.err() {
            return Err(e.into());
        }
        if self.fail.as_deref() == Some(urn_name(urn)) {
            bail!("injected failure");
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let created = match self.kind {
            Kind::Bucket => self.create_bucket(n, inputs)?,
            Kind::Object => self.create_object(n, inputs)?,
        };
        log::debug!("stored {} {}", self.kind.id_prefix(), created.id);
        self.store.lock().insert(created.id.clone(), inputs.clone());
        Ok(created)
    }

    fn delete(&self, _ctx: &Context, id: &Id) -> Result<()> {
        match self.store.lock().remove(id) {
            Some(_) => Ok(()),
            None => bail!("no {} with id {id}", self.kind.id_prefix()),
        }
    }
}

fn optional_string(inputs: &PropertyMap, name: &str) -> Option<String> {
    inputs.get(name).and_then(PropertyValue::get::<String>)
}

fn required_string(inputs: &PropertyMap, name: &str) -> Result<String> {
    match optional_string(inputs, name) {
        Some(s) => Ok(s),
        None => bail!("missing input \"{name}\""),
    }
}
