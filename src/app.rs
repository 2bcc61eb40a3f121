use std::sync::Arc;

use anyhow::{Context as _, Result};

use output::{
    BoolOutput, Context, Element, Id, Registry, StringArrayOutput, StringOutput, TypedOutput,
};
use resource::{Deployment, Inputs, Provider, Resource};

use crate::memory::{Kind, MemoryProvider};
use crate::report::{Report, ResourceReport};
use crate::settings::Settings;
use crate::ui::Ui;

/// Names of the resources the demo program registers.
pub const RESOURCE_NAMES: &[&str] = &["bucket", "object"];

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0} of {1} resources failed")]
    ResourcesFailed(usize, usize),
}

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        let ui = Ui::new(&settings);
        Self { settings, ui }
    }

    /// Deploy the demo program, then report on every resource.
    pub fn run(self) -> Result<()> {
        let ctx = Context::new().with_timeout(self.settings.timeout);
        let registry = Arc::new(Registry::with_builtins());
        let deployment = Deployment::new(
            self.settings.stack.clone(),
            self.settings.mode,
            registry,
            ctx.clone(),
        );

        self.ui.start(self.settings.mode, &self.settings.stack);
        let program = Program::register(&deployment, &self.settings)
            .context("while registering resources")?;

        self.ui.verbose_msg("Waiting for resources...");
        let outcomes = deployment.wait(&ctx);
        let report = program.report(&ctx, &self.settings);
        self.ui.print_report(&report);

        if let Some(path) = &self.settings.output {
            std::fs::write(path, report.to_string())
                .with_context(|| format!("while writing report to {path:?}"))?;
        }

        if self.settings.destroy {
            let count = deployment.destroy(&ctx)?;
            self.ui.deleted(count);
        }

        let failed = outcomes.iter().filter(|outcome| !outcome.is_ok()).count();
        if failed > 0 {
            return Err(Error::ResourcesFailed(failed, outcomes.len()).into());
        }
        Ok(())
    }
}

/// The resources of the demo program, and the outputs derived from them.
struct Program {
    bucket: Resource,
    object: Resource,
    ids: StringArrayOutput,
}

impl Program {
    fn register(deployment: &Deployment, settings: &Settings) -> Result<Self> {
        let provider = |kind: Kind| -> Arc<dyn Provider> {
            Arc::new(MemoryProvider::new(kind, settings.latency, settings.fail.clone()))
        };

        let bucket = deployment.register(
            provider(Kind::Bucket),
            RESOURCE_NAMES[0],
            Inputs::new()
                .with("prefix", StringOutput::known(String::from("photos")))
                .with("versioned", BoolOutput::known(true)),
        )?;

        // the object lives under the bucket's generated name:
        let host = bucket
            .output::<StringOutput>("name")?
            .apply_with_context(deployment.context(), |_, name| format!("{name}.buckets.local"));
        let object = deployment.register(
            provider(Kind::Object),
            RESOURCE_NAMES[1],
            Inputs::new()
                .with("bucket", host)
                .with("key", StringOutput::known(String::from("cat.jpg")))
                .with("content", StringOutput::known(String::from("meow"))),
        )?;

        let ids = output::all_with_context(deployment.context(), &[bucket.id(), object.id()])
            .apply(|ids| {
                ids.iter()
                    .filter_map(Id::from_value)
                    .map(|id| id.to_string())
                    .collect::<Vec<String>>()
            });

        Ok(Self {
            bucket,
            object,
            ids,
        })
    }

    fn report(&self, ctx: &Context, settings: &Settings) -> Report {
        Report {
            stack: settings.stack.clone(),
            mode: settings.mode,
            resources: vec![
                ResourceReport::collect(ctx, &self.bucket),
                ResourceReport::collect(ctx, &self.object),
            ],
            ids: self.ids.await_value(ctx),
        }
    }
}
