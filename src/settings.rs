use std::path::PathBuf;
use std::time::Duration;

use resource::{Mode, URN_DELIM};

use crate::app::RESOURCE_NAMES;
use crate::args::Args;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("timeout must be at least one second")]
    ZeroTimeout,
    #[error("invalid stack name '{0}' (must be non-empty and not contain '::')")]
    InvalidStack(String),
    #[error("no resource named '{0}' (expected one of: {})", RESOURCE_NAMES.join(", "))]
    UnknownResource(String),
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. defaults are added in.
#[derive(Debug)]
pub struct Settings {
    pub stack: String,
    pub mode: Mode,
    pub latency: Duration,
    pub timeout: Duration,
    pub output: Option<PathBuf>,
    pub fail: Option<String>,
    pub destroy: bool,
    pub verbose: u8,
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        if args.timeout == 0 {
            return Err(Error::ZeroTimeout.into());
        }
        if args.stack.is_empty() || args.stack.contains(URN_DELIM) {
            return Err(Error::InvalidStack(args.stack).into());
        }
        if let Some(fail) = &args.fail {
            if !RESOURCE_NAMES.contains(&fail.as_str()) {
                return Err(Error::UnknownResource(fail.to_owned()).into());
            }
        }

        let mode = if args.preview {
            Mode::Preview
        } else {
            Mode::Update
        };

        Ok(Self {
            stack: args.stack,
            mode,
            latency: Duration::from_millis(args.latency),
            timeout: Duration::from_secs(args.timeout),
            output: args.output.map(PathBuf::from),
            fail: args.fail,
            destroy: args.destroy,
            verbose: args.verbose,
        })
    }
}
