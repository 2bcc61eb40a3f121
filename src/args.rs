use clap::Parser;

const CMD_NAME: &str = "ev";
const DEFAULT_STACK: &str = "dev";
const DEFAULT_LATENCY_MS: u64 = 50;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Stores our command-line args format.
#[derive(Parser)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Stack name, used in resource urns
    #[arg(short, long, value_name = "NAME", default_value = DEFAULT_STACK)]
    #[arg(env = "EVENTUAL_STACK")]
    pub stack: String,

    /// Preview outputs without creating anything
    #[arg(short, long)]
    pub preview: bool,

    /// Simulated provider latency
    #[arg(short, long, value_name = "MS", default_value_t = DEFAULT_LATENCY_MS)]
    pub latency: u64,

    /// Give up on the deployment after this long
    #[arg(short, long, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    #[arg(env = "EVENTUAL_TIMEOUT")]
    pub timeout: u64,

    /// Also write the final report to this file
    #[arg(short, long, value_name = "FILE")]
    #[arg(env = "EVENTUAL_OUTPUT")]
    pub output: Option<String>,

    /// Make creating this resource fail
    #[arg(short, long, value_name = "RESOURCE")]
    pub fail: Option<String>,

    /// Delete created resources after reporting
    #[arg(short, long)]
    pub destroy: bool,

    /// Print additional debugging info (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
