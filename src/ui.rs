use std::time::Instant;

use colored::Colorize;

use resource::Mode;

use crate::report::Report;
use crate::settings::Settings;

/// All interactions with the text UI should go through this struct.
pub struct Ui {
    /// -v setting, displays extra text info to user
    pub verbose: bool,
    /// when the run started
    started: Instant,
}

impl Ui {
    pub fn new(settings: &Settings) -> Self {
        Self {
            verbose: settings.verbose > 0,
            started: Instant::now(),
        }
    }

    pub fn start(&self, mode: Mode, stack: &str) {
        let label = match mode {
            Mode::Preview => "PREVIEW".cyan(),
            Mode::Update => "UPDATE".green(),
        };
        eprintln!("{label} stack {stack}");
    }

    pub fn verbose_msg(&self, msg: &str) {
        if self.verbose {
            eprintln!("{}", msg);
        }
    }

    /// Print the report to stdout, then a one-line summary to stderr.
    pub fn print_report(&self, report: &Report) {
        print!("{report}");
        let failed = report.failed();
        if failed > 0 {
            eprintln!(
                "{} {failed} of {} resources failed",
                "FAILED".red(),
                report.resources.len()
            );
        } else {
            eprintln!("{} {} resources", "COMPLETED".green(), report.resources.len());
        }
        if self.verbose {
            eprintln!("Elapsed: {:.2?}", self.started.elapsed());
        }
    }

    pub fn deleted(&self, count: usize) {
        eprintln!("{} {count} resources", "DELETED".magenta());
    }
}
