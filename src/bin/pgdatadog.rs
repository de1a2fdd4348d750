//! pgdatadog - configures Datadog monitoring on a PostgreSQL server.
//!
//! Usage:
//!   pgdatadog -h 10.0.0.5 -U postgres        # install on $PGDATABASE (or the user's database)
//!   pgdatadog -h 10.0.0.5 -U postgres -a     # install on every non-system database
//!   pgdatadog --dd-password secret           # use a fixed password for the datadog user
//!
//! The generated datadog password is printed to stdout. Logs go to stderr.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::process::ExitCode;

use clap::Parser;
use tracing::{Level, debug, error};
use tracing_subscriber::EnvFilter;

use pgdatadog::cli::Args;
use pgdatadog::provisioner::{PgConnector, Provisioner, should_fail};

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = match format!("pgdatadog={}", level).parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let options = args.to_options();
    debug!("pgdatadog {} starting", env!("CARGO_PKG_VERSION"));

    let mut provisioner = Provisioner::new(PgConnector::new());
    match provisioner.run(&options) {
        Ok(report) if should_fail(options.failure_policy, &report) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
