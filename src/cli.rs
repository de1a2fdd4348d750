//! Command-line arguments.
//!
//! Connection flags mirror `psql`: each falls back to the standard libpq
//! environment variable, then to a built-in default.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::{
    Action, ConnectionParams, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_USERNAME, FailurePolicy,
    ProvisionOptions, SslMode,
};

/// Configures Datadog monitoring on a PostgreSQL server.
#[derive(Parser, Debug)]
#[command(
    name = "pgdatadog",
    about = "Configures Datadog monitoring on PostgreSQL (Cloud SQL)",
    version,
    disable_help_flag = true
)]
pub struct Args {
    /// Show this help message.
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Database server host.
    #[arg(short = 'h', long, env = "PGHOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Database server port.
    #[arg(short = 'p', long, env = "PGPORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Database user name.
    #[arg(short = 'U', long, env = "PGUSER", default_value = DEFAULT_USERNAME)]
    pub username: String,

    /// Database user password (default: the user name).
    #[arg(short = 'W', long, env = "PGPASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database name to connect to (default: the user name).
    #[arg(short = 'd', long, env = "PGDATABASE")]
    pub dbname: Option<String>,

    /// TLS mode for every connection.
    #[arg(long, env = "PGSSLMODE", value_enum, default_value_t = SslMode::Prefer)]
    pub sslmode: SslMode,

    /// Trusted root certificates (PEM) for --sslmode verify-ca/verify-full.
    #[arg(long, env = "PGSSLROOTCERT", value_name = "PATH")]
    pub sslrootcert: Option<PathBuf>,

    /// Configure Datadog on the database(s). This is the default action.
    #[arg(short = 'I', long, conflicts_with = "remove")]
    pub install: bool,

    /// Remove the Datadog configuration from the database(s).
    #[arg(short = 'R', long)]
    pub remove: bool,

    /// Apply to every database on the server instead of just --dbname.
    #[arg(short = 'a', long)]
    pub all_databases: bool,

    /// Password for the datadog user. A random one is generated and printed
    /// if not set.
    #[arg(long, value_name = "PASSWORD")]
    pub dd_password: Option<String>,

    /// Stop at the first failed step and exit with status 1.
    #[arg(long)]
    pub halt_on_error: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn action(&self) -> Action {
        if self.remove {
            Action::Remove
        } else {
            Action::Install
        }
    }

    pub fn to_options(&self) -> ProvisionOptions {
        let connection = ConnectionParams::new(
            self.host.clone(),
            self.port,
            self.username.clone(),
            self.password.clone(),
            self.dbname.clone(),
        )
        .with_sslmode(self.sslmode)
        .with_sslrootcert(self.sslrootcert.clone());

        ProvisionOptions {
            connection,
            action: self.action(),
            all_databases: self.all_databases,
            monitoring_password: self.dd_password.clone(),
            failure_policy: if self.halt_on_error {
                FailurePolicy::Halt
            } else {
                FailurePolicy::Continue
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("pgdatadog").chain(args.iter().copied()))
    }

    #[test]
    fn short_flags_follow_psql() {
        let args = parse(&[
            "-h", "db.internal", "-p", "6543", "-U", "admin", "-W", "pw", "-d", "app", "-a",
        ])
        .unwrap();
        let options = args.to_options();

        assert_eq!(options.connection.host, "db.internal");
        assert_eq!(options.connection.port, 6543);
        assert_eq!(options.connection.username, "admin");
        assert_eq!(options.connection.password, "pw");
        assert_eq!(options.connection.dbname, "app");
        assert!(options.all_databases);
        assert_eq!(options.action, Action::Install);
        assert_eq!(options.failure_policy, FailurePolicy::Continue);
        assert_eq!(options.monitoring_password, None);
    }

    #[test]
    fn long_flags_and_extras() {
        let args = parse(&[
            "--host",
            "10.0.0.5",
            "--dd-password",
            "agentpw",
            "--sslmode",
            "require",
            "--halt-on-error",
            "-vv",
        ])
        .unwrap();
        let options = args.to_options();

        assert_eq!(options.connection.host, "10.0.0.5");
        assert_eq!(options.connection.sslmode, SslMode::Require);
        assert_eq!(options.monitoring_password.as_deref(), Some("agentpw"));
        assert_eq!(options.failure_policy, FailurePolicy::Halt);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn libpq_sslmode_values_are_accepted_from_env() {
        // SAFETY: only this test writes PGSSLMODE/PGSSLROOTCERT, and every
        // other parse in this module accepts the valid values set here.
        unsafe {
            std::env::set_var("PGSSLMODE", "verify-full");
            std::env::set_var("PGSSLROOTCERT", "/etc/ssl/cloudsql/server-ca.pem");
        }
        let result = parse(&[]);
        unsafe {
            std::env::remove_var("PGSSLMODE");
            std::env::remove_var("PGSSLROOTCERT");
        }

        let options = result.unwrap().to_options();
        assert_eq!(options.connection.sslmode, SslMode::VerifyFull);
        assert_eq!(
            options.connection.sslrootcert,
            Some(PathBuf::from("/etc/ssl/cloudsql/server-ca.pem"))
        );

        for (value, mode) in [
            ("allow", SslMode::Allow),
            ("verify-ca", SslMode::VerifyCa),
            ("disable", SslMode::Disable),
        ] {
            let args = parse(&["--sslmode", value]).unwrap();
            assert_eq!(args.sslmode, mode);
        }
    }

    #[test]
    fn remove_selects_remove_action() {
        let args = parse(&["-R"]).unwrap();
        assert_eq!(args.action(), Action::Remove);

        let args = parse(&["--install"]).unwrap();
        assert_eq!(args.action(), Action::Install);
    }

    #[test]
    fn install_and_remove_conflict() {
        let err = parse(&["-I", "-R"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = parse(&["-p", "not-a-port"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn help_is_long_only() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }
}
