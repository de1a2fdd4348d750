//! Connection parameters and run options.

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default server port.
pub const DEFAULT_PORT: u16 = 5432;
/// Default login role. Also the default password and database name.
pub const DEFAULT_USERNAME: &str = "postgres";

/// TLS negotiation mode, following libpq's `sslmode` names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SslMode {
    /// Plain TCP only.
    Disable,
    /// Either plain TCP or TLS. Negotiated like `prefer`.
    Allow,
    /// Try TLS first, fall back to plain TCP.
    #[default]
    Prefer,
    /// TLS only. The server certificate is not verified against a CA.
    Require,
    /// TLS only. The certificate chain is verified, the host name is not.
    VerifyCa,
    /// TLS only. Both the certificate chain and the host name are verified.
    VerifyFull,
}

impl SslMode {
    pub(crate) fn to_postgres(self) -> postgres::config::SslMode {
        match self {
            SslMode::Disable => postgres::config::SslMode::Disable,
            SslMode::Allow | SslMode::Prefer => postgres::config::SslMode::Prefer,
            SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => {
                postgres::config::SslMode::Require
            }
        }
    }

    /// True if the server certificate must chain to a trusted root.
    pub fn verifies_certificate(self) -> bool {
        matches!(self, SslMode::VerifyCa | SslMode::VerifyFull)
    }
}

/// Parameters of a single database connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: SslMode,
    /// PEM file with trusted root certificates for the verify modes.
    pub sslrootcert: Option<PathBuf>,
}

impl ConnectionParams {
    /// Builds parameters, falling back to the username for a missing
    /// password or database name.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: Option<String>,
        dbname: Option<String>,
    ) -> Self {
        let username = username.into();
        Self {
            host: host.into(),
            port,
            password: password.unwrap_or_else(|| username.clone()),
            dbname: dbname.unwrap_or_else(|| username.clone()),
            username,
            sslmode: SslMode::default(),
            sslrootcert: None,
        }
    }

    pub fn with_sslmode(mut self, sslmode: SslMode) -> Self {
        self.sslmode = sslmode;
        self
    }

    pub fn with_sslrootcert(mut self, path: Option<PathBuf>) -> Self {
        self.sslrootcert = path;
        self
    }

    /// Same server and credentials, different database.
    pub fn with_dbname(&self, dbname: &str) -> Self {
        Self {
            dbname: dbname.to_string(),
            ..self.clone()
        }
    }

    /// Converts to a driver config.
    pub fn to_postgres_config(&self) -> postgres::Config {
        let mut config = postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.username)
            .password(&self.password)
            .dbname(&self.dbname)
            .ssl_mode(self.sslmode.to_postgres())
            .application_name("pgdatadog");
        config
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT, DEFAULT_USERNAME, None, None)
    }
}

// Password is never printed.
impl fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.dbname
        )
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("dbname", &self.dbname)
            .field("sslmode", &self.sslmode)
            .field("sslrootcert", &self.sslrootcert)
            .finish()
    }
}

/// What to do with the integration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Action {
    #[default]
    Install,
    Remove,
}

/// What to do after a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and run the remaining steps.
    #[default]
    Continue,
    /// Stop at the first failed step.
    Halt,
}

/// Everything a provisioning run needs.
#[derive(Debug, Clone, Default)]
pub struct ProvisionOptions {
    pub connection: ConnectionParams,
    pub action: Action,
    /// Apply to every non-system database instead of `connection.dbname` only.
    pub all_databases: bool,
    /// Password for the monitoring user. Generated when `None`.
    pub monitoring_password: Option<String>,
    pub failure_policy: FailurePolicy,
}
