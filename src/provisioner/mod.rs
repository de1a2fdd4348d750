//! Datadog monitoring provisioner.
//!
//! Installs the objects the Datadog agent needs on a PostgreSQL server:
//! - the `datadog` login role, member of `pg_monitor` (once per server)
//! - the `datadog` schema and `pg_stat_statements` extension (per database)
//! - `USAGE` on `datadog` and `public` for the `datadog` role (per database)
//! - `datadog.explain_statement()` for execution plan capture (per database)
//!
//! ## Failure handling
//!
//! Every step returns a `Result`. The caller records it in an
//! [`InstallReport`], which logs failures and, under
//! [`FailurePolicy::Halt`], stops the run. With the default
//! [`FailurePolicy::Continue`] every step is attempted regardless of earlier
//! failures.
//!
//! ## Connections
//!
//! One administrative connection creates the role. In all-databases mode a
//! fresh connection is opened for each target database, used for the whole
//! per-database sequence, and closed before the next one is opened.

mod password;
mod report;
mod session;
mod sql;

#[cfg(test)]
mod mock;

use std::io::{self, Stdout, Write};

use tracing::{debug, error, info, warn};

use crate::config::{Action, FailurePolicy, ProvisionOptions};
use crate::profile::{DATADOG, MonitoringProfile};

pub use password::{PASSWORD_LENGTH, generate_password};
pub use report::{Halted, InstallReport, Step, StepReport};
pub use session::{Connector, PgConnector, PgSession, Session};
pub use sql::{RESERVED_DATABASES, TEMPLATE_PREFIX, is_target_database, quote_literal};

/// Error type for provisioning steps.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Could not open a connection.
    #[error("cannot connect to {target}: {message}")]
    Connect { target: String, message: String },
    /// A DDL or GRANT statement failed.
    #[error("statement failed: {0}")]
    Statement(String),
    /// A catalog query failed.
    #[error("query failed: {0}")]
    Query(String),
    /// TLS setup failed.
    #[error("TLS: {0}")]
    Tls(String),
    /// Closing a connection failed.
    #[error("closing connection to {database}: {message}")]
    Close { database: String, message: String },
    /// Could not write the generated credential.
    #[error("writing credential: {0}")]
    Output(#[from] io::Error),
    /// The requested action has no implementation.
    #[error("{0} is not supported yet")]
    Unsupported(&'static str),
}

/// Formats PostgreSQL error message for display.
pub(crate) fn format_postgres_error(e: &postgres::Error) -> String {
    if let Some(db_error) = e.as_db_error() {
        format!("{}: {}", db_error.severity(), db_error.message())
    } else {
        let msg = e.to_string();
        if msg.contains("Connection refused") {
            "connection refused".to_string()
        } else if msg.contains("password authentication failed") {
            "password authentication failed".to_string()
        } else if msg.contains("does not exist") {
            msg.split("FATAL:")
                .last()
                .unwrap_or(&msg)
                .trim()
                .to_string()
        } else {
            msg
        }
    }
}

/// Closes `session` and records the outcome.
fn release<S: Session>(session: S, report: &mut InstallReport) -> Result<(), Halted> {
    let dbname = session.dbname().to_string();
    let result = session.close();
    if result.is_ok() {
        debug!("closed connection to {}", dbname);
    }
    report.record(&dbname, Step::Close, &result)
}

/// Runs the install workflow through a [`Connector`].
///
/// The generated credential line is written to `out` (stdout by default).
pub struct Provisioner<C: Connector, W: Write = Stdout> {
    connector: C,
    profile: MonitoringProfile,
    out: W,
}

impl<C: Connector> Provisioner<C, Stdout> {
    pub fn new(connector: C) -> Self {
        Self::with_output(connector, io::stdout())
    }
}

impl<C: Connector, W: Write> Provisioner<C, W> {
    pub fn with_output(connector: C, out: W) -> Self {
        Self {
            connector,
            profile: DATADOG,
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Dispatches on `options.action`.
    pub fn run(&mut self, options: &ProvisionOptions) -> Result<InstallReport, ProvisionError> {
        match options.action {
            Action::Install => Ok(self.install(options)),
            Action::Remove => self.remove(options).map(|()| InstallReport::default()),
        }
    }

    /// Lists the databases eligible for all-databases mode.
    ///
    /// Excludes template databases, `cloudsqladmin` and `postgres`.
    pub fn list_target_databases<S: Session>(
        &self,
        session: &mut S,
    ) -> Result<Vec<String>, ProvisionError> {
        debug!("listing databases on {}", session.dbname());
        let mut databases = session.query_column(sql::LIST_DATABASES_QUERY)?;
        databases.retain(|db| is_target_database(db));
        Ok(databases)
    }

    /// Creates the monitoring role and returns its password.
    ///
    /// A password is generated when `password` is `None`. On success the
    /// credential is written to the output, which is the only place a
    /// generated password is ever shown.
    pub fn create_monitoring_user<S: Session>(
        &mut self,
        session: &mut S,
        password: Option<&str>,
    ) -> Result<String, ProvisionError> {
        let user = self.profile.user;
        let password = match password {
            Some(p) => p.to_string(),
            None => generate_password(),
        };

        debug!("creating user {} on {}", user, session.dbname());
        session.execute_all(&[sql::create_user(user, &password)])?;

        let shown = writeln!(self.out, "Created user {} with password '{}'", user, password)
            .and_then(|()| self.out.flush());
        if let Err(e) = shown {
            error!(
                "user {} was created but its password could not be shown ({}); reset it with ALTER USER",
                user, e
            );
            return Err(e.into());
        }
        Ok(password)
    }

    /// Grants each of `roles` to `user`, one statement per role.
    pub fn grant_roles_to_user<S: Session>(
        &self,
        session: &mut S,
        user: &str,
        roles: &[&str],
    ) -> Result<(), ProvisionError> {
        debug!("granting {} to {} on {}", roles.join(", "), user, session.dbname());
        let statements: Vec<String> = roles.iter().map(|role| sql::grant_role(role, user)).collect();
        session.execute_all(&statements)
    }

    pub fn enable_extension<S: Session>(
        &self,
        session: &mut S,
        extension: &str,
    ) -> Result<(), ProvisionError> {
        debug!("enabling extension {} on {}", extension, session.dbname());
        session.execute_all(&[sql::create_extension(extension)])
    }

    pub fn create_schemas<S: Session>(
        &self,
        session: &mut S,
        schemas: &[&str],
    ) -> Result<(), ProvisionError> {
        debug!("creating schemas on {}", session.dbname());
        let statements: Vec<String> = schemas.iter().map(|s| sql::create_schema(s)).collect();
        session.execute_all(&statements)
    }

    /// Issues `GRANT <grant> ON SCHEMA <schema> TO <user>` for every pair,
    /// grants in the outer loop.
    pub fn grant_on_schemas<S: Session>(
        &self,
        session: &mut S,
        schemas: &[&str],
        grants: &[&str],
        user: &str,
    ) -> Result<(), ProvisionError> {
        let mut statements = Vec::with_capacity(grants.len() * schemas.len());
        for grant in grants {
            for schema in schemas {
                debug!(
                    "granting {} on schema {} on {}",
                    grant,
                    schema,
                    session.dbname()
                );
                statements.push(sql::grant_on_schema(grant, schema, user));
            }
        }
        session.execute_all(&statements)
    }

    pub fn create_execution_plan_function<S: Session>(
        &self,
        session: &mut S,
    ) -> Result<(), ProvisionError> {
        debug!(
            "creating {}.{} on {}",
            self.profile.schema,
            crate::profile::EXPLAIN_FUNCTION,
            session.dbname()
        );
        session.execute_all(&[self.profile.explain_function_ddl()])
    }

    /// Installs the per-database objects on `session`'s database.
    pub fn install_on<S: Session>(
        &self,
        session: &mut S,
        report: &mut InstallReport,
    ) -> Result<(), Halted> {
        let profile = self.profile;
        let database = session.dbname().to_string();
        info!("installing on database {}", database);

        let result = self.create_schemas(session, &[profile.schema]);
        report.record(&database, Step::CreateSchemas, &result)?;

        let result = self.enable_extension(session, profile.extension);
        report.record(&database, Step::EnableExtension, &result)?;

        let result = self.grant_on_schemas(
            session,
            profile.granted_schemas,
            profile.schema_grants,
            profile.user,
        );
        report.record(&database, Step::GrantOnSchemas, &result)?;

        let result = self.create_execution_plan_function(session);
        report.record(&database, Step::CreateExplainFunction, &result)
    }

    /// Runs the install workflow and returns the outcome of every step.
    pub fn install(&mut self, options: &ProvisionOptions) -> InstallReport {
        let mut report = InstallReport::new(options.failure_policy);
        info!("installing Datadog integration via {}", options.connection);

        if self.install_inner(options, &mut report).is_err() {
            warn!("stopped after first failure");
        }

        info!(
            "finished: {} database(s), {} step(s) succeeded, {} failed",
            report.databases().len(),
            report.succeeded(),
            report.failed()
        );
        report
    }

    fn install_inner(
        &mut self,
        options: &ProvisionOptions,
        report: &mut InstallReport,
    ) -> Result<(), Halted> {
        let params = &options.connection;
        let result = self.connector.connect(params);
        report.record(&params.dbname, Step::Connect, &result)?;
        let Ok(mut admin) = result else {
            return Ok(());
        };

        let outcome = self.install_with_admin(&mut admin, options, report);
        let closed = release(admin, report);
        outcome.and(closed)
    }

    fn install_with_admin(
        &mut self,
        admin: &mut C::Session,
        options: &ProvisionOptions,
        report: &mut InstallReport,
    ) -> Result<(), Halted> {
        let profile = self.profile;
        let admin_db = admin.dbname().to_string();

        let result = self.create_monitoring_user(admin, options.monitoring_password.as_deref());
        report.record(&admin_db, Step::CreateUser, &result)?;

        let result = self.grant_roles_to_user(admin, profile.user, profile.roles);
        report.record(&admin_db, Step::GrantRoles, &result)?;

        if !options.all_databases {
            return self.install_on(admin, report);
        }

        let result = self.list_target_databases(admin);
        report.record(&admin_db, Step::ListDatabases, &result)?;
        let databases = result.unwrap_or_default();
        info!("{} target database(s)", databases.len());

        for database in &databases {
            let result = self.connector.connect(&options.connection.with_dbname(database));
            report.record(database, Step::Connect, &result)?;
            let Ok(mut session) = result else {
                continue;
            };

            let outcome = self.install_on(&mut session, report);
            let closed = release(session, report);
            outcome?;
            closed?;
        }
        Ok(())
    }

    /// Removing the integration is not implemented.
    pub fn remove(&self, options: &ProvisionOptions) -> Result<(), ProvisionError> {
        debug!("remove requested via {}", options.connection);
        Err(ProvisionError::Unsupported(
            "removing the Datadog configuration",
        ))
    }
}

/// Returns true when `policy` and `report` call for a failing exit status.
///
/// A run that could not reach the server fails under every policy.
pub fn should_fail(policy: FailurePolicy, report: &InstallReport) -> bool {
    report.server_unreachable() || (policy == FailurePolicy::Halt && !report.is_success())
}
