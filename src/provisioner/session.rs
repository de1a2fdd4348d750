//! Database sessions used by the provisioner.
//!
//! The `Connector` and `Session` traits let the provisioner run against a
//! real PostgreSQL server or against a recording mock in tests.

use native_tls::{Certificate, TlsConnector};
use postgres::{Client, NoTls};
use postgres_native_tls::MakeTlsConnector;
use tracing::debug;

use crate::config::{ConnectionParams, SslMode};

use super::sql::SERVER_VERSION_QUERY;
use super::{ProvisionError, format_postgres_error};

/// An open connection to one database.
pub trait Session {
    /// Name of the connected database.
    fn dbname(&self) -> &str;

    /// Runs `statements` in order inside a single transaction.
    ///
    /// Stops at the first failing statement; the transaction is then rolled
    /// back and nothing from this call persists.
    fn execute_all(&mut self, statements: &[String]) -> Result<(), ProvisionError>;

    /// Runs `query` and returns the first column of every row as text.
    fn query_column(&mut self, query: &str) -> Result<Vec<String>, ProvisionError>;

    /// Closes the connection.
    fn close(self) -> Result<(), ProvisionError>
    where
        Self: Sized;
}

/// Opens sessions.
pub trait Connector {
    type Session: Session;

    fn connect(&self, params: &ConnectionParams) -> Result<Self::Session, ProvisionError>;
}

/// Connects to PostgreSQL with the synchronous `postgres` client.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

impl PgConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Builds the TLS connector for every mode but `disable`.
///
/// Like libpq, `allow`, `prefer` and `require` do not verify the server
/// certificate. `verify-ca` checks the chain against `sslrootcert` (or the
/// system roots), `verify-full` additionally checks the host name.
fn make_tls_connector(
    params: &ConnectionParams,
) -> Result<MakeTlsConnector, ProvisionError> {
    let mut builder = TlsConnector::builder();

    if params.sslmode.verifies_certificate() {
        if let Some(path) = &params.sslrootcert {
            let pem = std::fs::read(path).map_err(|e| {
                ProvisionError::Tls(format!("cannot read {}: {}", path.display(), e))
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|e| {
                ProvisionError::Tls(format!("invalid certificate {}: {}", path.display(), e))
            })?;
            builder.add_root_certificate(cert);
        }
        builder.danger_accept_invalid_hostnames(params.sslmode == SslMode::VerifyCa);
    } else {
        builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }

    let connector = builder
        .build()
        .map_err(|e| ProvisionError::Tls(e.to_string()))?;
    Ok(MakeTlsConnector::new(connector))
}

impl Connector for PgConnector {
    type Session = PgSession;

    fn connect(&self, params: &ConnectionParams) -> Result<PgSession, ProvisionError> {
        let config = params.to_postgres_config();
        let result = match params.sslmode {
            SslMode::Disable => config.connect(NoTls),
            _ => config.connect(make_tls_connector(params)?),
        };

        let mut client = result.map_err(|e| ProvisionError::Connect {
            target: params.to_string(),
            message: format_postgres_error(&e),
        })?;

        // Informational only; a failure here does not affect provisioning.
        let server_version = client
            .query_one(SERVER_VERSION_QUERY, &[])
            .ok()
            .and_then(|row| row.try_get::<_, String>(0).ok());
        debug!(
            "connected to {} (server version {})",
            params,
            server_version.as_deref().unwrap_or("unknown")
        );

        Ok(PgSession {
            client,
            dbname: params.dbname.clone(),
        })
    }
}

/// A live PostgreSQL connection.
pub struct PgSession {
    client: Client,
    dbname: String,
}

impl Session for PgSession {
    fn dbname(&self) -> &str {
        &self.dbname
    }

    fn execute_all(&mut self, statements: &[String]) -> Result<(), ProvisionError> {
        let mut tx = self
            .client
            .transaction()
            .map_err(|e| ProvisionError::Statement(format_postgres_error(&e)))?;

        // Dropping `tx` on an early return rolls it back.
        for statement in statements {
            tx.batch_execute(statement)
                .map_err(|e| ProvisionError::Statement(format_postgres_error(&e)))?;
        }

        tx.commit()
            .map_err(|e| ProvisionError::Statement(format_postgres_error(&e)))
    }

    fn query_column(&mut self, query: &str) -> Result<Vec<String>, ProvisionError> {
        let rows = self
            .client
            .query(query, &[])
            .map_err(|e| ProvisionError::Query(format_postgres_error(&e)))?;

        rows.iter()
            .map(|row| row.try_get::<_, String>(0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProvisionError::Query(format_postgres_error(&e)))
    }

    fn close(self) -> Result<(), ProvisionError> {
        let dbname = self.dbname;
        self.client.close().map_err(|e| ProvisionError::Close {
            database: dbname,
            message: format_postgres_error(&e),
        })
    }
}
