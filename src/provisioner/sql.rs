//! SQL statement builders for the provisioning steps.
//!
//! Identifiers come from [`MonitoringProfile`](crate::profile::MonitoringProfile)
//! constants and are inserted verbatim. User-supplied values go through
//! [`quote_literal`].

/// Database names never provisioned in all-databases mode.
pub const RESERVED_DATABASES: &[&str] = &["cloudsqladmin", "postgres"];
/// Prefix of template databases.
pub const TEMPLATE_PREFIX: &str = "template";

/// Lists candidate target databases.
pub(super) const LIST_DATABASES_QUERY: &str = "SELECT datname \
     FROM pg_database \
     WHERE datname NOT LIKE 'template%' \
     AND datname != 'cloudsqladmin' \
     AND datname != 'postgres'";

pub(super) const SERVER_VERSION_QUERY: &str = "SHOW server_version";

/// Returns true if `name` is eligible for all-databases mode.
pub fn is_target_database(name: &str) -> bool {
    !name.starts_with(TEMPLATE_PREFIX) && !RESERVED_DATABASES.contains(&name)
}

/// Quotes `value` as a SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(super) fn create_user(user: &str, password: &str) -> String {
    format!("CREATE USER {} WITH password {}", user, quote_literal(password))
}

pub(super) fn grant_role(role: &str, user: &str) -> String {
    format!("GRANT {} TO {}", role, user)
}

pub(super) fn create_extension(extension: &str) -> String {
    format!("CREATE EXTENSION IF NOT EXISTS {}", extension)
}

pub(super) fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", schema)
}

pub(super) fn grant_on_schema(grant: &str, schema: &str, user: &str) -> String {
    format!("GRANT {} ON SCHEMA {} TO {}", grant, schema, user)
}
