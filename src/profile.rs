//! Fixed names and DDL of the Datadog monitoring integration.
//!
//! Everything the provisioner creates is named here. The values never change
//! at runtime.

/// Objects created for one monitoring integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoringProfile {
    /// Server-level login role used by the agent.
    pub user: &'static str,
    /// Built-in roles granted to `user`.
    pub roles: &'static [&'static str],
    /// Schema created in every target database.
    pub schema: &'static str,
    /// Statistics extension enabled in every target database.
    pub extension: &'static str,
    /// Privileges granted to `user` on each of `granted_schemas`.
    pub schema_grants: &'static [&'static str],
    /// Schemas `user` receives `schema_grants` on. Includes `schema` itself.
    pub granted_schemas: &'static [&'static str],
}

/// The Datadog agent profile.
pub const DATADOG: MonitoringProfile = MonitoringProfile {
    user: "datadog",
    roles: &["pg_monitor"],
    schema: "datadog",
    extension: "pg_stat_statements",
    schema_grants: &["USAGE"],
    granted_schemas: &["datadog", "public"],
};

/// Name of the plan-capturing function installed into the monitoring schema.
pub const EXPLAIN_FUNCTION: &str = "explain_statement";

impl MonitoringProfile {
    /// DDL installing `<schema>.explain_statement(text)`.
    ///
    /// The function runs `EXPLAIN (FORMAT JSON)` on its argument with the
    /// privileges of its owner and returns NULL for NULL input.
    pub fn explain_function_ddl(&self) -> String {
        format!(
            r#"
CREATE OR REPLACE FUNCTION {schema}.{EXPLAIN_FUNCTION} (
   l_query text,
   out explain JSON
)
RETURNS SETOF JSON AS
$$
BEGIN
   RETURN QUERY EXECUTE 'EXPLAIN (FORMAT JSON) ' || l_query;
END;
$$
LANGUAGE 'plpgsql'
RETURNS NULL ON NULL INPUT
SECURITY DEFINER;"#,
            schema = self.schema
        )
    }
}
