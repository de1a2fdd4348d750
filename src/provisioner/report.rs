//! Per-step outcomes of a provisioning run.

use std::fmt;

use tracing::error;

use crate::config::FailurePolicy;

use super::ProvisionError;

/// A provisioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Connect,
    ListDatabases,
    CreateUser,
    GrantRoles,
    CreateSchemas,
    EnableExtension,
    GrantOnSchemas,
    CreateExplainFunction,
    Close,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Connect => "connect",
            Step::ListDatabases => "list databases",
            Step::CreateUser => "create user",
            Step::GrantRoles => "grant roles",
            Step::CreateSchemas => "create schemas",
            Step::EnableExtension => "enable extension",
            Step::GrantOnSchemas => "grant on schemas",
            Step::CreateExplainFunction => "create explain function",
            Step::Close => "close connection",
        };
        f.write_str(name)
    }
}

/// Outcome of one step against one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub database: String,
    pub step: Step,
    /// Error message if the step failed.
    pub error: Option<String>,
}

impl StepReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Returned when a failure stops the run under [`FailurePolicy::Halt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Halted;

/// Collected outcomes of a run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    policy: FailurePolicy,
    pub steps: Vec<StepReport>,
    /// True when the run stopped early.
    pub halted: bool,
}

impl InstallReport {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            steps: Vec::new(),
            halted: false,
        }
    }

    /// Records a step outcome, logging failures.
    ///
    /// Returns `Err(Halted)` when the step failed and the policy is
    /// [`FailurePolicy::Halt`].
    pub fn record<T>(
        &mut self,
        database: &str,
        step: Step,
        result: &Result<T, ProvisionError>,
    ) -> Result<(), Halted> {
        let error = match result {
            Ok(_) => None,
            Err(e) => {
                error!("{} on {}: {}", step, database, e);
                Some(e.to_string())
            }
        };
        let failed = error.is_some();

        self.steps.push(StepReport {
            database: database.to_string(),
            step,
            error,
        });

        if failed && self.policy == FailurePolicy::Halt {
            self.halted = true;
            return Err(Halted);
        }
        Ok(())
    }

    pub fn succeeded(&self) -> usize {
        self.steps.iter().filter(|s| s.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.steps.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Distinct databases touched, in first-seen order.
    pub fn databases(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for step in &self.steps {
            if !seen.contains(&step.database.as_str()) {
                seen.push(&step.database);
            }
        }
        seen
    }

    /// True when the only recorded step is a failed connection, i.e. the
    /// server was never reached.
    pub fn server_unreachable(&self) -> bool {
        matches!(
            self.steps.as_slice(),
            [only] if only.step == Step::Connect && !only.succeeded()
        )
    }
}
