//! Recording connector for tests.
//!
//! Sessions share one event log so tests can assert on the exact sequence
//! of connections and statements across a whole run.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::ConnectionParams;

use super::ProvisionError;
use super::session::{Connector, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect(String),
    Execute { database: String, statement: String },
    Query { database: String },
    Close(String),
}

#[derive(Debug, Default)]
struct State {
    events: Vec<Event>,
    databases: Vec<String>,
    fail_statements: Vec<String>,
    fail_connect: Vec<String>,
    fail_close: Vec<String>,
    fail_query: bool,
}

#[derive(Debug, Default, Clone)]
pub struct MockConnector {
    state: Rc<RefCell<State>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows returned by every `query_column` call.
    pub fn with_databases(self, databases: &[&str]) -> Self {
        self.state.borrow_mut().databases = databases.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Statements containing `pattern` fail.
    pub fn failing_statement(self, pattern: &str) -> Self {
        self.state
            .borrow_mut()
            .fail_statements
            .push(pattern.to_string());
        self
    }

    pub fn failing_connect(self, database: &str) -> Self {
        self.state
            .borrow_mut()
            .fail_connect
            .push(database.to_string());
        self
    }

    pub fn failing_close(self, database: &str) -> Self {
        self.state
            .borrow_mut()
            .fail_close
            .push(database.to_string());
        self
    }

    pub fn failing_query(self) -> Self {
        self.state.borrow_mut().fail_query = true;
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    /// Statements attempted, with their database.
    pub fn statements(&self) -> Vec<(String, String)> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Execute {
                    database,
                    statement,
                } => Some((database.clone(), statement.clone())),
                _ => None,
            })
            .collect()
    }

    /// Statements attempted against `database`.
    pub fn statements_on(&self, database: &str) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|(db, _)| db == database)
            .map(|(_, s)| s)
            .collect()
    }
}

impl Connector for MockConnector {
    type Session = MockSession;

    fn connect(&self, params: &ConnectionParams) -> Result<MockSession, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::Connect(params.dbname.clone()));
        if state.fail_connect.contains(&params.dbname) {
            return Err(ProvisionError::Connect {
                target: params.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(MockSession {
            dbname: params.dbname.clone(),
            state: Rc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct MockSession {
    dbname: String,
    state: Rc<RefCell<State>>,
}

impl Session for MockSession {
    fn dbname(&self) -> &str {
        &self.dbname
    }

    fn execute_all(&mut self, statements: &[String]) -> Result<(), ProvisionError> {
        let mut state = self.state.borrow_mut();
        for statement in statements {
            state.events.push(Event::Execute {
                database: self.dbname.clone(),
                statement: statement.clone(),
            });
            if state
                .fail_statements
                .iter()
                .any(|p| statement.contains(p.as_str()))
            {
                return Err(ProvisionError::Statement(format!(
                    "ERROR: mock failure on {}",
                    self.dbname
                )));
            }
        }
        Ok(())
    }

    fn query_column(&mut self, _query: &str) -> Result<Vec<String>, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::Query {
            database: self.dbname.clone(),
        });
        if state.fail_query {
            return Err(ProvisionError::Query(
                "ERROR: permission denied for table pg_database".to_string(),
            ));
        }
        Ok(state.databases.clone())
    }

    fn close(self) -> Result<(), ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::Close(self.dbname.clone()));
        if state.fail_close.contains(&self.dbname) {
            return Err(ProvisionError::Close {
                database: self.dbname.clone(),
                message: "server closed the connection unexpectedly".to_string(),
            });
        }
        Ok(())
    }
}
