//! pgdatadog - provisions the Datadog monitoring integration on PostgreSQL.
//!
//! This library provides the pieces used by the `pgdatadog` binary:
//! - `config` - connection parameters and run options
//! - `profile` - fixed names and DDL of the monitoring objects
//! - `provisioner` - the install workflow over synchronous connections
//! - `cli` - command-line parsing

pub mod cli;
pub mod config;
pub mod profile;
pub mod provisioner;
