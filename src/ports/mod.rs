//! Collaborator traits the domain depends on.

pub mod broker_port;
pub mod config_port;
pub mod data_port;
pub mod ledger_port;
