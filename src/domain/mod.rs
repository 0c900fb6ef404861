//! Core domain types and trading logic.

pub mod ohlcv;
pub mod indicator;
pub mod signal;
pub mod sizing;
pub mod trade;
pub mod exit_monitor;
pub mod strategy;
pub mod control_loop;
pub mod config;
pub mod config_validation;
pub mod error;
