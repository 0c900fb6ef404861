//! momtrader: momentum trading bot driven by RSI and MACD crossovers.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], process wiring in [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
