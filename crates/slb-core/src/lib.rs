//! Core domain + application logic for the sheet log bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and Google Sheets
//! live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod ports;

pub use errors::{Error, Result};
