//! Core domain + application logic for LinkBot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind ports
//! (traits) implemented in adapter crates; storage is a trait with a file-backed
//! engine and an in-memory variant.

pub mod commands;
pub mod config;
pub mod consumer;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod ports;
pub mod processor;
pub mod storage;

pub use errors::{Context, Error, Result};
