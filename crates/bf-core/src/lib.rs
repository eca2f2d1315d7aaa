//! Core of the base finder bot: quota-aware link search aggregation.
//!
//! This crate is intentionally framework-agnostic. The video platform and the
//! chat surface live behind ports/adapters in their own crates.

pub mod aggregator;
pub mod cache;
pub mod catalog;
pub mod channels;
pub mod config;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod logging;
pub mod rotator;
pub mod search;

pub use errors::{Error, Result};
