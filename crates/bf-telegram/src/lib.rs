//! Telegram adapter (teloxide).
//!
//! Thin command surface over the `bf-core` aggregator: validates the
//! `(level, type)` pair, applies the per-user cooldown and delivers links.

pub mod cooldown;
pub mod handlers;
pub mod router;

pub use router::{run_polling, AppState};
