//! Core types and trait definitions for the Desk ticket engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.
//!
//! The heart of it is [`derive`]: the pure functions that keep a ticket's
//! contact and response timestamps consistent with its article and state
//! history. [`service::TicketService`] wraps them with per-ticket locking and
//! persistence.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod article;
pub mod clock;
pub mod derive;
pub mod error;
pub mod service;
pub mod settings;
pub mod store;
pub mod ticket;

pub use error::{Error, Result};
