//! elt-monitor library crate.
//!
//! Failure normalization and alert routing for chained serverless ELT tasks:
//! - [`normalizer`] turns nested orchestrator and crash envelopes into a
//!   classified [`message::Message`]
//! - [`notification`] delivers messages to chat webhooks and email
//! - [`wrapper`] runs a task handler and reports its failures

pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod normalizer;
pub mod notification;
pub mod utils;
pub mod wrapper;

pub use error::{Error, HandlerError, Result};
