//! Console plumbing for the `art` prompt tool.
//!
//! Single output gate: while a [`ProgressIndicator`] is running,
//! streamed model text reaches stdout only through
//! [`ProgressIndicator::write_chunk`], which shares a lock with the ticker
//! thread that draws on stderr.
//!
//! # Public API Overview
//! - [`ProgressIndicator`] and [`HeartbeatPolicy`] for the waiting animation.
//! - [`platform`] for TTY probing and the SIGINT cancellation flag.
//! - [`logging::init`] for the stderr `tracing` subscriber.
//! - [`config::EnvConfig`] for presentation settings read from the environment.

pub mod config;
pub mod logging;
pub mod platform;
pub mod progress;

pub use crate::config::EnvConfig;
pub use crate::progress::{HeartbeatPolicy, ProgressIndicator};
