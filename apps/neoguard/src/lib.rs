//! # neoguard
//!
//! Library half of the neoguard binary. Exposes the host-side modules so the
//! integration tests can drive them without spawning a process.
//!
//! - [`api`]: read-only HTTP API for the dashboard
//! - [`cli`]: command-line interface
//! - [`settings`]: TOML settings file
//! - [`input`]: CSV loader for the raw catalog
//! - [`telemetry`]: `tracing`-backed stage observer

pub mod api;
pub mod cli;
pub mod input;
pub mod settings;
pub mod telemetry;
