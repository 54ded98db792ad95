//! # scenehub — composition root
//!
//! Wires the Tuya adapter into the workflow coordinator.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Build the mapping registry (built-in table plus configured entries)
//! - Construct the cloud adapter and the coordinator
//! - Run the dry-run pipeline: discover → inspect → propose
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

pub mod config;
pub mod pipeline;
