//! # scenehub-app
//!
//! Application layer — the workflow coordinator and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define the **port trait** the cloud adapter implements (driven/outbound port):
//!   - `SceneCloud` — devices, shadows and scene-rule CRUD
//! - Provide the **driving/inbound** use-case:
//!   - `WorkflowCoordinator` — discover, inspect, propose, then run
//!     confirmation-gated mutations (`Command`)
//! - Report per-item outcomes of batch stages (`BatchReport`)
//!
//! ## Dependency rule
//! Depends on `scenehub-domain` only (plus `futures` and `tokio-util` for
//! bounded concurrency and cancellation).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod command;
pub mod coordinator;
pub mod ports;
pub mod report;
