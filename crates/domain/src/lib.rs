//! # scenehub-domain
//!
//! Pure domain model for turning cloud device telemetry into scene rules.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error taxonomy, clock times
//! - Define **Devices** and their **Shadows** (latest reported datapoints)
//! - Define **Scenes** (conditions + actions) and their idempotency keys
//! - Resolve logical property names to datapoint codes (**Mapping**)
//! - Run **Heuristics** that turn a snapshot into scene proposals
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod heuristic;
pub mod mapping;
pub mod scene;
pub mod shadow;
