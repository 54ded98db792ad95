//! Port definitions — the outbound boundary of the coordinator.
//!
//! The coordinator only talks to the cloud through these traits, so the
//! Tuya adapter and the in-memory test fake are interchangeable.

pub mod scene_cloud;

pub use scene_cloud::SceneCloud;
