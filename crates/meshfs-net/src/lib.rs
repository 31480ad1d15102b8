//! Network helpers for MeshFS services: transport scheme selection,
//! reachable-endpoint enumeration, and a best-effort resolution check.

pub mod netutils;
pub mod schemes;

pub use netutils::{EndpointEnumerator, SystemEndpoints};
