//! Client-side stubs for the MeshFS Directory Service.
//!
//! The [`DirServiceStub`] trait is the interface every DIR consumer is
//! written against. The crate also ships two test doubles: a configurable
//! mock with per-method handlers and call recording, and an in-memory DIR
//! that enforces the optimistic-versioning rules of the real service.

pub mod dir_stub;

pub use dir_stub::{
    DirCall, DirServiceStub, InMemoryDirService, MockDirServiceStub, RetryPolicy,
};
