//! Data model of the MeshFS Directory Service (DIR).
//!
//! The DIR is the cluster-wide registry of services, address mappings, and
//! service configurations. These types are what travels between a service
//! process and the DIR; the transport itself lives elsewhere.

pub mod common;
pub mod dir;

pub use common::{Auth, AuthType, RpcContext, UserCredentials};
pub use dir::{
    AddressMapping, AddressMappingSet, Configuration, Service, ServiceDataMap, ServiceSet,
    ServiceStatus, ServiceType,
};
