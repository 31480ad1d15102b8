//! Service records, address mappings, and configuration documents as the
//! Directory Service stores them.
//!
//! Every record family is versioned: the DIR advances the version on each
//! successful write, and a writer must echo the last version it observed so
//! the DIR can detect concurrent updates.

use std::collections::HashMap;
use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Default lifetime of an address mapping in seconds.
pub const DEFAULT_TTL_S: u32 = 3600;

/// Match-network wildcard: the mapping applies to clients from any network.
pub const MATCH_NETWORK_ANY: &str = "*";

// ---------------------------------------------------------------------------
// Service records
// ---------------------------------------------------------------------------

/// Kind of a registered service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum ServiceType {
    Mixed = 0,
    Mrc = 1,
    Osd = 2,
    Volume = 3,
    Dir = 4,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::Mixed => write!(f, "MIXED"),
            ServiceType::Mrc => write!(f, "MRC"),
            ServiceType::Osd => write!(f, "OSD"),
            ServiceType::Volume => write!(f, "VOLUME"),
            ServiceType::Dir => write!(f, "DIR"),
        }
    }
}

/// Availability of a service, stored numerically in the `static.status`
/// attribute of its record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum ServiceStatus {
    Available = 1,
    ToBeRemoved = 2,
    Removed = 3,
}

impl ServiceStatus {
    /// The numeric form stored in the service data map.
    pub fn attr_value(&self) -> String {
        u8::from(*self).to_string()
    }
}

/// Free-form key/value payload of a service record.
pub type ServiceDataMap = HashMap<String, String>;

/// A registered service as the DIR stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub uuid: String,
    pub service_type: ServiceType,
    pub name: String,
    /// Version observed on the last DIR read; 0 for a record never seen.
    pub version: u64,
    pub data: ServiceDataMap,
}

impl Service {
    pub fn new(uuid: impl Into<String>, service_type: ServiceType, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            service_type,
            name: name.into(),
            version: 0,
            data: ServiceDataMap::new(),
        }
    }

    /// Add one payload entry, builder style.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Result set of a service lookup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceSet {
    pub services: Vec<Service>,
}

impl ServiceSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn of(services: Vec<Service>) -> Self {
        Self { services }
    }

    pub fn first(&self) -> Option<&Service> {
        self.services.first()
    }
}

// ---------------------------------------------------------------------------
// Address mappings
// ---------------------------------------------------------------------------

/// One reachable endpoint of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMapping {
    pub uuid: String,
    /// Version cursor; only the first mapping of a written set carries it.
    pub version: u64,
    pub protocol: String,
    pub address: String,
    pub port: u16,
    /// CIDR of the network this mapping applies to, or `*` for all.
    pub match_network: String,
    pub ttl_s: u32,
    /// Derived locator, `protocol://address:port`.
    pub uri: String,
}

impl AddressMapping {
    /// Build a mapping with the defaults used for primary endpoints:
    /// `match_network = "*"`, `ttl_s = 3600`, version 0, and a derived URI.
    pub fn new(
        uuid: impl Into<String>,
        protocol: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Self {
        let protocol = protocol.into();
        let address = address.into();
        let uri = format!("{}://{}:{}", protocol, address, port);
        Self {
            uuid: uuid.into(),
            version: 0,
            protocol,
            address,
            port,
            match_network: MATCH_NETWORK_ANY.to_string(),
            ttl_s: DEFAULT_TTL_S,
            uri,
        }
    }
}

/// The full endpoint set of a service; always written as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddressMappingSet {
    pub mappings: Vec<AddressMapping>,
}

impl AddressMappingSet {
    pub fn of(mappings: Vec<AddressMapping>) -> Self {
        Self { mappings }
    }
}

// ---------------------------------------------------------------------------
// Service configuration documents
// ---------------------------------------------------------------------------

/// The effective configuration of a service, mirrored to the DIR for
/// inspection by operators and tools.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub uuid: String,
    pub version: u64,
    pub parameter: HashMap<String, String>,
}
