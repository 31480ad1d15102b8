//! The MeshFS service heartbeat agent.
//!
//! Every service process (DIR, MRC, OSD, volume host) embeds one
//! [`HeartbeatAgent`]. The agent periodically re-registers the service's
//! records at the Directory Service, keeps the advertised address mappings
//! current, and publishes the effective configuration once at startup.
//!
//! Registration is optimistic: each write echoes the record version last
//! observed on the DIR, and the DIR rejects the write with
//! `CONCURRENT_MODIFICATION` when the version has moved. Attributes under
//! the `static.` prefix are owned by the DIR side and carried through writes
//! verbatim.

use std::time::Duration;

pub mod agent;
pub mod data;
pub mod endpoints;
pub mod lifecycle;
pub mod record;

pub use agent::{HeartbeatAgent, HeartbeatOptions, HeartbeatTimings};
pub use data::ServiceDataSource;
pub use lifecycle::LifecycleEvent;

/// How often the periodic loop re-registers the service.
pub const UPDATE_INTERVAL: Duration = Duration::from_millis(60_000);

/// How long to wait before retrying a registration that lost a version race.
pub const CONCURRENT_RETRY_INTERVAL: Duration = Duration::from_millis(5_000);

/// Prefix of DIR-owned service record attributes.
pub const STATIC_ATTR_PREFIX: &str = "static.";

/// Attribute holding the service's availability status.
pub const STATUS_ATTR: &str = "static.status";

/// When present, the DIR does not refresh the record's last-updated
/// timestamp on registration. Set by operator tooling; the agent carries it
/// through like any other static attribute.
pub const DO_NOT_SET_LAST_UPDATED: &str = "static.do_not_set_last_updated";

/// Identity the agent presents on its DIR calls.
pub const HEARTBEAT_USERNAME: &str = "hb-thread";
pub const HEARTBEAT_GROUP: &str = "meshfs-services";
