//! Derivation of the address mappings a service advertises.
//!
//! When the configuration pins a hostname or listen address, that value is
//! authoritative and produces a single primary mapping. Otherwise the
//! endpoint set is enumerated from the host's network interfaces.

use meshfs_config::ServiceConfig;
use meshfs_net::{netutils, schemes, EndpointEnumerator};
use meshfs_proto::AddressMapping;
use meshfs_types::Result;
use tracing::warn;

/// The endpoint set to publish, plus the host string to report to clients.
pub struct DerivedEndpoints {
    pub mappings: Vec<AddressMapping>,
    pub advertised_host: Option<String>,
}

/// Compute the endpoint set for `uuid` under the chosen transport scheme.
pub async fn derive_endpoints(
    config: &ServiceConfig,
    enumerator: &dyn EndpointEnumerator,
    uuid: &str,
    scheme: &str,
    advertise_udp: bool,
) -> Result<DerivedEndpoints> {
    let configured_host = if !config.hostname.is_empty() {
        Some(config.hostname.clone())
    } else {
        config.listen_address.map(|addr| addr.to_string())
    };

    match configured_host {
        None => {
            let mut mappings = enumerator.reachable_endpoints(config.port, scheme)?;
            let advertised_host = mappings.first().map(|m| m.address.clone());

            if advertise_udp {
                mappings.extend(enumerator.reachable_endpoints(config.port, schemes::RPC_UDP)?);
            }
            for mapping in &mut mappings {
                mapping.uuid = uuid.to_string();
            }

            Ok(DerivedEndpoints {
                mappings,
                advertised_host,
            })
        }
        Some(mut host) => {
            // A hostname obtained from a reverse lookup may carry a leading
            // slash.
            if let Some(stripped) = host.strip_prefix('/') {
                host = stripped.to_string();
            }

            if let Err(err) = netutils::check_host_resolves(&host).await {
                warn!(
                    host = %host,
                    %err,
                    "cannot resolve the advertised hostname locally; clients and other \
                     services may be unable to reach this service"
                );
            }

            let mut mappings = vec![AddressMapping::new(uuid, scheme, host.clone(), config.port)];
            if advertise_udp {
                mappings.push(AddressMapping::new(
                    uuid,
                    schemes::RPC_UDP,
                    host.clone(),
                    config.port,
                ));
            }

            Ok(DerivedEndpoints {
                mappings,
                advertised_host: Some(host),
            })
        }
    }
}

/// Stamp the version cursor on the endpoint set. Only the first mapping
/// carries it; an empty set is left untouched.
pub fn stamp_version(mappings: &mut [AddressMapping], version: u64) {
    if let Some(first) = mappings.first_mut() {
        first.version = version;
    }
}
