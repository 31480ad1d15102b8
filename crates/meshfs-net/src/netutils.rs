//! Enumeration of the endpoints a service can be reached on.
//!
//! Walks the host's interfaces with `getifaddrs(3)` and turns every usable
//! IPv4 address into an [`AddressMapping`] for the requested port and scheme.
//! Loopback addresses are used only when no other interface is up, so a
//! single-homed development machine still produces a mapping.

use std::io;
use std::net::Ipv4Addr;

use meshfs_proto::AddressMapping;

/// Produces the set of endpoints a service should advertise.
///
/// The heartbeat agent consumes this through the trait so tests can inject
/// a deterministic interface list.
pub trait EndpointEnumerator: Send + Sync {
    /// Enumerate reachable endpoints at `port` under the given scheme.
    ///
    /// The returned mappings carry no uuid and version 0; the caller stamps
    /// both before writing them to the DIR.
    fn reachable_endpoints(&self, port: u16, scheme: &str) -> io::Result<Vec<AddressMapping>>;
}

/// The live enumerator backed by the operating system's interface table.
pub struct SystemEndpoints;

impl EndpointEnumerator for SystemEndpoints {
    fn reachable_endpoints(&self, port: u16, scheme: &str) -> io::Result<Vec<AddressMapping>> {
        let addrs = interface_addrs()?;

        let mut usable: Vec<&InterfaceAddr> = addrs.iter().filter(|a| !a.loopback).collect();
        if usable.is_empty() {
            usable = addrs.iter().filter(|a| a.loopback).collect();
        }

        Ok(usable
            .into_iter()
            .map(|a| {
                let mut mapping = AddressMapping::new("", scheme, a.ip.to_string(), port);
                if let Some(network) = a.network_cidr() {
                    mapping.match_network = network;
                }
                mapping
            })
            .collect())
    }
}

/// Check whether a hostname resolves locally. The result is informational:
/// an unresolvable advertised name usually means clients cannot find the
/// service, but the caller decides what to do about it.
pub async fn check_host_resolves(host: &str) -> io::Result<()> {
    tokio::net::lookup_host((host, 0u16)).await.map(|_| ())
}

struct InterfaceAddr {
    ip: Ipv4Addr,
    netmask: Option<Ipv4Addr>,
    loopback: bool,
}

impl InterfaceAddr {
    /// The interface's network in CIDR notation, if the netmask is contiguous.
    fn network_cidr(&self) -> Option<String> {
        let mask = self.netmask?;
        let prefix = prefix_len(mask)?;
        let network = Ipv4Addr::from(u32::from(self.ip) & u32::from(mask));
        Some(format!("{}/{}", network, prefix))
    }
}

/// The prefix length of a contiguous netmask, or None for a malformed one.
fn prefix_len(mask: Ipv4Addr) -> Option<u32> {
    let bits = u32::from(mask);
    if bits.count_ones() == bits.leading_ones() {
        Some(bits.count_ones())
    } else {
        None
    }
}

fn interface_addrs() -> io::Result<Vec<InterfaceAddr>> {
    let mut list: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut list) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let mut out = Vec::new();
    let mut cursor = list;
    while !cursor.is_null() {
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;

        if entry.ifa_addr.is_null() {
            continue;
        }
        let flags = entry.ifa_flags;
        if flags & libc::IFF_UP as libc::c_uint == 0 {
            continue;
        }
        let family = unsafe { (*entry.ifa_addr).sa_family };
        if family != libc::AF_INET as libc::sa_family_t {
            continue;
        }

        let addr = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
        let ip = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
        let netmask = if entry.ifa_netmask.is_null() {
            None
        } else {
            let mask = unsafe { &*(entry.ifa_netmask as *const libc::sockaddr_in) };
            Some(Ipv4Addr::from(u32::from_be(mask.sin_addr.s_addr)))
        };

        out.push(InterfaceAddr {
            ip,
            netmask,
            loopback: flags & libc::IFF_LOOPBACK as libc::c_uint != 0,
        });
    }

    unsafe { libc::freeifaddrs(list) };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_len() {
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 255, 0)), Some(24));
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 0, 0)), Some(16));
        assert_eq!(prefix_len(Ipv4Addr::new(255, 0, 0, 0)), Some(8));
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 255, 255)), Some(32));
        assert_eq!(prefix_len(Ipv4Addr::new(0, 0, 0, 0)), Some(0));
        // non-contiguous mask
        assert_eq!(prefix_len(Ipv4Addr::new(255, 0, 255, 0)), None);
    }

    #[test]
    fn test_network_cidr() {
        let addr = InterfaceAddr {
            ip: Ipv4Addr::new(192, 168, 1, 17),
            netmask: Some(Ipv4Addr::new(255, 255, 255, 0)),
            loopback: false,
        };
        assert_eq!(addr.network_cidr(), Some("192.168.1.0/24".to_string()));

        let no_mask = InterfaceAddr {
            ip: Ipv4Addr::new(10, 0, 0, 1),
            netmask: None,
            loopback: false,
        };
        assert_eq!(no_mask.network_cidr(), None);
    }

    #[test]
    fn test_system_endpoints_shape() {
        // Every host has at least a loopback interface, so enumeration never
        // comes back empty.
        let endpoints = SystemEndpoints
            .reachable_endpoints(32640, "mrpc")
            .unwrap();
        assert!(!endpoints.is_empty());
        for m in &endpoints {
            assert_eq!(m.port, 32640);
            assert_eq!(m.protocol, "mrpc");
            assert_eq!(m.uri, format!("mrpc://{}:{}", m.address, m.port));
            assert!(m.uuid.is_empty());
            assert_eq!(m.version, 0);
        }
    }

    #[tokio::test]
    async fn test_check_host_resolves_localhost() {
        assert!(check_host_resolves("localhost").await.is_ok());
    }
}
