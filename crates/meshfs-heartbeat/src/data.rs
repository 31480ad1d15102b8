//! The contract between a host service and its heartbeat agent.

use meshfs_proto::ServiceSet;

/// Produces the current snapshot of service records to publish.
///
/// The agent calls this once per tick; implementations should return fresh
/// values (free space, load, volume lists) rather than cached ones. A host
/// service that registers several records (an MRC and the volumes it hosts,
/// say) returns them all in one set.
pub trait ServiceDataSource: Send + Sync {
    fn service_data(&self) -> ServiceSet;
}

/// Any `Fn() -> ServiceSet` closure is a valid data source.
impl<F> ServiceDataSource for F
where
    F: Fn() -> ServiceSet + Send + Sync,
{
    fn service_data(&self) -> ServiceSet {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshfs_proto::{Service, ServiceType};
    use std::sync::Arc;

    #[test]
    fn test_closure_as_data_source() {
        let source: Arc<dyn ServiceDataSource> = Arc::new(|| {
            ServiceSet::of(vec![
                Service::new("osd-1", ServiceType::Osd, "osd01").with_data("free", "1000")
            ])
        });
        let set = source.service_data();
        assert_eq!(set.services.len(), 1);
        assert_eq!(set.services[0].uuid, "osd-1");
    }

    #[test]
    fn test_data_source_returns_fresh_snapshots() {
        use std::sync::atomic::{AtomicU64, Ordering};
        let counter = Arc::new(AtomicU64::new(0));
        let c = counter.clone();
        let source: Arc<dyn ServiceDataSource> = Arc::new(move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            ServiceSet::of(vec![
                Service::new("osd-1", ServiceType::Osd, "osd01").with_data("tick", n.to_string())
            ])
        });
        assert_eq!(
            source.service_data().services[0].data.get("tick").unwrap(),
            "0"
        );
        assert_eq!(
            source.service_data().services[0].data.get("tick").unwrap(),
            "1"
        );
    }
}
