//! Directory service stub trait, mock, and in-memory fake.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use meshfs_proto::{AddressMappingSet, Configuration, RpcContext, Service, ServiceSet};
use meshfs_types::{make_error_msg, DirCode, Result};
use parking_lot::Mutex;

/// How many attempts a DIR call may make before reporting failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Keep retrying until the call succeeds or fails permanently.
    Unbounded,
    /// At most this many attempts.
    Limited(u32),
}

/// Client-side stub for calling the Directory Service.
///
/// The DIR is the cluster-wide registry of services, address mappings, and
/// service configurations. Record-level operations take a [`RetryPolicy`]
/// that bounds transport-level retries inside the stub.
#[async_trait]
pub trait DirServiceStub: Send + Sync {
    async fn service_get_by_uuid(
        &self,
        ctx: &RpcContext,
        uuid: &str,
        retry: RetryPolicy,
    ) -> Result<ServiceSet>;

    async fn service_register(
        &self,
        ctx: &RpcContext,
        service: Service,
        retry: RetryPolicy,
    ) -> Result<()>;

    /// Mark a service offline. `grace_s` is how long the DIR keeps serving
    /// the stale record before dropping it.
    async fn service_offline(&self, ctx: &RpcContext, uuid: &str, grace_s: u32) -> Result<()>;

    async fn configuration_get(&self, ctx: &RpcContext, uuid: &str) -> Result<Configuration>;

    async fn configuration_set(&self, ctx: &RpcContext, configuration: Configuration)
        -> Result<()>;

    async fn address_mappings_get(&self, ctx: &RpcContext, uuid: &str)
        -> Result<AddressMappingSet>;

    async fn address_mappings_set(
        &self,
        ctx: &RpcContext,
        mappings: AddressMappingSet,
    ) -> Result<()>;

    /// Whether the underlying connection is still usable.
    fn is_alive(&self) -> bool;
}

/// Blanket implementation: `Arc<T>` delegates to `T`.
#[async_trait]
impl<T: DirServiceStub + ?Sized> DirServiceStub for Arc<T> {
    async fn service_get_by_uuid(
        &self,
        ctx: &RpcContext,
        uuid: &str,
        retry: RetryPolicy,
    ) -> Result<ServiceSet> {
        (**self).service_get_by_uuid(ctx, uuid, retry).await
    }

    async fn service_register(
        &self,
        ctx: &RpcContext,
        service: Service,
        retry: RetryPolicy,
    ) -> Result<()> {
        (**self).service_register(ctx, service, retry).await
    }

    async fn service_offline(&self, ctx: &RpcContext, uuid: &str, grace_s: u32) -> Result<()> {
        (**self).service_offline(ctx, uuid, grace_s).await
    }

    async fn configuration_get(&self, ctx: &RpcContext, uuid: &str) -> Result<Configuration> {
        (**self).configuration_get(ctx, uuid).await
    }

    async fn configuration_set(
        &self,
        ctx: &RpcContext,
        configuration: Configuration,
    ) -> Result<()> {
        (**self).configuration_set(ctx, configuration).await
    }

    async fn address_mappings_get(
        &self,
        ctx: &RpcContext,
        uuid: &str,
    ) -> Result<AddressMappingSet> {
        (**self).address_mappings_get(ctx, uuid).await
    }

    async fn address_mappings_set(
        &self,
        ctx: &RpcContext,
        mappings: AddressMappingSet,
    ) -> Result<()> {
        (**self).address_mappings_set(ctx, mappings).await
    }

    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }
}

// ---------------------------------------------------------------------------
// Mock implementation
// ---------------------------------------------------------------------------

/// One observed DIR call, for assertions on interaction order and counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirCall {
    ServiceGet(String),
    ServiceRegister(String),
    ServiceOffline(String),
    ConfigurationGet(String),
    ConfigurationSet(String),
    MappingsGet(String),
    MappingsSet(String),
}

type Handler<Req, Rsp> = Box<dyn Fn(Req) -> Result<Rsp> + Send + Sync>;

/// A configurable mock for [`DirServiceStub`].
///
/// Each RPC method can be overridden with a closure; without a handler the
/// mock returns an empty success response. All calls are recorded.
pub struct MockDirServiceStub {
    pub service_get_handler: Mutex<Option<Handler<String, ServiceSet>>>,
    pub service_register_handler: Mutex<Option<Handler<Service, ()>>>,
    pub configuration_get_handler: Mutex<Option<Handler<String, Configuration>>>,
    pub mappings_get_handler: Mutex<Option<Handler<String, AddressMappingSet>>>,
    pub mappings_set_handler: Mutex<Option<Handler<AddressMappingSet, ()>>>,
    alive: AtomicBool,
    calls: Mutex<Vec<DirCall>>,
}

impl MockDirServiceStub {
    pub fn new() -> Self {
        Self {
            service_get_handler: Mutex::new(None),
            service_register_handler: Mutex::new(None),
            configuration_get_handler: Mutex::new(None),
            mappings_get_handler: Mutex::new(None),
            mappings_set_handler: Mutex::new(None),
            alive: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Wrap in an `Arc` for convenient sharing.
    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn on_service_get(&self, f: impl Fn(String) -> Result<ServiceSet> + Send + Sync + 'static) {
        *self.service_get_handler.lock() = Some(Box::new(f));
    }

    pub fn on_service_register(&self, f: impl Fn(Service) -> Result<()> + Send + Sync + 'static) {
        *self.service_register_handler.lock() = Some(Box::new(f));
    }

    pub fn on_configuration_get(
        &self,
        f: impl Fn(String) -> Result<Configuration> + Send + Sync + 'static,
    ) {
        *self.configuration_get_handler.lock() = Some(Box::new(f));
    }

    pub fn on_mappings_get(
        &self,
        f: impl Fn(String) -> Result<AddressMappingSet> + Send + Sync + 'static,
    ) {
        *self.mappings_get_handler.lock() = Some(Box::new(f));
    }

    pub fn on_mappings_set(
        &self,
        f: impl Fn(AddressMappingSet) -> Result<()> + Send + Sync + 'static,
    ) {
        *self.mappings_set_handler.lock() = Some(Box::new(f));
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Everything the mock has been asked so far.
    pub fn recorded_calls(&self) -> Vec<DirCall> {
        self.calls.lock().clone()
    }

    /// Forget previously recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Count recorded calls matching a predicate.
    pub fn count_calls(&self, pred: impl Fn(&DirCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: DirCall) {
        self.calls.lock().push(call);
    }
}

impl Default for MockDirServiceStub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirServiceStub for MockDirServiceStub {
    async fn service_get_by_uuid(
        &self,
        _ctx: &RpcContext,
        uuid: &str,
        _retry: RetryPolicy,
    ) -> Result<ServiceSet> {
        self.record(DirCall::ServiceGet(uuid.to_string()));
        let guard = self.service_get_handler.lock();
        match guard.as_ref() {
            Some(f) => f(uuid.to_string()),
            None => Ok(ServiceSet::empty()),
        }
    }

    async fn service_register(
        &self,
        _ctx: &RpcContext,
        service: Service,
        _retry: RetryPolicy,
    ) -> Result<()> {
        self.record(DirCall::ServiceRegister(service.uuid.clone()));
        let guard = self.service_register_handler.lock();
        match guard.as_ref() {
            Some(f) => f(service),
            None => Ok(()),
        }
    }

    async fn service_offline(&self, _ctx: &RpcContext, uuid: &str, _grace_s: u32) -> Result<()> {
        self.record(DirCall::ServiceOffline(uuid.to_string()));
        Ok(())
    }

    async fn configuration_get(&self, _ctx: &RpcContext, uuid: &str) -> Result<Configuration> {
        self.record(DirCall::ConfigurationGet(uuid.to_string()));
        let guard = self.configuration_get_handler.lock();
        match guard.as_ref() {
            Some(f) => f(uuid.to_string()),
            None => Ok(Configuration {
                uuid: uuid.to_string(),
                ..Configuration::default()
            }),
        }
    }

    async fn configuration_set(
        &self,
        _ctx: &RpcContext,
        configuration: Configuration,
    ) -> Result<()> {
        self.record(DirCall::ConfigurationSet(configuration.uuid));
        Ok(())
    }

    async fn address_mappings_get(
        &self,
        _ctx: &RpcContext,
        uuid: &str,
    ) -> Result<AddressMappingSet> {
        self.record(DirCall::MappingsGet(uuid.to_string()));
        let guard = self.mappings_get_handler.lock();
        match guard.as_ref() {
            Some(f) => f(uuid.to_string()),
            None => Ok(AddressMappingSet::default()),
        }
    }

    async fn address_mappings_set(
        &self,
        _ctx: &RpcContext,
        mappings: AddressMappingSet,
    ) -> Result<()> {
        let uuid = mappings
            .mappings
            .first()
            .map(|m| m.uuid.clone())
            .unwrap_or_default();
        self.record(DirCall::MappingsSet(uuid));
        let guard = self.mappings_set_handler.lock();
        match guard.as_ref() {
            Some(f) => f(mappings),
            None => Ok(()),
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// In-memory DIR
// ---------------------------------------------------------------------------

/// A stateful DIR fake that enforces the optimistic-versioning contract:
/// a write must echo the stored version or it is rejected with
/// `CONCURRENT_MODIFICATION`, and every accepted write advances the version.
pub struct InMemoryDirService {
    services: Mutex<HashMap<String, Service>>,
    mappings: Mutex<HashMap<String, AddressMappingSet>>,
    configurations: Mutex<HashMap<String, Configuration>>,
    offline: Mutex<Vec<String>>,
}

impl InMemoryDirService {
    pub fn new() -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
            mappings: Mutex::new(HashMap::new()),
            configurations: Mutex::new(HashMap::new()),
            offline: Mutex::new(Vec::new()),
        }
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Seed a service record, assigning it the given version.
    pub fn seed_service(&self, mut service: Service, version: u64) {
        service.version = version;
        self.services.lock().insert(service.uuid.clone(), service);
    }

    pub fn service(&self, uuid: &str) -> Option<Service> {
        self.services.lock().get(uuid).cloned()
    }

    pub fn mappings_for(&self, uuid: &str) -> Option<AddressMappingSet> {
        self.mappings.lock().get(uuid).cloned()
    }

    pub fn configuration_for(&self, uuid: &str) -> Option<Configuration> {
        self.configurations.lock().get(uuid).cloned()
    }

    pub fn offline_services(&self) -> Vec<String> {
        self.offline.lock().clone()
    }
}

impl Default for InMemoryDirService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirServiceStub for InMemoryDirService {
    async fn service_get_by_uuid(
        &self,
        _ctx: &RpcContext,
        uuid: &str,
        _retry: RetryPolicy,
    ) -> Result<ServiceSet> {
        let services = self.services.lock();
        Ok(match services.get(uuid) {
            Some(svc) => ServiceSet::of(vec![svc.clone()]),
            None => ServiceSet::empty(),
        })
    }

    async fn service_register(
        &self,
        _ctx: &RpcContext,
        mut service: Service,
        _retry: RetryPolicy,
    ) -> Result<()> {
        let mut services = self.services.lock();
        let stored_version = services.get(&service.uuid).map(|s| s.version).unwrap_or(0);
        if service.version != stored_version {
            return make_error_msg(
                DirCode::CONCURRENT_MODIFICATION,
                format!(
                    "service {} version {} does not match stored version {}",
                    service.uuid, service.version, stored_version
                ),
            );
        }
        service.version = stored_version + 1;
        services.insert(service.uuid.clone(), service);
        Ok(())
    }

    async fn service_offline(&self, _ctx: &RpcContext, uuid: &str, _grace_s: u32) -> Result<()> {
        self.offline.lock().push(uuid.to_string());
        Ok(())
    }

    async fn configuration_get(&self, _ctx: &RpcContext, uuid: &str) -> Result<Configuration> {
        let configurations = self.configurations.lock();
        Ok(configurations.get(uuid).cloned().unwrap_or(Configuration {
            uuid: uuid.to_string(),
            ..Configuration::default()
        }))
    }

    async fn configuration_set(
        &self,
        _ctx: &RpcContext,
        mut configuration: Configuration,
    ) -> Result<()> {
        let mut configurations = self.configurations.lock();
        let stored_version = configurations
            .get(&configuration.uuid)
            .map(|c| c.version)
            .unwrap_or(0);
        if configuration.version != stored_version {
            return make_error_msg(
                DirCode::CONCURRENT_MODIFICATION,
                format!(
                    "configuration {} version {} does not match stored version {}",
                    configuration.uuid, configuration.version, stored_version
                ),
            );
        }
        configuration.version = stored_version + 1;
        configurations.insert(configuration.uuid.clone(), configuration);
        Ok(())
    }

    async fn address_mappings_get(
        &self,
        _ctx: &RpcContext,
        uuid: &str,
    ) -> Result<AddressMappingSet> {
        let mappings = self.mappings.lock();
        Ok(mappings.get(uuid).cloned().unwrap_or_default())
    }

    async fn address_mappings_set(
        &self,
        _ctx: &RpcContext,
        mut set: AddressMappingSet,
    ) -> Result<()> {
        let Some(uuid) = set.mappings.first().map(|m| m.uuid.clone()) else {
            // An empty set clears nothing in particular; accept it.
            return Ok(());
        };
        let mut mappings = self.mappings.lock();
        let stored_version = mappings
            .get(&uuid)
            .and_then(|s| s.mappings.first())
            .map(|m| m.version)
            .unwrap_or(0);
        if set.mappings[0].version != stored_version {
            return make_error_msg(
                DirCode::CONCURRENT_MODIFICATION,
                format!(
                    "address mappings for {} at version {} do not match stored version {}",
                    uuid, set.mappings[0].version, stored_version
                ),
            );
        }
        for m in &mut set.mappings {
            m.version = stored_version + 1;
        }
        mappings.insert(uuid, set);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        true
    }
}
