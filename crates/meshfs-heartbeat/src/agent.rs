//! The heartbeat agent: a background worker that keeps the Directory
//! Service informed about one service process.
//!
//! Exactly one worker task runs per agent. The host's request-handling
//! tasks interact with it only through [`HeartbeatAgent`]'s public methods;
//! internal state is either atomic or guarded by the pause mutex.
//!
//! Three coordination primitives are kept deliberately separate: the pause
//! gate (mutex + notify), the renewal flag (atomic + the wake notify), and
//! the wake notify itself. Folding them together would let a renewal
//! request spuriously unblock a pause waiter.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meshfs_config::ServiceConfig;
use meshfs_net::{schemes, EndpointEnumerator, SystemEndpoints};
use meshfs_proto::{AddressMappingSet, Configuration, RpcContext};
use meshfs_stubs::{DirServiceStub, RetryPolicy};
use meshfs_types::{make_error_msg, DirCode, Result, ServiceUuid, StatusCode, UtcTime};
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::data::ServiceDataSource;
use crate::endpoints;
use crate::lifecycle::LifecycleEvent;
use crate::record;
use crate::{
    CONCURRENT_RETRY_INTERVAL, HEARTBEAT_GROUP, HEARTBEAT_USERNAME, UPDATE_INTERVAL,
};

/// Seconds the DIR keeps serving a record after its service went offline.
const OFFLINE_GRACE_S: u32 = 1;

/// Intervals driving the periodic loop. The defaults are the production
/// values; tests shrink them to run at millisecond scale.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatTimings {
    /// Time between two registration ticks.
    pub update_interval: Duration,
    /// Wait before retrying an initial registration that lost a version race.
    pub conflict_retry_interval: Duration,
}

impl Default for HeartbeatTimings {
    fn default() -> Self {
        Self {
            update_interval: UPDATE_INTERVAL,
            conflict_retry_interval: CONCURRENT_RETRY_INTERVAL,
        }
    }
}

/// Construction-time options of the agent.
pub struct HeartbeatOptions {
    /// Whether to additionally advertise datagram endpoints.
    pub advertise_udp_endpoints: bool,
    pub timings: HeartbeatTimings,
    /// Source of enumerated endpoints when no host is configured.
    pub enumerator: Arc<dyn EndpointEnumerator>,
}

impl Default for HeartbeatOptions {
    fn default() -> Self {
        Self {
            advertise_udp_endpoints: false,
            timings: HeartbeatTimings::default(),
            enumerator: Arc::new(SystemEndpoints),
        }
    }
}

struct PauseState {
    /// While > 0, the worker parks before starting a tick.
    waiters: u32,
    /// True whenever the worker is idle (no registration RPC in flight).
    paused: bool,
}

struct AgentInner {
    uuid: ServiceUuid,
    client: Arc<dyn DirServiceStub>,
    data_source: Arc<dyn ServiceDataSource>,
    config: ServiceConfig,
    enumerator: Arc<dyn EndpointEnumerator>,
    ctx: RpcContext,
    scheme: &'static str,
    advertise_udp: bool,
    timings: HeartbeatTimings,

    quit: AtomicBool,
    renew_mappings: AtomicBool,
    /// Wakes the worker out of its interval sleep.
    wake: Notify,
    /// Interrupts the worker's pause-wait and in-flight RPCs on shutdown.
    stop: Notify,
    pause: Mutex<PauseState>,
    pause_notify: Notify,

    last_heartbeat_ms: AtomicI64,
    advertised_host: Mutex<Option<String>>,
    lifecycle_tx: watch::Sender<LifecycleEvent>,
    /// Held so lifecycle sends cannot fail with no receiver.
    _lifecycle_rx: watch::Receiver<LifecycleEvent>,
}

/// Keeps the Directory Service informed of this process's services,
/// endpoints, and configuration.
///
/// Created once per service process, initialized once, started, and shut
/// down when the process exits. All methods may be called from any task.
pub struct HeartbeatAgent {
    inner: Arc<AgentInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatAgent {
    /// Create an agent for `uuid`, talking to the DIR through `client` and
    /// publishing the records produced by `data_source`.
    ///
    /// When the configuration opts into multihoming with a renewal signal,
    /// a USR2 handler is installed that arms an address-mapping renewal;
    /// this requires running inside a Tokio runtime. Installation failure
    /// is logged and otherwise ignored.
    pub fn new(
        client: Arc<dyn DirServiceStub>,
        uuid: ServiceUuid,
        data_source: Arc<dyn ServiceDataSource>,
        config: ServiceConfig,
        options: HeartbeatOptions,
    ) -> Self {
        let scheme = schemes::for_transport(config.use_tls, config.grid_tls);
        let (lifecycle_tx, lifecycle_rx) = watch::channel(LifecycleEvent::Created);

        let inner = Arc::new(AgentInner {
            uuid,
            client,
            data_source,
            config,
            enumerator: options.enumerator,
            ctx: RpcContext::with_credentials(HEARTBEAT_USERNAME, HEARTBEAT_GROUP),
            scheme,
            advertise_udp: options.advertise_udp_endpoints,
            timings: options.timings,
            quit: AtomicBool::new(false),
            renew_mappings: AtomicBool::new(false),
            wake: Notify::new(),
            stop: Notify::new(),
            pause: Mutex::new(PauseState {
                waiters: 0,
                paused: false,
            }),
            pause_notify: Notify::new(),
            last_heartbeat_ms: AtomicI64::new(UtcTime::now().timestamp_millis()),
            advertised_host: Mutex::new(None),
            lifecycle_tx,
            _lifecycle_rx: lifecycle_rx,
        });

        if inner.config.multihoming && inner.config.renewal_signal {
            install_renewal_signal(&inner);
        }

        Self {
            inner,
            worker: Mutex::new(None),
        }
    }

    /// Perform the first registration round.
    ///
    /// Blocks until the service records are registered. A registration that
    /// loses the version race is retried indefinitely at the conflict-retry
    /// interval; any other error is fatal. Address-mapping registration and
    /// the one-shot configuration publish follow; their failures are logged
    /// but do not fail initialization.
    pub async fn initialize(&self) -> Result<()> {
        let inner = &self.inner;

        loop {
            match inner.register_services(RetryPolicy::Unbounded).await {
                Ok(()) => break,
                Err(status) if status.code() == DirCode::CONCURRENT_MODIFICATION => {
                    info!(
                        uuid = %inner.uuid,
                        retry_ms = inner.timings.conflict_retry_interval.as_millis() as u64,
                        "concurrent service registration; will try again"
                    );
                    tokio::time::sleep(inner.timings.conflict_retry_interval).await;
                }
                Err(status) => {
                    error!(
                        uuid = %inner.uuid,
                        %status,
                        "initial registration at the directory service failed"
                    );
                    return Err(status);
                }
            }
        }

        if let Err(status) = inner.register_address_mappings().await {
            error!(
                uuid = %inner.uuid,
                %status,
                "initial address mapping registration failed"
            );
        }

        if let Err(status) = inner.publish_configuration().await {
            error!(
                uuid = %inner.uuid,
                %status,
                "could not publish the service configuration to the directory service"
            );
        }

        Ok(())
    }

    /// Launch the worker task. Returns immediately.
    pub fn start(&self) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let _ = inner.lifecycle_tx.send(LifecycleEvent::Started);

            let worker = Arc::clone(&inner);
            let body = tokio::spawn(async move { worker.run_loop().await });
            match body.await {
                Ok(()) => {
                    let _ = inner.lifecycle_tx.send(LifecycleEvent::Stopped);
                }
                Err(err) => {
                    error!(uuid = %inner.uuid, %err, "heartbeat worker crashed");
                    let _ = inner
                        .lifecycle_tx
                        .send(LifecycleEvent::Crashed(err.to_string()));
                }
            }
        });
        *self.worker.lock() = Some(handle);
    }

    /// Signal the worker to quit, after a best-effort attempt to mark the
    /// service offline at the DIR. Idempotent; does not wait for the worker
    /// to finish (see [`HeartbeatAgent::join`]).
    pub async fn shutdown(&self) {
        let inner = &self.inner;

        let was_quitting = inner.quit.swap(true, Ordering::SeqCst);
        inner.stop.notify_waiters();
        inner.wake.notify_waiters();
        inner.pause_notify.notify_waiters();

        if !was_quitting && inner.client.is_alive() {
            if let Err(status) = inner
                .client
                .service_offline(&inner.ctx, inner.uuid.as_str(), OFFLINE_GRACE_S)
                .await
            {
                warn!(
                    uuid = %inner.uuid,
                    %status,
                    "could not set the service offline at the directory service"
                );
            }
        }
    }

    /// Wait for the worker task to finish.
    pub async fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Park the worker. Returns once the worker is idle: no registration
    /// RPC is in flight until the matching [`HeartbeatAgent::resume`].
    /// Fails only when the agent shuts down during the wait.
    pub async fn pause(&self) -> Result<()> {
        let inner = &self.inner;
        {
            inner.pause.lock().waiters += 1;
        }

        loop {
            let mut idle = pin!(inner.pause_notify.notified());
            idle.as_mut().enable();

            if inner.pause.lock().paused {
                return Ok(());
            }
            if inner.quit.load(Ordering::SeqCst) {
                return self.abort_pause_wait();
            }

            let mut interrupted = pin!(inner.stop.notified());
            interrupted.as_mut().enable();
            tokio::select! {
                _ = &mut idle => {}
                _ = &mut interrupted => return self.abort_pause_wait(),
            }
        }
    }

    fn abort_pause_wait(&self) -> Result<()> {
        {
            let mut state = self.inner.pause.lock();
            state.waiters = state.waiters.saturating_sub(1);
        }
        self.inner.pause_notify.notify_waiters();
        make_error_msg(StatusCode::INTERRUPTED, "heartbeat agent is shutting down")
    }

    /// Release one pause. The worker resumes once no pauses remain.
    pub fn resume(&self) {
        {
            let mut state = self.inner.pause.lock();
            state.waiters = state.waiters.saturating_sub(1);
        }
        self.inner.pause_notify.notify_waiters();
    }

    /// Arm an address-mapping renewal and wake the worker. The next
    /// mapping write reflects the endpoint set as of that tick; multiple
    /// calls between ticks coalesce into one write.
    pub fn renew_address_mappings(&self) {
        self.inner.renew_mappings.store(true, Ordering::SeqCst);
        self.inner.wake.notify_waiters();
    }

    /// When the last service registration round-trip succeeded.
    pub fn last_heartbeat(&self) -> UtcTime {
        UtcTime::from_timestamp_millis(self.inner.last_heartbeat_ms.load(Ordering::SeqCst))
    }

    /// The host string reported to clients, set by the first address
    /// mapping registration.
    pub fn advertised_host_name(&self) -> Option<String> {
        self.inner.advertised_host.lock().clone()
    }

    /// Observe lifecycle transitions of the worker task.
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleEvent> {
        self.inner.lifecycle_tx.subscribe()
    }
}

impl AgentInner {
    async fn run_loop(&self) {
        while !self.quit.load(Ordering::SeqCst) {
            if self.wait_while_paused().await.is_err() {
                self.quit.store(true, Ordering::SeqCst);
                break;
            }
            if self.quit.load(Ordering::SeqCst) {
                break;
            }

            // Update the service records. A single attempt: the next tick
            // retries anyway.
            {
                let mut interrupted = pin!(self.stop.notified());
                interrupted.as_mut().enable();
                tokio::select! {
                    res = self.register_services(RetryPolicy::Limited(1)) => {
                        if let Err(status) = res {
                            if status.code() == DirCode::CONCURRENT_MODIFICATION {
                                info!(
                                    uuid = %self.uuid,
                                    "concurrent service registration; the next tick retries"
                                );
                            } else {
                                error!(
                                    uuid = %self.uuid,
                                    %status,
                                    "periodic registration at the directory service failed"
                                );
                            }
                        }
                    }
                    _ = &mut interrupted => {
                        self.quit.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            }

            if self.renew_mappings.swap(false, Ordering::SeqCst) {
                let mut interrupted = pin!(self.stop.notified());
                interrupted.as_mut().enable();
                tokio::select! {
                    res = self.register_address_mappings() => {
                        if let Err(status) = res {
                            error!(
                                uuid = %self.uuid,
                                %status,
                                "requested renewal of address mappings failed; rescheduling"
                            );
                            self.renew_mappings.store(true, Ordering::SeqCst);
                        }
                    }
                    _ = &mut interrupted => {
                        self.quit.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            }

            if self.quit.load(Ordering::SeqCst) {
                break;
            }

            // The tick is done; let pause waiters observe the idle state.
            {
                self.pause.lock().paused = true;
            }
            self.pause_notify.notify_waiters();

            // Arm the wake-up before re-checking the flags so a renewal or
            // shutdown cannot slip in between the check and the sleep.
            let mut woken = pin!(self.wake.notified());
            woken.as_mut().enable();
            if self.quit.load(Ordering::SeqCst) {
                break;
            }
            if !self.renew_mappings.load(Ordering::SeqCst) {
                // A wake-up here is not a quit signal: the loop re-checks
                // the quit and renewal flags at the top.
                tokio::select! {
                    _ = tokio::time::sleep(self.timings.update_interval) => {}
                    _ = &mut woken => {}
                }
            }
        }
    }

    /// Park while pause requests are outstanding; clears the paused bit on
    /// the way out. Fails when the agent shuts down during the wait.
    async fn wait_while_paused(&self) -> Result<()> {
        loop {
            let mut released = pin!(self.pause_notify.notified());
            released.as_mut().enable();

            {
                let mut state = self.pause.lock();
                if state.waiters == 0 {
                    state.paused = false;
                    return Ok(());
                }
            }
            if self.quit.load(Ordering::SeqCst) {
                return make_error_msg(StatusCode::INTERRUPTED, "shutdown during pause wait");
            }

            let mut interrupted = pin!(self.stop.notified());
            interrupted.as_mut().enable();
            tokio::select! {
                _ = &mut released => {}
                _ = &mut interrupted => {
                    return make_error_msg(StatusCode::INTERRUPTED, "shutdown during pause wait");
                }
            }
        }
    }

    /// Register every record in the generator's current snapshot, merging
    /// with the DIR's state under the version rules.
    async fn register_services(&self, retry: RetryPolicy) -> Result<()> {
        for fresh in self.data_source.service_data().services {
            let previous = self
                .client
                .service_get_by_uuid(&self.ctx, &fresh.uuid, retry)
                .await?;

            let registration = record::build_registration(&fresh, previous.first());
            self.client
                .service_register(&self.ctx, registration, retry)
                .await?;

            debug!(uuid = %fresh.uuid, "service record updated at the directory service");
            self.last_heartbeat_ms
                .store(UtcTime::now().timestamp_millis(), Ordering::SeqCst);
        }
        Ok(())
    }

    /// Publish the full endpoint set, carrying the DIR's version cursor on
    /// the first entry.
    async fn register_address_mappings(&self) -> Result<()> {
        let derived = endpoints::derive_endpoints(
            &self.config,
            self.enumerator.as_ref(),
            self.uuid.as_str(),
            self.scheme,
            self.advertise_udp,
        )
        .await?;

        let mut mappings = derived.mappings;
        if let Some(host) = derived.advertised_host {
            *self.advertised_host.lock() = Some(host);
        }

        for mapping in &mappings {
            info!(uuid = %mapping.uuid, uri = %mapping.uri, "registering address mapping");
        }

        let current = self
            .client
            .address_mappings_get(&self.ctx, self.uuid.as_str())
            .await?;
        let version = current.mappings.first().map(|m| m.version).unwrap_or(0);
        endpoints::stamp_version(&mut mappings, version);

        self.client
            .address_mappings_set(&self.ctx, AddressMappingSet::of(mappings))
            .await?;
        Ok(())
    }

    /// Mirror the effective configuration to the DIR, once at startup.
    async fn publish_configuration(&self) -> Result<()> {
        let current = self
            .client
            .configuration_get(&self.ctx, self.uuid.as_str())
            .await?;

        let record = Configuration {
            uuid: self.uuid.as_str().to_string(),
            version: current.version,
            parameter: self.config.to_parameter_map(),
        };
        self.client.configuration_set(&self.ctx, record).await?;

        debug!(uuid = %self.uuid, "service configuration published to the directory service");
        Ok(())
    }
}

/// Install a USR2 handler that arms an address-mapping renewal.
///
/// Signals are process-global: the handler holds only a weak reference and
/// tolerates the agent having been dropped in the meantime.
fn install_renewal_signal(inner: &Arc<AgentInner>) {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::user_defined2()) {
        Ok(mut stream) => {
            let weak = Arc::downgrade(inner);
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    match weak.upgrade() {
                        Some(inner) => {
                            inner.renew_mappings.store(true, Ordering::SeqCst);
                            inner.wake.notify_waiters();
                        }
                        None => break,
                    }
                }
            });
        }
        Err(err) => {
            warn!(%err, "could not install the USR2 handler for address mapping renewal");
        }
    }
}
