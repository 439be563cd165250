//! # Registry & Discovery Loop
//!
//! The top-level driver. A single task owns the [`Registry`] and is the only
//! place it is mutated:
//!
//! - every discovery interval it runs a pass: probe the transport, correlate,
//!   start a [`Supervisor`] for every identity not yet registered
//! - supervisor notifications arrive over one channel; `Disposed` removes the entry
//!   only if it names the generation currently registered for that identity
//! - on shutdown every supervisor task is aborted, which drops (releases) its handles
//!
//! Discovery only adds. An entry disappears solely through its supervisor's
//! `Disposed` notification, or when its task ended without sending one.
//! A failed transport probe skips the pass and leaves the registry untouched.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::Timings;
use crate::correlator::Correlator;
use crate::identity::HardwareIdentity;
use crate::supervisor::{Supervisor, SupervisorEvent};

/// Handle to a running supervisor task.
#[derive(Debug)]
pub struct SupervisorHandle {
    generation: u64,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Wrap a spawned supervisor task started under `generation`.
    pub fn new(generation: u64, task: JoinHandle<()>) -> Self {
        Self { generation, task }
    }

    /// Generation the supervisor was started under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the supervisor task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Abort the supervisor task; its handles are released when the task is dropped.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Live supervisors keyed by hardware identity. At most one per identity.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<HardwareIdentity, SupervisorHandle>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live supervisors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no supervisor is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `identity` has a registered supervisor.
    pub fn contains(&self, identity: &HardwareIdentity) -> bool {
        self.entries.contains_key(identity)
    }

    /// Register a supervisor. Returns `false` and leaves the registry unchanged
    /// if the identity is already present.
    pub fn insert(&mut self, identity: HardwareIdentity, handle: SupervisorHandle) -> bool {
        if self.entries.contains_key(&identity) {
            return false;
        }
        self.entries.insert(identity, handle);
        true
    }

    /// Remove an entry if present. Returns whether anything was removed.
    pub fn remove(&mut self, identity: &HardwareIdentity) -> bool {
        self.entries.remove(identity).is_some()
    }

    /// Remove the entry for `identity` only if it was started under `generation`.
    pub fn remove_generation(&mut self, identity: &HardwareIdentity, generation: u64) -> bool {
        match self.entries.get(identity) {
            Some(handle) if handle.generation() == generation => {
                self.entries.remove(identity);
                true
            }
            _ => false,
        }
    }

    /// Generation of the supervisor registered for `identity`.
    pub fn generation(&self, identity: &HardwareIdentity) -> Option<u64> {
        self.entries.get(identity).map(SupervisorHandle::generation)
    }

    /// Registered identities, sorted.
    pub fn identities(&self) -> Vec<HardwareIdentity> {
        let mut identities: Vec<_> = self.entries.keys().cloned().collect();
        identities.sort();
        identities
    }

    /// Remove entries whose task ended without a `Disposed` notification
    /// (e.g. a panic). Returns the reaped identities.
    pub fn reap_finished(&mut self) -> Vec<HardwareIdentity> {
        let finished: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(identity, _)| identity.clone())
            .collect();

        for identity in &finished {
            self.entries.remove(identity);
        }
        finished
    }

    /// Abort every supervisor and clear the registry.
    pub fn shutdown(&mut self) {
        for (identity, handle) in self.entries.drain() {
            debug!("Stopping supervisor for {}", identity);
            handle.abort();
        }
    }
}

/// Outcome of one discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Whether the transport probe succeeded and the pass ran
    pub ran: bool,
    /// Unsupervised controllers returned by the correlator
    pub correlated: usize,
    /// Supervisors started in this pass
    pub started: usize,
}

/// Owns the registry and drives discovery.
pub struct Discovery {
    correlator: Correlator,
    registry: Registry,
    timings: Timings,
    next_generation: u64,
    events_tx: mpsc::UnboundedSender<SupervisorEvent>,
    events_rx: mpsc::UnboundedReceiver<SupervisorEvent>,
}

impl Discovery {
    /// Create the discovery driver with an empty registry.
    pub fn new(correlator: Correlator, timings: Timings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            correlator,
            registry: Registry::new(),
            timings,
            next_generation: 0,
            events_tx,
            events_rx,
        }
    }

    /// The registry owned by this driver.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run one discovery pass.
    pub async fn run_pass(&mut self) -> PassSummary {
        self.drain_events();
        for identity in self.registry.reap_finished() {
            warn!("Supervisor for {} ended unexpectedly, removed", identity);
        }
        // Disposals sent by tasks that finished between the drain and the reap
        self.drain_events();

        if let Err(e) = self.correlator.probe().await {
            warn!("Skipping discovery pass: {}", e);
            return PassSummary::default();
        }

        let supervised: HashSet<_> = self.registry.identities().into_iter().collect();
        let controllers = match self.correlator.correlate(&supervised).await {
            Ok(controllers) => controllers,
            Err(e) => {
                warn!("Discovery pass failed: {}", e);
                return PassSummary {
                    ran: true,
                    ..PassSummary::default()
                };
            }
        };

        let mut summary = PassSummary {
            ran: true,
            correlated: controllers.len(),
            started: 0,
        };

        for (identity, controller) in controllers {
            if self.registry.contains(&identity) {
                continue;
            }

            self.next_generation += 1;
            let generation = self.next_generation;
            info!("Supervising controller {} ({})", identity, controller.path.display());
            let supervisor = Supervisor::new(
                identity.clone(),
                generation,
                controller,
                self.timings,
                self.events_tx.clone(),
            );
            self.registry.insert(
                identity,
                SupervisorHandle::new(generation, supervisor.spawn()),
            );
            summary.started += 1;
        }

        info!(
            "Discovery pass: {} controller(s) correlated, {} started, {} supervised",
            summary.correlated,
            summary.started,
            self.registry.len()
        );
        summary
    }

    /// Apply one supervisor notification.
    pub fn handle_event(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::TimeoutReached(identity) => {
                info!("Controller {} reached idle timeout", identity);
            }
            SupervisorEvent::Disposed {
                identity,
                generation,
            } => {
                if self.registry.remove_generation(&identity, generation) {
                    info!("Controller {} removed from registry", identity);
                } else {
                    debug!(
                        "Ignoring disposal of {} generation {}, already replaced or removed",
                        identity, generation
                    );
                }
            }
        }
    }

    /// Apply every notification already queued, without waiting.
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
    }

    /// Run discovery until `shutdown` resolves, then stop every supervisor.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = interval(self.timings.discovery_interval);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down, releasing {} controller(s)", self.registry.len());
                    self.registry.shutdown();
                    break;
                }
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                _ = ticker.tick() => {
                    self.run_pass().await;
                }
            }
        }
    }
}
