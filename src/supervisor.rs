//! # Controller Supervisor
//!
//! Idle-timeout state machine for exactly one controller.
//!
//! ## States
//!
//! - **Active**: the idle timer is armed and input is polled every poll interval
//! - **Disposed**: terminal; handles released, no further polling
//!
//! ## Timer
//!
//! Every poll folds the current input state into the recorded
//! [`InputSnapshot`]. Any detected activity re-arms the idle deadline for the
//! full timeout. Polling and the deadline are driven by the same task, so a
//! reset and an expiry can never race.
//!
//! ## Exits
//!
//! - Idle deadline reached: emit [`SupervisorEvent::TimeoutReached`], request a
//!   disconnect, dispose
//! - Transport reports the link as gone: dispose
//!
//! Disposal releases the input handle, then the wireless handle, and emits
//! [`SupervisorEvent::Disposed`] exactly once. The notification carries the
//! generation the registry assigned at spawn time, so a late notification from
//! an earlier supervisor of the same identity can be told apart.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Timings;
use crate::correlator::CorrelatedController;
use crate::identity::HardwareIdentity;
use crate::input::{InputSnapshot, InputSource};
use crate::wireless::WirelessDevice;

/// Notifications sent from a supervisor to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// The idle timer expired; a disconnect is being requested
    TimeoutReached(HardwareIdentity),
    /// The supervisor released its handles and is finished
    Disposed {
        identity: HardwareIdentity,
        generation: u64,
    },
}

impl SupervisorEvent {
    /// Identity the event refers to.
    pub fn identity(&self) -> &HardwareIdentity {
        match self {
            SupervisorEvent::TimeoutReached(identity)
            | SupervisorEvent::Disposed { identity, .. } => identity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    IdleTimeout,
    LinkLost,
}

/// Supervises one controller until it is disconnected.
pub struct Supervisor {
    identity: HardwareIdentity,
    generation: u64,
    input: Option<Box<dyn InputSource>>,
    wireless: Option<Arc<dyn WirelessDevice>>,
    snapshot: InputSnapshot,
    deadline: Instant,
    disposed: bool,
    timings: Timings,
    events: mpsc::UnboundedSender<SupervisorEvent>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("identity", &self.identity)
            .field("generation", &self.generation)
            .field("deadline", &self.deadline)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Create an active supervisor and arm its idle timer.
    ///
    /// The initial input state is read immediately. If that read fails the
    /// recorded snapshot starts empty and the first successful poll counts as
    /// activity. `generation` is echoed back in the `Disposed` notification.
    pub fn new(
        identity: HardwareIdentity,
        generation: u64,
        controller: CorrelatedController,
        timings: Timings,
        events: mpsc::UnboundedSender<SupervisorEvent>,
    ) -> Self {
        let CorrelatedController {
            path,
            mut input,
            wireless,
        } = controller;

        let snapshot = input.read().unwrap_or_else(|e| {
            warn!("Initial read of {} failed: {}", path.display(), e);
            InputSnapshot::default()
        });

        Self {
            identity,
            generation,
            input: Some(input),
            wireless: Some(wireless),
            snapshot,
            deadline: Instant::now() + timings.idle_timeout,
            disposed: false,
            timings,
            events,
        }
    }

    /// Identity of the supervised controller.
    pub fn identity(&self) -> &HardwareIdentity {
        &self.identity
    }

    /// Registry generation this supervisor was started under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the supervisor reached its terminal state.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Current idle deadline.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Run the supervisor on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Poll input once and reset the idle timer on activity.
    ///
    /// Read errors count as no activity. Returns `true` if activity was detected.
    pub fn poll_once(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        let Some(input) = self.input.as_mut() else {
            return false;
        };

        let current = match input.read() {
            Ok(current) => current,
            Err(e) => {
                debug!("Reading {} failed, treating as idle: {}", self.identity, e);
                return false;
            }
        };

        let active = self.snapshot.update(&current);
        if active {
            self.deadline = Instant::now() + self.timings.idle_timeout;
            debug!("Activity on {}, idle timer reset", self.identity);
        }
        active
    }

    /// Drive the state machine until the supervisor is disposed.
    pub async fn run(mut self) {
        let Some(wireless) = self.wireless.clone() else {
            return;
        };

        let exit = {
            let link_lost = wireless.wait_disconnected();
            tokio::pin!(link_lost);

            let period = self.timings.poll_interval;
            let mut poll = interval_at(Instant::now() + period, period);
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut link_lost => break Exit::LinkLost,
                    _ = sleep_until(self.deadline) => break Exit::IdleTimeout,
                    _ = poll.tick() => {
                        self.poll_once();
                    }
                }
            }
        };

        match exit {
            Exit::IdleTimeout => self.on_idle_timeout(wireless).await,
            Exit::LinkLost => {
                drop(wireless);
                info!("Controller {} lost", self.identity);
            }
        }

        self.dispose();
    }

    async fn on_idle_timeout(&mut self, wireless: Arc<dyn WirelessDevice>) {
        info!(
            "Controller {} timed out after {:?} without input, disconnecting",
            self.identity, self.timings.idle_timeout
        );
        self.notify(SupervisorEvent::TimeoutReached(self.identity.clone()));

        if let Err(e) = wireless.disconnect().await {
            warn!("Disconnect request for {} failed: {}", self.identity, e);
        }
    }

    /// Release both handles and emit `Disposed`. Later calls do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        drop(self.input.take());
        drop(self.wireless.take());
        self.disposed = true;

        debug!("Supervisor for {} disposed", self.identity);
        self.notify(SupervisorEvent::Disposed {
            identity: self.identity.clone(),
            generation: self.generation,
        });
    }

    fn notify(&self, event: SupervisorEvent) {
        if self.events.send(event).is_err() {
            debug!("Registry gone, dropping notification for {}", self.identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::mocks::{resting_snapshot, MockInputHandle, MockInputSource};
    use crate::wireless::mocks::{MockDeviceHandle, MockWirelessDevice};
    use std::path::PathBuf;
    use std::time::Duration;

    const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";
    const GENERATION: u64 = 7;

    struct Harness {
        supervisor: Supervisor,
        input: MockInputHandle,
        device: MockDeviceHandle,
        events: mpsc::UnboundedReceiver<SupervisorEvent>,
    }

    fn harness() -> Harness {
        let (source, input) = MockInputSource::new("/dev/input/js0", resting_snapshot());
        let device = MockDeviceHandle::new(true);
        let controller = CorrelatedController {
            path: PathBuf::from("/dev/input/js0"),
            input: Box::new(source),
            wireless: Arc::new(MockWirelessDevice::new(ADDRESS, device.clone())),
        };
        let (tx, events) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(
            HardwareIdentity::new(ADDRESS),
            GENERATION,
            controller,
            Timings::default(),
            tx,
        );

        Harness {
            supervisor,
            input,
            device,
            events,
        }
    }

    fn identity() -> HardwareIdentity {
        HardwareIdentity::new(ADDRESS)
    }

    fn disposed() -> SupervisorEvent {
        SupervisorEvent::Disposed {
            identity: identity(),
            generation: GENERATION,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_controller_times_out_once() {
        let start = Instant::now();
        let Harness {
            supervisor,
            input,
            device,
            mut events,
        } = harness();

        let task = supervisor.spawn();

        assert_eq!(events.recv().await, Some(SupervisorEvent::TimeoutReached(identity())));
        assert_eq!(start.elapsed(), Duration::from_secs(300));
        assert_eq!(events.recv().await, Some(disposed()));

        task.await.unwrap();
        assert!(events.try_recv().is_err(), "no further notifications");
        assert_eq!(device.disconnects(), 1);
        assert_eq!(device.releases(), 1);
        assert_eq!(input.releases(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_button_flip_resets_timer() {
        let start = Instant::now();
        let Harness {
            supervisor,
            input,
            device,
            mut events,
        } = harness();

        let task = supervisor.spawn();

        // Press a button four minutes in; the next poll happens at 4:15
        tokio::time::sleep(Duration::from_secs(241)).await;
        input.set_button(0, true);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(events.try_recv().is_err(), "timer must have been reset");
        assert_eq!(device.disconnects(), 0);

        assert_eq!(events.recv().await, Some(SupervisorEvent::TimeoutReached(identity())));
        assert_eq!(start.elapsed(), Duration::from_secs(255 + 300));
        assert_eq!(events.recv().await, Some(disposed()));
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stick_jitter_does_not_reset_timer() {
        let start = Instant::now();
        let Harness {
            supervisor,
            input,
            mut events,
            ..
        } = harness();

        let task = supervisor.spawn();

        for value in [33_000, 31_000, 40_000, 25_000] {
            tokio::time::sleep(Duration::from_secs(50)).await;
            input.set_axis(0, value);
        }

        assert_eq!(events.recv().await, Some(SupervisorEvent::TimeoutReached(identity())));
        assert_eq!(start.elapsed(), Duration::from_secs(300));
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stick_movement_resets_timer() {
        let start = Instant::now();
        let Harness {
            supervisor,
            input,
            mut events,
            ..
        } = harness();

        let task = supervisor.spawn();

        tokio::time::sleep(Duration::from_secs(100)).await;
        input.set_axis(2, 60_000);

        assert_eq!(events.recv().await, Some(SupervisorEvent::TimeoutReached(identity())));
        assert_eq!(start.elapsed(), Duration::from_secs(105 + 300));
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_lost_disposes_without_timeout() {
        let Harness {
            supervisor,
            input,
            device,
            mut events,
        } = harness();

        let task = supervisor.spawn();

        tokio::time::sleep(Duration::from_secs(30)).await;
        device.drop_link();

        assert_eq!(events.recv().await, Some(disposed()));
        task.await.unwrap();

        assert!(events.try_recv().is_err());
        assert_eq!(device.disconnects(), 0);
        assert_eq!(device.releases(), 1);
        assert_eq!(input.releases(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_errors_count_as_idle() {
        let start = Instant::now();
        let Harness {
            supervisor,
            input,
            mut events,
            ..
        } = harness();

        input.set_read_error(true);
        let task = supervisor.spawn();

        assert_eq!(events.recv().await, Some(SupervisorEvent::TimeoutReached(identity())));
        assert_eq!(start.elapsed(), Duration::from_secs(300));
        assert!(input.reads() > 1, "polling continued despite errors");
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_disconnect_still_disposes() {
        let Harness {
            supervisor,
            device,
            mut events,
            ..
        } = harness();

        device.set_disconnect_error(true);
        let task = supervisor.spawn();

        assert_eq!(events.recv().await, Some(SupervisorEvent::TimeoutReached(identity())));
        assert_eq!(events.recv().await, Some(disposed()));
        task.await.unwrap();
        assert_eq!(device.disconnects(), 1);
        assert_eq!(device.releases(), 1);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let Harness {
            mut supervisor,
            input,
            device,
            mut events,
        } = harness();

        supervisor.dispose();
        supervisor.dispose();

        assert!(supervisor.is_disposed());
        assert_eq!(supervisor.generation(), GENERATION);
        assert_eq!(events.try_recv().unwrap(), disposed());
        assert!(events.try_recv().is_err());
        assert_eq!(input.releases(), 1);
        assert_eq!(device.releases(), 1);
    }

    #[tokio::test]
    async fn test_disposed_supervisor_does_not_poll() {
        let Harness {
            mut supervisor,
            input,
            ..
        } = harness();

        let reads_before = input.reads();
        supervisor.dispose();
        input.set_button(1, true);

        assert!(!supervisor.poll_once());
        assert_eq!(input.reads(), reads_before);
    }

    #[tokio::test]
    async fn test_poll_once_resets_deadline() {
        let Harness {
            mut supervisor,
            input,
            ..
        } = harness();

        let first_deadline = supervisor.deadline();
        assert!(!supervisor.poll_once());
        assert_eq!(supervisor.deadline(), first_deadline);

        tokio::time::sleep(Duration::from_millis(10)).await;
        input.set_button(3, true);
        assert!(supervisor.poll_once());
        assert!(supervisor.deadline() > first_deadline);
    }

    #[tokio::test]
    async fn test_dispose_with_registry_gone() {
        let Harness {
            mut supervisor,
            events,
            device,
            ..
        } = harness();

        drop(events);
        supervisor.dispose();
        assert!(supervisor.is_disposed());
        assert_eq!(device.releases(), 1);
    }

    #[test]
    fn test_event_identity() {
        let event = SupervisorEvent::TimeoutReached(identity());
        assert_eq!(event.identity(), &identity());
        assert_eq!(disposed().identity(), &identity());
    }
}
