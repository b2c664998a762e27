//! The serialization point for everything that can drive the
//! arbitration engine outside of a direct D-Bus method call: driver
//! callbacks (C1), external signal integration (C5), and bus
//! peer-disappearance. Every one of these is funneled through a single
//! channel and drained by one task, which is what gives the engine its
//! single-threaded cooperative semantics even though the process itself
//! runs on a multi-thread tokio runtime: state mutation only ever
//! happens from the task reading this channel (or, for direct client
//! calls, from a handler holding the same engine mutex).

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::DriverEvents;
use crate::profile::{Profile, PowerSource};

#[derive(Debug, Clone)]
pub enum CoreEvent {
  /// A driver observed a firmware-initiated profile change out of band.
  DriverProfileChanged { name: &'static str, profile: Profile },
  /// A previously deferred driver is ready; the caller performs a full
  /// restart rather than an in-place retry.
  ProbeRequest { name: &'static str },
  /// The power-source service's `OnBattery` property changed (or its
  /// owner appeared/disappeared).
  PowerSourceChanged(PowerSource),
  /// A battery device's `Percentage` property changed.
  BatteryLevelChanged(f64),
  /// The session manager's sleep signal fired. `true` = entering sleep,
  /// `false` = resume.
  Suspending { entering: bool },
  /// A bus peer that owned one or more holds has disappeared.
  PeerGone(String),
}

#[derive(Clone)]
pub struct EventSender(pub mpsc::UnboundedSender<CoreEvent>);

impl EventSender {
  pub fn send(&self, event: CoreEvent) {
    // The receiver only goes away during shutdown, at which point
    // nobody cares about delivering one more event.
    let _ = self.0.send(event);
  }
}

impl DriverEvents for EventSender {
  fn on_profile_changed(&self, name: &'static str, profile: Profile) {
    self.send(CoreEvent::DriverProfileChanged { name, profile });
  }

  fn on_probe_request(&self, name: &'static str) {
    self.send(CoreEvent::ProbeRequest { name });
  }
}

pub fn channel() -> (Arc<EventSender>, mpsc::UnboundedReceiver<CoreEvent>) {
  let (tx, rx) = mpsc::unbounded_channel();
  (Arc::new(EventSender(tx)), rx)
}
