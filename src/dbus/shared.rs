//! State and emission plumbing shared by the modern and legacy
//! interfaces: both wrap the same [`Engine`](crate::arbiter::Engine)
//! behind one lock, and both changes and `ProfileReleased` deliveries
//! are announced identically regardless of which interface (or which
//! internal event) triggered them.

use std::sync::Arc;

use tokio::sync::Mutex;
use zbus::Connection;
use zbus::message::Message;

use crate::arbiter::{ActivationOutcome, ChangeSet, Engine, ReleaseNotification};
use crate::dbus::legacy::Legacy;
use crate::dbus::modern::Modern;
use crate::profile::HoldInterface;

pub struct Shared {
  pub engine: Mutex<Engine>,
}

impl Shared {
  pub fn new(engine: Engine) -> Arc<Self> {
    Arc::new(Self { engine: Mutex::new(engine) })
  }
}

/// Emits `PropertiesChanged` on both served interfaces and delivers any
/// `ProfileReleased` unicasts owed to hold requesters. Takes a
/// `Connection` rather than a single method call's `SignalEmitter`
/// because internal events (driver callbacks, C5 signals) have no
/// method-call context of their own to emit from.
pub struct Announcer {
  connection: Connection,
}

impl Announcer {
  pub fn new(connection: Connection) -> Self {
    Self { connection }
  }

  pub async fn announce(&self, outcome: ActivationOutcome) {
    if let Err(error) = &outcome.result {
      log::warn!("activation failed: {error:#}");
    }

    self.emit_changes(outcome.changes).await;
    self.emit_releases(outcome.releases).await;
  }

  async fn emit_changes(&self, changes: ChangeSet) {
    if !changes.any() {
      return;
    }

    if let Ok(iface_ref) = self
      .connection
      .object_server()
      .interface::<_, Modern>(HoldInterface::Modern.object_path())
      .await
    {
      let emitter = iface_ref.signal_emitter();
      let iface = iface_ref.get().await;
      if changes.active_profile {
        let _ = iface.active_profile_changed(emitter).await;
      }
      if changes.degraded {
        let _ = iface.performance_degraded_changed(emitter).await;
      }
      if changes.holds {
        let _ = iface.active_profile_holds_changed(emitter).await;
      }
      if changes.profiles {
        let _ = iface.profiles_changed(emitter).await;
        let _ = iface.actions_changed(emitter).await;
      }
    }

    if let Ok(iface_ref) = self
      .connection
      .object_server()
      .interface::<_, Legacy>(HoldInterface::Legacy.object_path())
      .await
    {
      let emitter = iface_ref.signal_emitter();
      let iface = iface_ref.get().await;
      if changes.active_profile {
        let _ = iface.active_profile_changed(emitter).await;
      }
      if changes.degraded {
        let _ = iface.performance_degraded_changed(emitter).await;
      }
      if changes.holds {
        let _ = iface.active_profile_holds_changed(emitter).await;
      }
      if changes.profiles {
        let _ = iface.profiles_changed(emitter).await;
        let _ = iface.actions_changed(emitter).await;
      }
    }
  }

  async fn emit_releases(&self, releases: Vec<ReleaseNotification>) {
    for release in releases {
      if let Err(error) = self.emit_release(&release).await {
        log::warn!(
          "failed to deliver ProfileReleased({cookie}) to '{peer}': {error:#}",
          cookie = release.cookie,
          peer = release.peer,
        );
      }
    }
  }

  async fn emit_release(
    &self,
    release: &ReleaseNotification,
  ) -> zbus::Result<()> {
    let message = Message::signal(
      release.interface.object_path(),
      release.interface.interface_name(),
      "ProfileReleased",
    )?
    .destination(release.peer.as_str())?
    .build(&(release.cookie,))?;

    self.connection.send(&message).await
  }
}
