//! `org.freedesktop.UPower.PowerProfiles`, the primary interface
//! served. All request handling lives in `common.rs`; this
//! type only wires the D-Bus member names to it.

use std::collections::HashMap;
use std::sync::Arc;

use zbus::message::Header;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::OwnedValue;
use zbus::Connection;

use crate::dbus::common;
use crate::dbus::shared::Shared;
use crate::profile::HoldInterface;

pub struct Modern {
  pub shared: Arc<Shared>,
}

#[zbus::interface(name = "org.freedesktop.UPower.PowerProfiles")]
impl Modern {
  #[zbus(property)]
  async fn active_profile(&self) -> String {
    common::active_profile(&self.shared).await
  }

  #[zbus(property)]
  async fn set_active_profile(
    &self,
    value: String,
    #[zbus(header)] header: Header<'_>,
    #[zbus(connection)] connection: &Connection,
  ) -> zbus::fdo::Result<()> {
    common::set_active_profile(&self.shared, connection, &header, value).await
  }

  #[zbus(property)]
  async fn profiles(&self) -> Vec<HashMap<String, OwnedValue>> {
    common::profiles(&self.shared).await
  }

  #[zbus(property)]
  async fn actions(&self) -> Vec<String> {
    common::actions(&self.shared).await
  }

  #[zbus(property)]
  async fn performance_degraded(&self) -> String {
    common::performance_degraded(&self.shared).await
  }

  #[zbus(property)]
  async fn performance_inhibited(&self) -> String {
    common::performance_inhibited(&self.shared).await
  }

  #[zbus(property)]
  async fn active_profile_holds(&self) -> Vec<HashMap<String, OwnedValue>> {
    common::active_profile_holds(&self.shared).await
  }

  #[zbus(property)]
  async fn version(&self) -> String {
    common::version()
  }

  async fn hold_profile(
    &self,
    profile: String,
    reason: String,
    application_id: String,
    #[zbus(header)] header: Header<'_>,
    #[zbus(connection)] connection: &Connection,
  ) -> zbus::fdo::Result<u32> {
    common::hold_profile(
      &self.shared,
      connection,
      &header,
      HoldInterface::Modern,
      profile,
      reason,
      application_id,
    )
    .await
  }

  async fn release_profile(
    &self,
    cookie: u32,
    #[zbus(connection)] connection: &Connection,
  ) -> zbus::fdo::Result<()> {
    common::release_profile(&self.shared, connection, cookie).await
  }

  /// Declared only so introspection advertises the signal; actual
  /// delivery is a unicast built by hand in `shared::Announcer`, since
  /// `ProfileReleased` must reach exactly the requesting peer rather
  /// than every subscriber.
  #[zbus(signal)]
  async fn profile_released(
    emitter: &SignalEmitter<'_>,
    cookie: u32,
  ) -> zbus::Result<()>;
}
