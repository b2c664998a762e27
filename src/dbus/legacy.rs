//! `net.hadess.PowerProfiles`, served concurrently with identical
//! semantics for clients predating the UPower adoption of this
//! interface. Delegates to the same `common.rs` handlers
//! as `modern.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use zbus::message::Header;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::OwnedValue;
use zbus::Connection;

use crate::dbus::common;
use crate::dbus::shared::Shared;
use crate::profile::HoldInterface;

pub struct Legacy {
  pub shared: Arc<Shared>,
}

#[zbus::interface(name = "net.hadess.PowerProfiles")]
impl Legacy {
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
      HoldInterface::Legacy,
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

  #[zbus(signal)]
  async fn profile_released(
    emitter: &SignalEmitter<'_>,
    cookie: u32,
  ) -> zbus::Result<()>;
}
