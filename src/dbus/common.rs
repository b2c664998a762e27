//! Logic shared by the modern and legacy interface shims (`modern.rs`,
//! `legacy.rs`): both expose the same property/method surface against
//! the same [`Shared`] engine, differing only in the D-Bus interface
//! name and object path they're registered under, so the request
//! handling itself lives here once.

use std::collections::HashMap;

use zbus::message::Header;
use zbus::zvariant::OwnedValue;
use zbus::Connection;

use crate::dbus::auth;
use crate::dbus::shared::{Announcer, Shared};
use crate::error::CoreError;
use crate::profile::{HoldInterface, Profile};

pub async fn active_profile(shared: &Shared) -> String {
  shared.engine.lock().await.active_profile().as_str().to_owned()
}

fn sender_of(header: &Header<'_>) -> zbus::fdo::Result<String> {
  header
    .sender()
    .map(|name| name.to_string())
    .ok_or_else(|| CoreError::Unavailable("call had no sender".to_owned()).to_fdo())
}

pub async fn set_active_profile(
  shared: &Shared,
  connection: &Connection,
  header: &Header<'_>,
  value: String,
) -> zbus::fdo::Result<()> {
  let profile = Profile::from_str(&value)
    .ok_or_else(|| CoreError::InvalidArgs(value.clone()).to_fdo())?;

  let sender = sender_of(header)?;
  auth::check_authorization(connection, &sender, auth::ACTION_SWITCH_PROFILE)
    .await
    .map_err(|error| error.to_fdo())?;

  let outcome = {
    let mut engine = shared.engine.lock().await;
    engine.user_set(profile).await.map_err(|error| error.to_fdo())?
  };

  Announcer::new(connection.clone()).announce(outcome).await;
  Ok(())
}

pub async fn profiles(shared: &Shared) -> Vec<HashMap<String, OwnedValue>> {
  shared
    .engine
    .lock()
    .await
    .profile_entries()
    .into_iter()
    .map(|entry| {
      let mut dict = HashMap::new();
      dict.insert(
        "Profile".to_owned(),
        OwnedValue::try_from(entry.profile.as_str()).expect("string converts"),
      );
      if let Some(cpu_driver) = entry.cpu_driver {
        dict.insert(
          "CpuDriver".to_owned(),
          OwnedValue::try_from(cpu_driver).expect("string converts"),
        );
      }
      if let Some(platform_driver) = entry.platform_driver {
        dict.insert(
          "PlatformDriver".to_owned(),
          OwnedValue::try_from(platform_driver).expect("string converts"),
        );
      }
      dict.insert(
        "Driver".to_owned(),
        OwnedValue::try_from(entry.driver).expect("string converts"),
      );
      dict
    })
    .collect()
}

pub async fn actions(shared: &Shared) -> Vec<String> {
  shared.engine.lock().await.action_names()
}

pub async fn performance_degraded(shared: &Shared) -> String {
  shared.engine.lock().await.degraded_reason()
}

/// Always empty; retained only so legacy clients reading this property
/// don't see it vanish.
pub async fn performance_inhibited(_shared: &Shared) -> String {
  String::new()
}

pub async fn active_profile_holds(
  shared: &Shared,
) -> Vec<HashMap<String, OwnedValue>> {
  shared
    .engine
    .lock()
    .await
    .holds()
    .into_iter()
    .map(|hold| {
      let mut dict = HashMap::new();
      dict.insert(
        "ApplicationId".to_owned(),
        OwnedValue::try_from(hold.application_id).expect("string converts"),
      );
      dict.insert(
        "Profile".to_owned(),
        OwnedValue::try_from(hold.profile.as_str()).expect("string converts"),
      );
      dict.insert(
        "Reason".to_owned(),
        OwnedValue::try_from(hold.reason).expect("string converts"),
      );
      dict
    })
    .collect()
}

pub fn version() -> String {
  env!("CARGO_PKG_VERSION").to_owned()
}

pub async fn hold_profile(
  shared: &Shared,
  connection: &Connection,
  header: &Header<'_>,
  interface: HoldInterface,
  profile: String,
  reason: String,
  application_id: String,
) -> zbus::fdo::Result<u32> {
  let profile = Profile::from_str(&profile)
    .ok_or_else(|| CoreError::InvalidArgs(profile.clone()).to_fdo())?;

  let sender = sender_of(header)?;
  auth::check_authorization(connection, &sender, auth::ACTION_HOLD_PROFILE)
    .await
    .map_err(|error| error.to_fdo())?;

  let (cookie, outcome) = {
    let mut engine = shared.engine.lock().await;
    engine
      .hold_add(profile, reason, application_id, sender, interface)
      .await
      .map_err(|error| error.to_fdo())?
  };

  Announcer::new(connection.clone()).announce(outcome).await;
  Ok(cookie)
}

pub async fn release_profile(
  shared: &Shared,
  connection: &Connection,
  cookie: u32,
) -> zbus::fdo::Result<()> {
  let outcome = {
    let mut engine = shared.engine.lock().await;
    engine.hold_release(cookie).await.map_err(|error| error.to_fdo())?
  };

  Announcer::new(connection.clone()).announce(outcome).await;
  Ok(())
}
