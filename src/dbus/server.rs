//! Builds the single system-bus connection that serves both
//! `org.freedesktop.UPower.PowerProfiles` and `net.hadess.PowerProfiles`
//! at their respective object paths, using a dual-`serve_at` pattern
//! extended to control the name-request flags required: both names are
//! requested with `AllowReplacement` set, and additionally
//! `ReplaceExisting` when `--replace` was passed.

use std::sync::Arc;

use zbus::connection;
use zbus::fdo::{DBusProxy, RequestNameFlags};
use zbus::Connection;

use crate::dbus::legacy::Legacy;
use crate::dbus::modern::Modern;
use crate::dbus::shared::Shared;
use crate::profile::HoldInterface;

/// Builds the connection and serves both interfaces at both paths, but
/// does not request either well-known name yet — callers decide
/// ordering (e.g. requesting both only after the initial activation has
/// already run, so a client can't observe a name before the first
/// `ActiveProfile` is meaningful).
pub async fn build(shared: Arc<Shared>) -> zbus::Result<Connection> {
  let modern = Modern { shared: shared.clone() };
  let legacy = Legacy { shared };

  connection::Builder::system()?
    .serve_at(HoldInterface::Modern.object_path(), modern)?
    .serve_at(HoldInterface::Legacy.object_path(), legacy)?
    .build()
    .await
}

/// Requests both well-known bus names with the flags described above.
/// Fails the whole start-up if either name cannot be acquired.
pub async fn acquire_names(
  connection: &Connection,
  replace: bool,
) -> zbus::Result<()> {
  let dbus = DBusProxy::new(connection).await?;

  let request_flags = if replace {
    RequestNameFlags::AllowReplacement | RequestNameFlags::ReplaceExisting
  } else {
    RequestNameFlags::AllowReplacement.into()
  };

  for name in [
    "org.freedesktop.UPower.PowerProfiles",
    "net.hadess.PowerProfiles",
  ] {
    dbus
      .request_name_with_flags(
        name.try_into().expect("well-known names are valid"),
        request_flags,
      )
      .await?;
    log::info!("acquired bus name '{name}'");
  }

  Ok(())
}
