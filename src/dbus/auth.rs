//! Polkit authorization for the two actions that are gated: holding a
//! profile (`…PowerProfiles.hold-profile`) and writing `ActiveProfile`
//! directly (`…PowerProfiles.switch-profile`), built on `zbus_polkit`'s
//! `AuthorityProxy` / `Subject` pattern.
//!
//! The subject is resolved from the calling peer's unique bus name by
//! asking `org.freedesktop.DBus` for its owning PID, then building a
//! `unix-process` polkit subject from that PID, rather than the
//! `system-bus-name` subject kind, whose `Subject` constructor
//! `zbus_polkit` does not expose publicly.

use zbus::Connection;
use zbus::fdo::DBusProxy;
use zbus_polkit::policykit1::{AuthorityProxy, CheckAuthorizationFlags, Subject};

use crate::error::CoreError;

pub const ACTION_HOLD_PROFILE: &str =
  "org.freedesktop.UPower.PowerProfiles.hold-profile";
pub const ACTION_SWITCH_PROFILE: &str =
  "org.freedesktop.UPower.PowerProfiles.switch-profile";

/// Asks polkit whether `sender` (a unique bus name, e.g. `:1.42`) is
/// authorized for `action`. Interactive authentication is allowed, same
/// as upower-power-profiles-daemon, so a prompt can satisfy the check.
pub async fn check_authorization(
  connection: &Connection,
  sender: &str,
  action: &str,
) -> Result<(), CoreError> {
  let bus = DBusProxy::new(connection)
    .await
    .map_err(|error| CoreError::Unavailable(format!("dbus proxy: {error}")))?;

  let unique_name = sender
    .try_into()
    .map_err(|_| CoreError::InvalidArgs(format!("'{sender}' is not a bus name")))?;

  let pid = bus
    .get_connection_unix_process_id(unique_name)
    .await
    .map_err(|error| {
      CoreError::Unavailable(format!("could not resolve caller pid: {error}"))
    })?;

  let subject = Subject::new_for_owner(pid, None, None)
    .map_err(|error| CoreError::Unavailable(format!("polkit subject: {error}")))?;

  let authority = AuthorityProxy::new(connection).await.map_err(|error| {
    CoreError::Unavailable(format!("polkit authority: {error}"))
  })?;

  let result = authority
    .check_authorization(
      &subject,
      action,
      &std::collections::HashMap::new(),
      CheckAuthorizationFlags::AllowUserInteraction.into(),
      "",
    )
    .await
    .map_err(|error| {
      CoreError::Unavailable(format!("polkit authorization check: {error}"))
    })?;

  if result.is_authorized {
    Ok(())
  } else {
    Err(CoreError::Unauthorized)
  }
}
