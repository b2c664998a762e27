//! External Signal Integration (C5): subscribes to the power-source and
//! battery-level services plus the session manager's suspend signal,
//! translating each into a [`crate::events::CoreEvent`] fed through the
//! same channel driver callbacks use, so every external event is
//! serialized through the one place that is allowed to mutate the
//! arbitration engine.
//!
//! Every subscription here is lazy: the caller only spawns the tasks in
//! this module for a signal source a bound back-end actually declared a
//! capability for.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use zbus::Connection;
use zbus::fdo::DBusProxy;
use zbus::proxy;

use crate::events::{CoreEvent, EventSender};
use crate::profile::PowerSource;

const UPOWER_SERVICE: &str = "org.freedesktop.UPower";
const UPOWER_DISPLAY_DEVICE_PATH: &str =
  "/org/freedesktop/UPower/devices/DisplayDevice";
const LOGIND_SERVICE: &str = "org.freedesktop.login1";

#[proxy(
  interface = "org.freedesktop.UPower",
  default_service = "org.freedesktop.UPower",
  default_path = "/org/freedesktop/UPower"
)]
trait UPower {
  #[zbus(property)]
  fn on_battery(&self) -> zbus::Result<bool>;
}

/// The aggregate "display device" UPower publishes is used rather than
/// enumerating every battery: it already reports the single percentage
/// most desktop shells show (see DESIGN.md).
#[proxy(
  interface = "org.freedesktop.UPower.Device",
  default_service = "org.freedesktop.UPower"
)]
trait UPowerDevice {
  #[zbus(property)]
  fn percentage(&self) -> zbus::Result<f64>;
}

#[proxy(
  interface = "org.freedesktop.login1.Manager",
  default_service = "org.freedesktop.login1",
  default_path = "/org/freedesktop/login1"
)]
trait LoginManager {
  #[zbus(signal)]
  fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

async fn service_has_owner(connection: &Connection, name: &str) -> bool {
  match DBusProxy::new(connection).await {
    Ok(proxy) => proxy
      .name_has_owner(
        name.try_into().expect("well-known bus names are valid"),
      )
      .await
      .unwrap_or(false),
    Err(_) => false,
  }
}

/// Watches `org.freedesktop.UPower`'s `OnBattery` property, translating
/// appearance/change/disappearance of its owner into
/// [`CoreEvent::PowerSourceChanged`]. Runs until `cancel` fires.
pub async fn watch_power_source(
  connection: Connection,
  events: Arc<EventSender>,
  cancel: CancellationToken,
) {
  let mut owner_present = service_has_owner(&connection, UPOWER_SERVICE).await;

  let mut current = if owner_present {
    match UPowerProxy::new(&connection).await {
      Ok(proxy) => match proxy.on_battery().await {
        Ok(true) => PowerSource::Battery,
        Ok(false) => PowerSource::Ac,
        Err(error) => {
          log::debug!("failed to read initial UPower OnBattery: {error:#}");
          PowerSource::Unknown
        },
      },
      Err(error) => {
        log::debug!("failed to connect to UPower: {error:#}");
        PowerSource::Unknown
      },
    }
  } else {
    log::debug!("UPower is not present on the bus at start-up");
    PowerSource::Unknown
  };

  events.send(CoreEvent::PowerSourceChanged(current));

  let Ok(dbus) = DBusProxy::new(&connection).await else {
    log::debug!("failed to connect to org.freedesktop.DBus, giving up on power-source watching");
    return;
  };
  let Ok(mut owner_changes) = dbus.receive_name_owner_changed().await else {
    return;
  };

  let proxy = match UPowerProxy::new(&connection).await {
    Ok(proxy) => proxy,
    Err(error) => {
      log::debug!("failed to build UPower proxy: {error:#}");
      return;
    },
  };
  let mut property_changes = proxy.receive_on_battery_changed().await;

  loop {
    tokio::select! {
      _ = cancel.cancelled() => return,

      Some(signal) = owner_changes.next() => {
        let Ok(args) = signal.args() else { continue };
        if args.name != UPOWER_SERVICE {
          continue;
        }

        owner_present = args.new_owner.is_some();
        let new_source = if !owner_present {
          PowerSource::Unknown
        } else {
          match proxy.on_battery().await {
            Ok(true) => PowerSource::Battery,
            Ok(false) => PowerSource::Ac,
            Err(_) => PowerSource::Unknown,
          }
        };

        if new_source != current {
          current = new_source;
          events.send(CoreEvent::PowerSourceChanged(current));
        }
      },

      Some(change) = property_changes.next() => {
        if !owner_present {
          continue;
        }
        let on_battery = change.get().await.unwrap_or(false);
        let new_source = if on_battery { PowerSource::Battery } else { PowerSource::Ac };
        if new_source != current {
          current = new_source;
          events.send(CoreEvent::PowerSourceChanged(current));
        }
      },
    }
  }
}

/// Watches the display device's `Percentage` property, translating
/// every change, with no dead-band applied, into
/// [`CoreEvent::BatteryLevelChanged`].
pub async fn watch_battery_level(
  connection: Connection,
  events: Arc<EventSender>,
  cancel: CancellationToken,
) {
  let proxy = match UPowerDeviceProxy::builder(&connection)
    .path(UPOWER_DISPLAY_DEVICE_PATH)
    .and_then(|builder| builder.destination(UPOWER_SERVICE))
    .map(|builder| builder.build())
  {
    Ok(building) => match building.await {
      Ok(proxy) => proxy,
      Err(error) => {
        log::debug!("failed to connect to UPower display device: {error:#}");
        return;
      },
    },
    Err(error) => {
      log::debug!("failed to configure UPower display device proxy: {error:#}");
      return;
    },
  };

  if let Ok(level) = proxy.percentage().await {
    events.send(CoreEvent::BatteryLevelChanged(level));
  }

  let mut changes = proxy.receive_percentage_changed().await;

  loop {
    tokio::select! {
      _ = cancel.cancelled() => return,

      Some(change) = changes.next() => {
        if let Ok(level) = change.get().await {
          events.send(CoreEvent::BatteryLevelChanged(level));
        }
      },
    }
  }
}

/// Watches `org.freedesktop.login1.Manager`'s `PrepareForSleep` signal,
/// translating both edges into [`CoreEvent::Suspending`]; the engine
/// only acts on the resume (`start = false`) edge.
pub async fn watch_suspend(
  connection: Connection,
  events: Arc<EventSender>,
  cancel: CancellationToken,
) {
  let proxy = match LoginManagerProxy::new(&connection).await {
    Ok(proxy) => proxy,
    Err(error) => {
      log::debug!("failed to connect to logind: {error:#}");
      return;
    },
  };

  let Ok(mut signals) = proxy.receive_prepare_for_sleep().await else {
    log::debug!("failed to subscribe to PrepareForSleep");
    return;
  };

  loop {
    tokio::select! {
      _ = cancel.cancelled() => return,

      Some(signal) = signals.next() => {
        let Ok(args) = signal.args() else { continue };
        if args.start {
          log::debug!("system is entering sleep");
        } else {
          log::debug!("system has resumed from sleep");
        }
        events.send(CoreEvent::Suspending { entering: args.start });
      },
    }
  }
}

/// Connects to `org.freedesktop.login1`/`org.freedesktop.UPower` once at
/// start-up merely to decide whether the corresponding service exists
/// at all, used to log a clear debug line when `--disable-upower`
/// wasn't passed but the service itself is simply absent.
pub async fn log_availability(connection: &Connection, cli: &crate::Cli) {
  if !cli.disable_upower && !service_has_owner(connection, UPOWER_SERVICE).await {
    log::debug!("'{UPOWER_SERVICE}' is not available on the system bus");
  }
  if !cli.disable_logind && !service_has_owner(connection, LOGIND_SERVICE).await {
    log::debug!("'{LOGIND_SERVICE}' is not available on the system bus");
  }
}
