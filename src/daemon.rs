//! Process lifecycle orchestration: parses no CLI itself (that's
//! `lib.rs`'s job) but takes the parsed [`Cli`] and runs start-up,
//! the event loop, and shutdown, matching `SPEC_FULL.md`'s "Process
//! lifecycle" section.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use zbus::fdo::DBusProxy;
use zbus::Connection;

use crate::arbiter::Engine;
use crate::dbus::server;
use crate::dbus::shared::{Announcer, Shared};
use crate::events::{self, CoreEvent, EventSender};
use crate::registry::{self, BlockList};
use crate::signals;
use crate::Cli;

const DEFAULT_STATE_PATH: &str = "/var/lib/power-profiles-daemon/state.ini";

fn blocklist_from(cli: &Cli) -> BlockList {
  BlockList {
    drivers: cli.block_driver.iter().cloned().collect(),
    actions: cli.block_action.iter().cloned().collect(),
  }
}

async fn probe_and_build_engine(
  blocklist: &BlockList,
  events: Arc<EventSender>,
  state_path: PathBuf,
) -> anyhow::Result<Engine> {
  let probe = registry::probe_all(blocklist, events).await;
  let mut engine =
    Engine::new(probe, state_path).map_err(|error| anyhow::anyhow!("{error}"))?;
  engine.apply_configuration();
  Ok(engine)
}

/// Watches the bus for any peer disappearing, translating it into
/// [`CoreEvent::PeerGone`]; the engine itself decides whether that peer
/// owned any holds.
async fn watch_peer_disconnect(
  connection: Connection,
  events: Arc<EventSender>,
  cancel: CancellationToken,
) {
  let Ok(dbus) = DBusProxy::new(&connection).await else {
    log::debug!("failed to watch for peer disappearance");
    return;
  };
  let Ok(mut owner_changes) = dbus.receive_name_owner_changed().await else {
    return;
  };

  loop {
    tokio::select! {
      _ = cancel.cancelled() => return,

      Some(signal) = owner_changes.next() => {
        let Ok(args) = signal.args() else { continue };
        if args.new_owner.is_none() && args.old_owner.is_some() {
          events.send(CoreEvent::PeerGone(args.name.to_string()));
        }
      },
    }
  }
}

fn spawn_signal_integrations(
  engine_needs: (bool, bool, bool),
  cli: &Cli,
  connection: Connection,
  events: Arc<EventSender>,
  cancel: CancellationToken,
) {
  let (needs_power_source, needs_battery_level, needs_suspend) = engine_needs;

  if !cli.disable_upower && needs_power_source {
    let connection = connection.clone();
    let events = events.clone();
    let cancel = cancel.clone();
    tokio::spawn(async move {
      signals::watch_power_source(connection, events, cancel).await;
    });
  }

  if !cli.disable_upower && needs_battery_level {
    let connection = connection.clone();
    let events = events.clone();
    let cancel = cancel.clone();
    tokio::spawn(async move {
      signals::watch_battery_level(connection, events, cancel).await;
    });
  }

  if !cli.disable_logind && needs_suspend {
    let cancel = cancel.clone();
    tokio::spawn(async move {
      signals::watch_suspend(connection, events, cancel).await;
    });
  }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
  let state_path =
    crate::fs::state_file_path(&PathBuf::from(DEFAULT_STATE_PATH));
  let blocklist = blocklist_from(&cli);

  let (events, mut event_rx) = events::channel();

  let mut engine =
    probe_and_build_engine(&blocklist, events.clone(), state_path.clone()).await?;
  let initial_outcome = engine.initial_activation().await;

  let needs =
    (engine.needs_power_source(), engine.needs_battery_level(), engine.needs_suspend());

  let shared = Shared::new(engine);

  let connection = server::build(shared.clone()).await?;
  server::acquire_names(&connection, cli.replace).await?;
  log::info!("bus names acquired, daemon ready");

  let announcer = Announcer::new(connection.clone());
  announcer.announce(initial_outcome).await;

  let cancel = CancellationToken::new();

  signals::log_availability(&connection, &cli).await;
  spawn_signal_integrations(
    needs,
    &cli,
    connection.clone(),
    events.clone(),
    cancel.clone(),
  );
  tokio::spawn(watch_peer_disconnect(
    connection.clone(),
    events.clone(),
    cancel.child_token(),
  ));

  loop {
    tokio::select! {
      _ = shutdown_signal() => {
        log::info!("shutdown requested");
        cancel.cancel();
        break;
      },

      Some(event) = event_rx.recv() => {
        handle_event(event, &shared, &announcer, &blocklist, &events, &state_path).await;
      },
    }
  }

  shared.engine.lock().await.teardown();
  log::info!("stopped");
  Ok(())
}

async fn shutdown_signal() {
  #[cfg(unix)]
  {
    let mut sigterm = match tokio::signal::unix::signal(
      tokio::signal::unix::SignalKind::terminate(),
    ) {
      Ok(stream) => stream,
      Err(error) => {
        log::warn!("failed to install SIGTERM handler: {error:#}");
        std::future::pending::<()>().await;
        unreachable!()
      },
    };

    tokio::select! {
      _ = tokio::signal::ctrl_c() => {},
      _ = sigterm.recv() => {},
    }
  }

  #[cfg(not(unix))]
  {
    let _ = tokio::signal::ctrl_c().await;
  }
}

async fn handle_event(
  event: CoreEvent,
  shared: &Arc<Shared>,
  announcer: &Announcer,
  blocklist: &BlockList,
  events: &Arc<EventSender>,
  state_path: &PathBuf,
) {
  match event {
    CoreEvent::DriverProfileChanged { name, profile } => {
      log::debug!("driver '{name}' reported profile '{profile}' out of band");
      let outcome =
        shared.engine.lock().await.driver_reported_profile(profile).await;
      announcer.announce(outcome).await;
    },

    CoreEvent::ProbeRequest { name } => {
      log::info!(
        "driver '{name}' requested a re-probe, restarting the backend set"
      );
      match probe_and_build_engine(blocklist, events.clone(), state_path.clone())
        .await
      {
        Ok(mut new_engine) => {
          let initial_outcome = new_engine.initial_activation().await;
          *shared.engine.lock().await = new_engine;
          announcer.announce(initial_outcome).await;
        },
        Err(error) => {
          log::error!("restart after probe-request failed: {error:#}");
        },
      }
    },

    CoreEvent::PowerSourceChanged(source) => {
      shared.engine.lock().await.power_changed(source).await;
    },

    CoreEvent::BatteryLevelChanged(level) => {
      shared.engine.lock().await.battery_changed(level).await;
    },

    CoreEvent::Suspending { entering: true } => {
      log::debug!("system entering sleep");
    },

    CoreEvent::Suspending { entering: false } => {
      log::debug!("system resumed, re-asserting driver settings");
      shared.engine.lock().await.prepare_to_sleep(false).await;
    },

    CoreEvent::PeerGone(peer) => {
      if let Some(outcome) = shared.engine.lock().await.peer_gone(&peer).await {
        announcer.announce(outcome).await;
      }
    },
  }
}
