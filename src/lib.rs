//! `powerprofilesd`: a privileged D-Bus daemon arbitrating
//! `power-saver`/`balanced`/`performance` profiles across CPU and
//! platform drivers and best-effort actions, serving both
//! `org.freedesktop.UPower.PowerProfiles` and the legacy
//! `net.hadess.PowerProfiles` on the system bus.

use clap::Parser as _;

pub mod arbiter;
pub mod backend;
pub mod dbus;
pub mod daemon;
pub mod error;
pub mod events;
pub mod fs;
pub mod hold;
pub mod profile;
pub mod registry;
pub mod signals;
pub mod state_file;

/// CLI surface, one flag at a time.
#[derive(clap::Parser, Debug)]
#[command(version, about)]
pub struct Cli {
  #[command(flatten)]
  pub verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

  /// Request bus-name takeover from an existing owner.
  #[arg(short, long)]
  pub replace: bool,

  /// Drop a driver by name before probing (repeatable).
  #[arg(long = "block-driver", value_name = "NAME")]
  pub block_driver: Vec<String>,

  /// Drop an action by name before probing (repeatable).
  #[arg(long = "block-action", value_name = "NAME")]
  pub block_action: Vec<String>,

  /// Skip power-source/battery-level integration (C5).
  #[arg(long)]
  pub disable_upower: bool,

  /// Skip suspend/resume integration (C5).
  #[arg(long)]
  pub disable_logind: bool,
}

pub fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  yansi::whenever(yansi::Condition::TTY_AND_COLOR);

  env_logger::Builder::new()
    .filter_level(cli.verbosity.log_level_filter())
    .format_timestamp(None)
    .format_module_path(false)
    .init();

  log::info!("starting powerprofilesd");

  tokio::runtime::Builder::new_multi_thread()
    .enable_io()
    .enable_time()
    .build()
    .expect("failed to start the tokio runtime")
    .block_on(daemon::run(cli))
}
