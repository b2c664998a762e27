//! The back-end abstraction (C1): a uniform contract that CPU drivers,
//! platform drivers, and side-effect actions all implement, plus the
//! concrete back-ends that supplement it.
//!
//! Capability presence is explicit: a back-end declares which of the
//! optional operations it implements via [`Capabilities`] rather than
//! the registry inferring support from a default no-op override, so C5
//! can decide whether to subscribe to an external signal source at all
//! without invoking any back-end method first.

mod amdgpu_dpm;
mod amdgpu_panel_power;
mod cpu_amd_pstate;
mod cpu_intel_pstate;
mod platform_profile;
mod trickle_charge;

pub use amdgpu_dpm::AmdgpuDpmAction;
pub use amdgpu_panel_power::AmdgpuPanelPowerAction;
pub use cpu_amd_pstate::AmdPstateDriver;
pub use cpu_intel_pstate::IntelPstateDriver;
pub use platform_profile::PlatformProfileDriver;
pub use trickle_charge::TrickleChargeAction;

use crate::profile::{ActivationReason, Profile, PowerSource, ProfileSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
  Success,
  Fail,
  Defer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
  pub power_changed: bool,
  pub battery_changed: bool,
  pub prepare_to_sleep: bool,
}

/// Operations common to every back-end, drivers and actions alike.
/// `probe`/`activate_profile` are required by contract; the rest are
/// optional and gated behind [`Capabilities`].
#[async_trait::async_trait]
pub trait BackendOps: Send + Sync {
  fn name(&self) -> &'static str;

  fn capabilities(&self) -> Capabilities {
    Capabilities::default()
  }

  async fn probe(&mut self) -> anyhow::Result<ProbeOutcome>;

  async fn activate_profile(
    &mut self,
    profile: Profile,
    reason: ActivationReason,
  ) -> anyhow::Result<()>;

  async fn power_changed(&mut self, _source: PowerSource) -> anyhow::Result<()> {
    Ok(())
  }

  async fn battery_changed(&mut self, _level: f64) -> anyhow::Result<()> {
    Ok(())
  }
}

/// Extra operations a [`Driver`] (CPU or platform) adds on top of
/// [`BackendOps`]: a declared profile subset, an observable degraded
/// reason, and the two firmware-initiated events. `prepare_to_sleep`
/// is driver-only; best-effort actions never see suspend/resume.
#[async_trait::async_trait]
pub trait DriverOps: BackendOps {
  fn supported_profiles(&self) -> ProfileSet;

  /// Opaque, comma-joinable reason the performance profile is presently
  /// constrained; empty/`None` when not degraded.
  fn performance_degraded(&self) -> Option<&str> {
    None
  }

  async fn prepare_to_sleep(&mut self, _entering: bool) -> anyhow::Result<()> {
    Ok(())
  }

  /// Installs the callback the registry uses to learn about
  /// firmware-initiated profile changes and deferred re-probe
  /// requests. Default no-op: most concrete drivers have no
  /// out-of-band notification source to wire up.
  fn set_events(&mut self, _events: std::sync::Arc<dyn DriverEvents>) {}
}

/// A callback a driver invokes when it observes a firmware-initiated
/// profile change out of band (`profile-changed`) or when a previously
/// deferred probe should be retried (`probe-request`). Installed by the
/// registry immediately after a successful or deferred probe.
pub trait DriverEvents: Send + Sync {
  fn on_profile_changed(&self, name: &'static str, profile: Profile);
  fn on_probe_request(&self, name: &'static str);
}

pub enum Backend {
  Cpu(Box<dyn DriverOps>),
  Platform(Box<dyn DriverOps>),
  Action(Box<dyn BackendOps>),
}

impl Backend {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Cpu(d) | Self::Platform(d) => d.name(),
      Self::Action(a) => a.name(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
  Cpu,
  Platform,
  Action,
}

/// The statically ordered list of back-end constructors the registry
/// instantiates at start-up, matching `power-profiles-daemon.c`'s
/// `objects[]` table: CPU vendor drivers first (only one probes
/// `success` per host), then the platform driver, then actions.
pub fn known_backend_names() -> &'static [(&'static str, BackendKind)] {
  &[
    ("amd_pstate", BackendKind::Cpu),
    ("intel_pstate", BackendKind::Cpu),
    ("platform_profile", BackendKind::Platform),
    ("amdgpu_panel_power", BackendKind::Action),
    ("amdgpu_dpm", BackendKind::Action),
    ("trickle_charge", BackendKind::Action),
  ]
}

/// Instantiates the backend named `name`, or `None` if unknown. Kept
/// separate from [`known_backend_names`] so the registry can filter the
/// ordered name list against the runtime blocklist before paying the
/// (possibly I/O-performing) construction cost.
pub fn construct(name: &str) -> Option<Backend> {
  match name {
    "amd_pstate" => Some(Backend::Cpu(Box::new(AmdPstateDriver::new()))),
    "intel_pstate" => Some(Backend::Cpu(Box::new(IntelPstateDriver::new()))),
    "platform_profile" => {
      Some(Backend::Platform(Box::new(PlatformProfileDriver::new())))
    },
    "amdgpu_panel_power" => {
      Some(Backend::Action(Box::new(AmdgpuPanelPowerAction::new())))
    },
    "amdgpu_dpm" => Some(Backend::Action(Box::new(AmdgpuDpmAction::new()))),
    "trickle_charge" => {
      Some(Backend::Action(Box::new(TrickleChargeAction::new())))
    },
    _ => None,
  }
}
