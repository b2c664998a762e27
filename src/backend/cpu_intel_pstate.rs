use std::path::PathBuf;

use super::{BackendOps, Capabilities, DriverOps, ProbeOutcome};
use crate::fs;
use crate::profile::{ActivationReason, Profile, PowerSource, ProfileSet};

const INTEL_PSTATE_STATUS: &str = "/sys/devices/system/cpu/intel_pstate/status";
const CPU_GLOB_ROOT: &str = "/sys/devices/system/cpu";
const NO_TURBO: &str = "/sys/devices/system/cpu/intel_pstate/no_turbo";
const MAX_PERF_PCT: &str = "/sys/devices/system/cpu/intel_pstate/max_perf_pct";

struct EppDevice {
  epp: PathBuf,
}

/// Maps `{power-saver, balanced, performance}` onto
/// `intel_pstate`'s per-CPU `energy_performance_preference` plus the
/// global turbo/max-perf knobs (see DESIGN.md).
pub struct IntelPstateDriver {
  devices: Vec<EppDevice>,
  on_battery: bool,
  activated_profile: Option<Profile>,
  degraded: Option<String>,
}

impl IntelPstateDriver {
  pub fn new() -> Self {
    Self {
      devices: Vec::new(),
      on_battery: false,
      activated_profile: None,
      degraded: None,
    }
  }

  /// Turbo is meant to be disabled only while `power-saver` is active;
  /// seeing it disabled while `performance` is the target means
  /// firmware has clamped it, most commonly for thermal reasons.
  fn refresh_degraded(&mut self, profile: Profile) -> anyhow::Result<()> {
    if !fs::exists(NO_TURBO) {
      self.degraded = None;
      return Ok(());
    }

    let no_turbo = fs::read(NO_TURBO)?.unwrap_or_default();
    self.degraded = if profile == Profile::Performance && no_turbo.trim() == "1" {
      Some("high-operating-temperature".to_owned())
    } else {
      None
    };

    Ok(())
  }

  fn epp_preference(&self, profile: Profile) -> &'static str {
    match profile {
      Profile::PowerSaver => "power",
      Profile::Balanced if self.on_battery => "balance_power",
      Profile::Balanced => "balance_performance",
      Profile::Performance => "performance",
    }
  }

  fn apply(&self, profile: Profile) -> anyhow::Result<()> {
    let epp = self.epp_preference(profile);
    fs::write_all(self.devices.iter().map(|d| &d.epp), epp)?;

    if fs::exists(NO_TURBO) {
      let no_turbo = if profile == Profile::PowerSaver { "1" } else { "0" };
      fs::write(NO_TURBO, no_turbo)?;
    }

    if fs::exists(MAX_PERF_PCT) {
      let max_perf = if profile == Profile::Performance { "100" } else { "60" };
      fs::write(MAX_PERF_PCT, max_perf)?;
    }

    Ok(())
  }
}

#[async_trait::async_trait]
impl BackendOps for IntelPstateDriver {
  fn name(&self) -> &'static str {
    "intel_pstate"
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities {
      power_changed: true,
      ..Default::default()
    }
  }

  async fn probe(&mut self) -> anyhow::Result<ProbeOutcome> {
    match fs::read(INTEL_PSTATE_STATUS)? {
      Some(status) if status.trim() == "active" => {},
      _ => return Ok(ProbeOutcome::Fail),
    }

    self.devices.clear();
    let Some(entries) = fs::read_dir(CPU_GLOB_ROOT)? else {
      return Ok(ProbeOutcome::Fail);
    };

    for entry in entries {
      let entry = entry?;
      let name = entry.file_name();
      let name = name.to_string_lossy();
      if !name.starts_with("cpu") || !name[3..].chars().all(|c| c.is_ascii_digit()) {
        continue;
      }

      let epp = entry.path().join("cpufreq/energy_performance_preference");
      if fs::exists(&epp) {
        self.devices.push(EppDevice { epp });
      }
    }

    if self.devices.is_empty() {
      Ok(ProbeOutcome::Fail)
    } else {
      Ok(ProbeOutcome::Success)
    }
  }

  async fn activate_profile(
    &mut self,
    profile: Profile,
    _reason: ActivationReason,
  ) -> anyhow::Result<()> {
    self.apply(profile)?;
    self.activated_profile = Some(profile);
    self.refresh_degraded(profile)?;
    Ok(())
  }

  async fn power_changed(&mut self, source: PowerSource) -> anyhow::Result<()> {
    self.on_battery = matches!(source, PowerSource::Battery);

    if let Some(profile) = self.activated_profile {
      self.apply(profile)?;
      self.refresh_degraded(profile)?;
    }

    Ok(())
  }
}

impl DriverOps for IntelPstateDriver {
  fn supported_profiles(&self) -> ProfileSet {
    Profile::all().into_iter().collect()
  }

  fn performance_degraded(&self) -> Option<&str> {
    self.degraded.as_deref()
  }
}
