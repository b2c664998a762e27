use std::path::PathBuf;

use super::{BackendOps, Capabilities, DriverOps, ProbeOutcome};
use crate::fs;
use crate::profile::{ActivationReason, Profile, PowerSource, ProfileSet};

const AMD_PSTATE_STATUS: &str = "/sys/devices/system/cpu/amd_pstate/status";
const CPU_GLOB_ROOT: &str = "/sys/devices/system/cpu";

/// A CPU device discovered under `amd_pstate`'s `active` status, with
/// the sysfs knobs this driver rewrites on every activation.
struct EppDevice {
  governor: PathBuf,
  epp: PathBuf,
  boost: Option<PathBuf>,
  cpuinfo_min_freq: Option<PathBuf>,
  lowest_nonlinear_freq: Option<PathBuf>,
  scaling_min_freq: Option<PathBuf>,
}

/// Maps `{power-saver, balanced, performance}` onto AMD's
/// `amd-pstate-epp` governor (`powersave`/`performance`) +
/// `energy_performance_preference` tuple, with a battery-aware split
/// for `balanced`, plus `boost` and a `scaling_min_freq` floor sourced
/// from `cpuinfo_min_freq`/`amd_pstate_lowest_nonlinear_freq` (see
/// DESIGN.md).
pub struct AmdPstateDriver {
  devices: Vec<EppDevice>,
  on_battery: bool,
  activated_profile: Option<Profile>,
}

impl AmdPstateDriver {
  pub fn new() -> Self {
    Self {
      devices: Vec::new(),
      on_battery: false,
      activated_profile: None,
    }
  }

  fn epp_preference(&self, profile: Profile) -> &'static str {
    match profile {
      Profile::PowerSaver => "power",
      Profile::Balanced if self.on_battery => "balance_power",
      Profile::Balanced => "balance_performance",
      Profile::Performance => "performance",
    }
  }

  fn governor_preference(profile: Profile) -> &'static str {
    match profile {
      Profile::PowerSaver | Profile::Balanced => "powersave",
      Profile::Performance => "performance",
    }
  }

  fn apply(&self, profile: Profile) -> anyhow::Result<()> {
    let governor = Self::governor_preference(profile);
    let governor_paths = self.devices.iter().map(|d| &d.governor);
    fs::write_all(governor_paths, governor)?;

    let epp = self.epp_preference(profile);
    let epp_paths = self.devices.iter().map(|d| &d.epp);
    fs::write_all(epp_paths, epp)?;

    let boost = if profile == Profile::PowerSaver { "0" } else { "1" };
    for device in &self.devices {
      if let Some(path) = &device.boost {
        fs::write(path, boost)?;
      }
    }

    for device in &self.devices {
      let min_freq_source = match profile {
        Profile::PowerSaver => &device.cpuinfo_min_freq,
        Profile::Balanced | Profile::Performance => &device.lowest_nonlinear_freq,
      };

      let (Some(source), Some(scaling_min_freq)) =
        (min_freq_source, &device.scaling_min_freq)
      else {
        continue;
      };

      if let Some(value) = fs::read(source)? {
        fs::write(scaling_min_freq, &value)?;
      }
    }

    Ok(())
  }
}

#[async_trait::async_trait]
impl BackendOps for AmdPstateDriver {
  fn name(&self) -> &'static str {
    "amd_pstate"
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities {
      power_changed: true,
      ..Default::default()
    }
  }

  async fn probe(&mut self) -> anyhow::Result<ProbeOutcome> {
    match fs::read(AMD_PSTATE_STATUS)? {
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

      let cpufreq = entry.path().join("cpufreq");
      let governor = cpufreq.join("scaling_governor");
      let epp = cpufreq.join("energy_performance_preference");
      if !fs::exists(&governor) || !fs::exists(&epp) {
        continue;
      }

      let boost = cpufreq.join("boost");
      let boost = fs::exists(&boost).then_some(boost);

      let cpuinfo_min_freq = cpufreq.join("cpuinfo_min_freq");
      let cpuinfo_min_freq = fs::exists(&cpuinfo_min_freq).then_some(cpuinfo_min_freq);

      let lowest_nonlinear_freq = cpufreq.join("amd_pstate_lowest_nonlinear_freq");
      let lowest_nonlinear_freq =
        fs::exists(&lowest_nonlinear_freq).then_some(lowest_nonlinear_freq);

      let scaling_min_freq = cpufreq.join("scaling_min_freq");
      let scaling_min_freq = fs::exists(&scaling_min_freq).then_some(scaling_min_freq);

      self.devices.push(EppDevice {
        governor,
        epp,
        boost,
        cpuinfo_min_freq,
        lowest_nonlinear_freq,
        scaling_min_freq,
      });
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
    Ok(())
  }

  async fn power_changed(&mut self, source: PowerSource) -> anyhow::Result<()> {
    self.on_battery = matches!(source, PowerSource::Battery);

    if let Some(profile) = self.activated_profile {
      self.apply(profile)?;
    }

    Ok(())
  }
}

impl DriverOps for AmdPstateDriver {
  fn supported_profiles(&self) -> ProfileSet {
    Profile::all().into_iter().collect()
  }
}
