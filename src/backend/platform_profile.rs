use super::{BackendOps, Capabilities, DriverOps, ProbeOutcome};
use crate::fs;
use crate::profile::{ActivationReason, Profile, ProfileSet};

const CHOICES_PATH: &str = "/sys/firmware/acpi/platform_profile_choices";
const PROFILE_PATH: &str = "/sys/firmware/acpi/platform_profile";

/// Wraps the kernel `platform_profile` sysfs class. Most firmware
/// already exposes PPD-compatible names (`low-power`/`balanced`/
/// `performance` or `power-saver`/`balanced`/`performance`) so this
/// driver maps 1:1 where possible and otherwise treats an unrecognized
/// choice set as unsupported for that profile.
pub struct PlatformProfileDriver {
  supported: ProfileSet,
  degraded: Option<String>,
}

impl PlatformProfileDriver {
  pub fn new() -> Self {
    Self {
      supported: ProfileSet::EMPTY,
      degraded: None,
    }
  }

  fn firmware_name(profile: Profile, choices: &str) -> Option<&'static str> {
    let has = |name: &str| choices.split_whitespace().any(|c| c == name);

    match profile {
      Profile::PowerSaver if has("power-saver") => Some("power-saver"),
      Profile::PowerSaver if has("low-power") => Some("low-power"),
      Profile::Balanced if has("balanced") => Some("balanced"),
      Profile::Performance if has("performance") => Some("performance"),
      _ => None,
    }
  }
}

#[async_trait::async_trait]
impl BackendOps for PlatformProfileDriver {
  fn name(&self) -> &'static str {
    "platform_profile"
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities::default()
  }

  async fn probe(&mut self) -> anyhow::Result<ProbeOutcome> {
    let Some(choices) = fs::read(CHOICES_PATH)? else {
      return Ok(ProbeOutcome::Fail);
    };

    if !fs::exists(PROFILE_PATH) {
      return Ok(ProbeOutcome::Fail);
    }

    let mut supported = ProfileSet::EMPTY;
    for profile in Profile::all() {
      if Self::firmware_name(profile, &choices).is_some() {
        supported = supported | profile.bit();
      }
    }

    if supported.is_empty() {
      return Ok(ProbeOutcome::Fail);
    }

    self.supported = supported;
    Ok(ProbeOutcome::Success)
  }

  async fn activate_profile(
    &mut self,
    profile: Profile,
    _reason: ActivationReason,
  ) -> anyhow::Result<()> {
    let choices = fs::read(CHOICES_PATH)?.unwrap_or_default();
    let name = Self::firmware_name(profile, &choices)
      .ok_or_else(|| anyhow::anyhow!("firmware does not advertise '{profile}'"))?;

    fs::write(PROFILE_PATH, name)?;
    self.degraded = None;
    Ok(())
  }
}

impl DriverOps for PlatformProfileDriver {
  fn supported_profiles(&self) -> ProfileSet {
    self.supported
  }

  fn performance_degraded(&self) -> Option<&str> {
    self.degraded.as_deref()
  }
}
