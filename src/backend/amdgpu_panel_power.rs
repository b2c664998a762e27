use std::path::PathBuf;

use super::{BackendOps, Capabilities, ProbeOutcome};
use crate::fs;
use crate::profile::{ActivationReason, Profile};

const PANEL_POWER_GLOB_ROOT: &str = "/sys/class/drm";

/// Toggles the `amdgpu` panel power savings knob: enabled under
/// `power-saver`, disabled otherwise.
pub struct AmdgpuPanelPowerAction {
  attrs: Vec<PathBuf>,
}

impl AmdgpuPanelPowerAction {
  pub fn new() -> Self {
    Self { attrs: Vec::new() }
  }
}

#[async_trait::async_trait]
impl BackendOps for AmdgpuPanelPowerAction {
  fn name(&self) -> &'static str {
    "amdgpu_panel_power"
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities::default()
  }

  async fn probe(&mut self) -> anyhow::Result<ProbeOutcome> {
    self.attrs.clear();

    let Some(entries) = fs::read_dir(PANEL_POWER_GLOB_ROOT)? else {
      return Ok(ProbeOutcome::Fail);
    };

    for entry in entries {
      let entry = entry?;
      let name = entry.file_name();
      let name = name.to_string_lossy();
      if !name.contains("-eDP-") {
        continue;
      }

      let attr = entry.path().join("amdgpu/panel_power_savings");
      if fs::exists(&attr) {
        self.attrs.push(attr);
      }
    }

    if self.attrs.is_empty() {
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
    let value = if profile == Profile::PowerSaver { "3" } else { "0" };
    fs::write_all(&self.attrs, value)
  }
}
