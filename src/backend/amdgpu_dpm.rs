use std::path::PathBuf;

use super::{BackendOps, Capabilities, ProbeOutcome};
use crate::fs;
use crate::profile::{ActivationReason, Profile};

const DPM_GLOB_ROOT: &str = "/sys/class/drm";

/// Selects the `amdgpu` DPM performance level: `low` for power-saver,
/// `auto` for balanced/performance.
pub struct AmdgpuDpmAction {
  cards: Vec<PathBuf>,
}

impl AmdgpuDpmAction {
  pub fn new() -> Self {
    Self { cards: Vec::new() }
  }
}

#[async_trait::async_trait]
impl BackendOps for AmdgpuDpmAction {
  fn name(&self) -> &'static str {
    "amdgpu_dpm"
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities::default()
  }

  async fn probe(&mut self) -> anyhow::Result<ProbeOutcome> {
    self.cards.clear();

    let Some(entries) = fs::read_dir(DPM_GLOB_ROOT)? else {
      return Ok(ProbeOutcome::Fail);
    };

    for entry in entries {
      let entry = entry?;
      let name = entry.file_name();
      let name = name.to_string_lossy();
      if !name.starts_with("card") || name.contains('-') {
        continue;
      }

      let level = entry.path().join("device/power_dpm_force_performance_level");
      if fs::exists(&level) {
        self.cards.push(level);
      }
    }

    if self.cards.is_empty() {
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
    let level = if profile == Profile::PowerSaver { "low" } else { "auto" };
    fs::write_all(&self.cards, level)
  }
}
