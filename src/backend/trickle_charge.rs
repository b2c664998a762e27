use super::{BackendOps, Capabilities, ProbeOutcome};
use crate::fs;
use crate::profile::{ActivationReason, Profile};

const CHARGE_CONTROL_PATH: &str =
  "/sys/class/power_supply/BAT0/charge_control_end_threshold";

/// Lowers the battery charge-control threshold under `power-saver` to
/// reduce trickle-charge current on platforms that expose this knob,
/// and restores the default otherwise.
pub struct TrickleChargeAction {
  present: bool,
}

impl TrickleChargeAction {
  pub fn new() -> Self {
    Self { present: false }
  }
}

#[async_trait::async_trait]
impl BackendOps for TrickleChargeAction {
  fn name(&self) -> &'static str {
    "trickle_charge"
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities::default()
  }

  async fn probe(&mut self) -> anyhow::Result<ProbeOutcome> {
    self.present = fs::exists(CHARGE_CONTROL_PATH);

    if self.present {
      Ok(ProbeOutcome::Success)
    } else {
      Ok(ProbeOutcome::Fail)
    }
  }

  async fn activate_profile(
    &mut self,
    profile: Profile,
    _reason: ActivationReason,
  ) -> anyhow::Result<()> {
    let threshold = if profile == Profile::PowerSaver { "80" } else { "100" };
    fs::write(CHARGE_CONTROL_PATH, threshold)
  }
}
