//! Profile Arbitration Engine (C3): computes the target profile from
//! {user selection, hold stack, internal firmware notification, reset}
//! and applies it transactionally across the bound CPU driver, platform
//! driver, and actions.
//!
//! `Engine` owns no D-Bus state and performs no I/O beyond the
//! back-ends it holds and the persisted state file; callers (the D-Bus
//! handlers in `dbus/`, the event loop in `daemon.rs`) translate its
//! `ActivationOutcome` into property-changed emissions and
//! `ProfileReleased` signals. This separation is what lets the core
//! invariants be exercised directly in unit tests without a live bus
//! connection.

use std::path::PathBuf;

use crate::backend::{BackendOps, DriverOps};
use crate::error::{BackendKind, CoreError};
use crate::hold::HoldRegistry;
use crate::profile::{
  ActivationReason,
  Hold,
  HoldInterface,
  Profile,
  PowerSource,
  ProfileSet,
};
use crate::registry::ProbeResult;
use crate::state_file::{self, PersistedState};

/// Which published fields changed as a result of one engine call. The
/// caller uses this to decide which `PropertiesChanged` members (and
/// whether `ActiveProfileHolds`) to emit: exactly the fields that
/// changed, nothing more.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet {
  pub active_profile: bool,
  pub degraded: bool,
  pub holds: bool,
  /// Set only by [`Engine::initial_activation`]: the bound driver set
  /// itself is now known, so `Profiles`/`Actions`/`Version` are worth
  /// announcing too (clients that connect after start-up just read the
  /// properties; this is for the rare case a client is already
  /// watching before `probe_all` finishes).
  pub profiles: bool,
}

impl ChangeSet {
  pub fn any(&self) -> bool {
    self.active_profile || self.degraded || self.holds || self.profiles
  }

  fn merge(&mut self, other: ChangeSet) {
    self.active_profile |= other.active_profile;
    self.degraded |= other.degraded;
    self.holds |= other.holds;
    self.profiles |= other.profiles;
  }
}

/// A `ProfileReleased` delivery the caller owes to one hold's original
/// requester, addressed at the interface/path pair the hold was
/// created through.
#[derive(Debug, Clone)]
pub struct ReleaseNotification {
  pub cookie: u32,
  pub peer: String,
  pub interface: HoldInterface,
}

impl From<Hold> for ReleaseNotification {
  fn from(hold: Hold) -> Self {
    Self {
      cookie: hold.cookie,
      peer: hold.requester_peer,
      interface: hold.requester_interface,
    }
  }
}

/// The result of any engine call that can mutate state. `result` is
/// `Err` only for a backend failure during the transactional
/// activation (a `CoreError::BackendFailure`); validation failures that
/// happen before any mutation (invalid/unavailable profile, unknown
/// cookie) are returned directly as `Err` from the call itself, since
/// in that case there is nothing to report a `ChangeSet` for.
#[derive(Debug)]
pub struct ActivationOutcome {
  pub result: Result<(), CoreError>,
  pub changes: ChangeSet,
  pub releases: Vec<ReleaseNotification>,
}

impl ActivationOutcome {
  fn merge(&mut self, other: ActivationOutcome) {
    if self.result.is_ok() {
      self.result = other.result;
    }
    self.changes.merge(other.changes);
    self.releases.extend(other.releases);
  }
}

pub struct Engine {
  cpu: Option<Box<dyn DriverOps>>,
  platform: Option<Box<dyn DriverOps>>,
  actions: Vec<Box<dyn BackendOps>>,

  holds: HoldRegistry,

  active_profile: Profile,
  selected_profile: Profile,

  state_path: PathBuf,
}

impl Engine {
  /// Builds the engine from a finished probe pass, enforcing the
  /// required-driver gate. `active_profile`/`selected_profile`
  /// both default to `Balanced`; call [`Engine::apply_configuration`]
  /// and then [`Engine::initial_activation`] to bring them (and the
  /// bound back-ends) in line with persisted state.
  pub fn new(
    probe: ProbeResult,
    state_path: PathBuf,
  ) -> Result<Self, CoreError> {
    if !crate::registry::has_required_drivers(&probe) {
      return Err(CoreError::StartupFailure(
        "no driver binds that covers both 'balanced' and 'power-saver'"
          .to_owned(),
      ));
    }

    Ok(Self {
      cpu: probe.cpu,
      platform: probe.platform,
      actions: probe.actions,
      holds: HoldRegistry::new(),
      active_profile: Profile::Balanced,
      selected_profile: Profile::Balanced,
      state_path,
    })
  }

  fn union_supported(&self) -> ProfileSet {
    self.cpu.as_ref().map(|d| d.supported_profiles()).unwrap_or_default()
      | self
        .platform
        .as_ref()
        .map(|d| d.supported_profiles())
        .unwrap_or_default()
  }

  pub fn active_profile(&self) -> Profile {
    self.active_profile
  }

  pub fn selected_profile(&self) -> Profile {
    self.selected_profile
  }

  pub fn degraded_reason(&self) -> String {
    [
      self.cpu.as_ref().and_then(|d| d.performance_degraded()),
      self.platform.as_ref().and_then(|d| d.performance_degraded()),
    ]
    .into_iter()
    .flatten()
    .filter(|reason| !reason.is_empty())
    .collect::<Vec<_>>()
    .join(",")
  }

  pub fn action_names(&self) -> Vec<String> {
    self.actions.iter().map(|a| a.name().to_owned()).collect()
  }

  pub fn holds(&self) -> Vec<Hold> {
    self.holds.snapshot()
  }

  /// One entry per profile supported by at least one bound driver, with
  /// the `CpuDriver`/`PlatformDriver`/compatibility-`Driver` keys the
  /// `Profiles` bus property exposes.
  pub fn profile_entries(&self) -> Vec<ProfileEntry> {
    Profile::all()
      .into_iter()
      .filter_map(|profile| {
        let cpu_name = self
          .cpu
          .as_ref()
          .filter(|d| d.supported_profiles().contains(profile))
          .map(|d| d.name());
        let platform_name = self
          .platform
          .as_ref()
          .filter(|d| d.supported_profiles().contains(profile))
          .map(|d| d.name());

        if cpu_name.is_none() && platform_name.is_none() {
          return None;
        }

        let driver = match (cpu_name, platform_name) {
          (Some(_), Some(_)) => "multiple",
          (Some(name), None) | (None, Some(name)) => name,
          (None, None) => unreachable!(),
        };

        Some(ProfileEntry {
          profile,
          cpu_driver: cpu_name.map(str::to_owned),
          platform_driver: platform_name.map(str::to_owned),
          driver: driver.to_owned(),
        })
      })
      .collect()
  }

  /// Applies the apply-configuration rule: persisted state is honored
  /// only if the driver names it was recorded against match what
  /// actually bound this run, preventing a stale `performance` setting
  /// from a different machine configuration from sticking.
  pub fn apply_configuration(&mut self) {
    let persisted = match state_file::load(&self.state_path) {
      Ok(state) => state,
      Err(error) => {
        log::debug!(
          "failed to read persisted state from '{path}': {error:#}",
          path = self.state_path.display(),
        );
        PersistedState::default()
      },
    };

    let cpu_matches = match &persisted.cpu_driver {
      Some(name) => self.cpu.as_ref().is_some_and(|d| d.name() == name),
      None => true,
    };
    let platform_matches = match &persisted.platform_driver {
      Some(name) => self.platform.as_ref().is_some_and(|d| d.name() == name),
      None => true,
    };

    if !cpu_matches || !platform_matches {
      log::info!(
        "persisted state was recorded against a different driver set, \
         discarding it"
      );
      return;
    }

    if persisted.profile_present && persisted.profile.is_none() {
      log::debug!("persisted profile value was unparseable, erasing it");
      let corrected = PersistedState {
        cpu_driver: persisted.cpu_driver,
        platform_driver: persisted.platform_driver,
        profile: None,
        profile_present: false,
      };
      if let Err(error) = state_file::save(&self.state_path, &corrected) {
        log::warn!(
          "failed to erase unparseable persisted profile in '{path}': \
           {error:#}",
          path = self.state_path.display(),
        );
      }
      return;
    }

    if let Some(profile) = persisted.profile {
      if self.union_supported().contains(profile) {
        self.active_profile = profile;
        self.selected_profile = profile;
      }
    }
  }

  fn persist(&self) {
    let state = PersistedState {
      cpu_driver: self.cpu.as_ref().map(|d| d.name().to_owned()),
      platform_driver: self.platform.as_ref().map(|d| d.name().to_owned()),
      profile: Some(self.active_profile),
      profile_present: true,
    };

    if let Err(error) = state_file::save(&self.state_path, &state) {
      log::warn!(
        "failed to persist state to '{path}': {error:#}",
        path = self.state_path.display(),
      );
    }
  }

  /// The transactional activation: CPU first (abort on failure), then
  /// platform (roll the CPU driver back to its previous profile on
  /// failure), then every action best-effort.
  /// `force` bypasses the "already at this profile" short-circuit and
  /// is used only by [`Engine::initial_activation`], where back-ends
  /// that have never been told a profile need their first call even
  /// though `active_profile` already reflects the intended target.
  async fn activate_impl(
    &mut self,
    target: Profile,
    reason: ActivationReason,
    force: bool,
  ) -> Result<bool, CoreError> {
    let previous = self.active_profile;

    if !force && previous == target {
      if reason.persists() {
        self.persist();
      }
      return Ok(false);
    }

    let mut cpu_called = false;

    if let Some(cpu) = self.cpu.as_mut() {
      if cpu.supported_profiles().contains(target) {
        cpu_called = true;
        cpu.activate_profile(target, reason).await.map_err(|source| {
          CoreError::BackendFailure {
            kind: BackendKind::Driver,
            name: cpu.name().to_owned(),
            source,
          }
        })?;
      }
    }

    if let Some(platform) = self.platform.as_mut() {
      if platform.supported_profiles().contains(target) {
        if let Err(source) = platform.activate_profile(target, reason).await {
          if cpu_called {
            if let Some(cpu) = self.cpu.as_mut() {
              if let Err(rollback_error) =
                cpu.activate_profile(previous, ActivationReason::Internal).await
              {
                log::warn!(
                  "rollback of CPU driver '{name}' to '{previous}' also \
                   failed: {rollback_error:#}",
                  name = cpu.name(),
                );
              }
            }
          }

          return Err(CoreError::BackendFailure {
            kind: BackendKind::Driver,
            name: platform.name().to_owned(),
            source,
          });
        }
      }
    }

    for action in self.actions.iter_mut() {
      if let Err(error) = action.activate_profile(target, reason).await {
        log::warn!(
          "action '{name}' failed to activate profile '{target}': {error:#}",
          name = action.name(),
        );
      }
    }

    self.active_profile = target;
    if reason.persists() {
      self.persist();
    }

    Ok(true)
  }

  async fn activate(
    &mut self,
    target: Profile,
    reason: ActivationReason,
  ) -> Result<bool, CoreError> {
    self.activate_impl(target, reason, false).await
  }

  fn changes_from(&self, previous_active: Profile, holds_changed: bool) -> ChangeSet {
    let active_changed = self.active_profile != previous_active;
    ChangeSet {
      active_profile: active_changed,
      degraded: active_changed,
      holds: holds_changed,
      profiles: false,
    }
  }

  /// Reset-reason activation run once at start-up (and after every
  /// restart), after [`Engine::apply_configuration`] has decided the
  /// initial `active_profile`. Forces every bound back-end to observe
  /// an `activate_profile` call even though the target may equal the
  /// default `Balanced` it was already constructed with.
  pub async fn initial_activation(&mut self) -> ActivationOutcome {
    let target = self.active_profile;
    let result = self
      .activate_impl(target, ActivationReason::Reset, true)
      .await
      .map(|_| ());

    ActivationOutcome {
      result,
      changes: ChangeSet {
        active_profile: true,
        degraded: true,
        holds: false,
        profiles: true,
      },
      releases: Vec::new(),
    }
  }

  /// Client `SetProperty(ActiveProfile, target)` / `org.fdo.UPower
  /// .PowerProfiles` equivalent. Releases every hold (with
  /// notification) before activating, so peers observe their release
  /// before the new profile takes effect.
  pub async fn user_set(
    &mut self,
    target: Profile,
  ) -> Result<ActivationOutcome, CoreError> {
    if !self.union_supported().contains(target) {
      return Err(CoreError::Unavailable(target.as_str().to_owned()));
    }

    let previous_active = self.active_profile;

    let released = self.holds.release_all();
    let holds_changed = !released.is_empty();

    self.selected_profile = target;

    let result = self.activate(target, ActivationReason::User).await.map(|_| ());

    Ok(ActivationOutcome {
      result,
      changes: self.changes_from(previous_active, holds_changed),
      releases: released.into_iter().map(ReleaseNotification::from).collect(),
    })
  }

  /// `HoldProfile`. Rejects `balanced` and unsupported profiles before
  /// any mutation; the caller is expected to have already rejected
  /// unknown profile names and missing authorization.
  pub async fn hold_add(
    &mut self,
    profile: Profile,
    reason: String,
    application_id: String,
    requester_peer: String,
    requester_interface: HoldInterface,
  ) -> Result<(u32, ActivationOutcome), CoreError> {
    if profile == Profile::Balanced {
      return Err(CoreError::InvalidArgs(
        "balanced cannot be held, only power-saver and performance can"
          .to_owned(),
      ));
    }

    if !self.union_supported().contains(profile) {
      return Err(CoreError::Unavailable(profile.as_str().to_owned()));
    }

    let cookie = self.holds.add(
      profile,
      reason,
      application_id,
      requester_peer,
      requester_interface,
    );

    let previous_active = self.active_profile;
    let target = self.holds.effective_profile().unwrap_or(self.selected_profile);

    let result = if target != self.active_profile {
      self.activate(target, ActivationReason::ProgramHold).await.map(|_| ())
    } else {
      Ok(())
    };

    Ok((
      cookie,
      ActivationOutcome {
        result,
        changes: self.changes_from(previous_active, true),
        releases: Vec::new(),
      },
    ))
  }

  /// `ReleaseProfile`. If the released hold was the effective one,
  /// recompute and re-activate; otherwise no activation is needed.
  pub async fn hold_release(
    &mut self,
    cookie: u32,
  ) -> Result<ActivationOutcome, CoreError> {
    let Some(released) = self.holds.release(cookie) else {
      return Err(CoreError::InvalidArgs(format!("unknown cookie {cookie}")));
    };

    let previous_active = self.active_profile;

    let target = if self.holds.is_empty() {
      self.selected_profile
    } else if released.profile == self.active_profile {
      self.holds.effective_profile().unwrap_or(self.selected_profile)
    } else {
      self.active_profile
    };

    let result = if target != self.active_profile {
      self.activate(target, ActivationReason::ProgramHold).await.map(|_| ())
    } else {
      Ok(())
    };

    Ok(ActivationOutcome {
      result,
      changes: self.changes_from(previous_active, true),
      releases: vec![ReleaseNotification::from(released)],
    })
  }

  /// Releases every hold owned by `peer`, collecting cookies first
  /// since releasing mutates the map. `None` if the peer held nothing.
  pub async fn peer_gone(&mut self, peer: &str) -> Option<ActivationOutcome> {
    let cookies = self.holds.cookies_for_peer(peer);
    if cookies.is_empty() {
      return None;
    }

    let mut combined = ActivationOutcome {
      result: Ok(()),
      changes: ChangeSet::default(),
      releases: Vec::new(),
    };

    for cookie in cookies {
      if let Ok(outcome) = self.hold_release(cookie).await {
        combined.merge(outcome);
      }
    }

    Some(combined)
  }

  /// A driver reported a firmware-initiated `profile-changed` event
  /// (C1's `profile-changed` signal). Activates the reported profile
  /// with reason `internal`, which per invariant 3 never touches
  /// `selected_profile`.
  pub async fn driver_reported_profile(
    &mut self,
    profile: Profile,
  ) -> ActivationOutcome {
    let previous_active = self.active_profile;
    let result =
      self.activate(profile, ActivationReason::Internal).await.map(|_| ());

    ActivationOutcome {
      result,
      changes: self.changes_from(previous_active, false),
      releases: Vec::new(),
    }
  }

  /// Forwards a power-source change to every bound back-end that
  /// declares the capability. This must never itself change the
  /// active profile.
  pub async fn power_changed(&mut self, source: PowerSource) {
    if let Some(cpu) = self.cpu.as_mut() {
      if cpu.capabilities().power_changed {
        if let Err(error) = cpu.power_changed(source).await {
          log::warn!(
            "driver '{name}' failed handling power-source change: {error:#}",
            name = cpu.name(),
          );
        }
      }
    }

    if let Some(platform) = self.platform.as_mut() {
      if platform.capabilities().power_changed {
        if let Err(error) = platform.power_changed(source).await {
          log::warn!(
            "driver '{name}' failed handling power-source change: {error:#}",
            name = platform.name(),
          );
        }
      }
    }

    for action in self.actions.iter_mut() {
      if action.capabilities().power_changed {
        if let Err(error) = action.power_changed(source).await {
          log::warn!(
            "action '{name}' failed handling power-source change: {error:#}",
            name = action.name(),
          );
        }
      }
    }
  }

  pub async fn battery_changed(&mut self, level: f64) {
    if let Some(cpu) = self.cpu.as_mut() {
      if cpu.capabilities().battery_changed {
        if let Err(error) = cpu.battery_changed(level).await {
          log::warn!(
            "driver '{name}' failed handling battery-level change: {error:#}",
            name = cpu.name(),
          );
        }
      }
    }

    if let Some(platform) = self.platform.as_mut() {
      if platform.capabilities().battery_changed {
        if let Err(error) = platform.battery_changed(level).await {
          log::warn!(
            "driver '{name}' failed handling battery-level change: {error:#}",
            name = platform.name(),
          );
        }
      }
    }

    for action in self.actions.iter_mut() {
      if action.capabilities().battery_changed {
        if let Err(error) = action.battery_changed(level).await {
          log::warn!(
            "action '{name}' failed handling battery-level change: {error:#}",
            name = action.name(),
          );
        }
      }
    }
  }

  /// Resume-from-sleep re-assertion: only called on the resume edge,
  /// and only drivers implement `prepare_to_sleep`.
  pub async fn prepare_to_sleep(&mut self, entering: bool) {
    if let Some(cpu) = self.cpu.as_mut() {
      if let Err(error) = cpu.prepare_to_sleep(entering).await {
        log::warn!(
          "driver '{name}' failed in prepare-to-sleep: {error:#}",
          name = cpu.name(),
        );
      }
    }

    if let Some(platform) = self.platform.as_mut() {
      if let Err(error) = platform.prepare_to_sleep(entering).await {
        log::warn!(
          "driver '{name}' failed in prepare-to-sleep: {error:#}",
          name = platform.name(),
        );
      }
    }
  }

  pub fn needs_power_source(&self) -> bool {
    self.cpu.as_ref().is_some_and(|d| d.capabilities().power_changed)
      || self.platform.as_ref().is_some_and(|d| d.capabilities().power_changed)
      || self.actions.iter().any(|a| a.capabilities().power_changed)
  }

  pub fn needs_battery_level(&self) -> bool {
    self.cpu.as_ref().is_some_and(|d| d.capabilities().battery_changed)
      || self
        .platform
        .as_ref()
        .is_some_and(|d| d.capabilities().battery_changed)
      || self.actions.iter().any(|a| a.capabilities().battery_changed)
  }

  pub fn needs_suspend(&self) -> bool {
    self.cpu.as_ref().is_some_and(|d| d.capabilities().prepare_to_sleep)
      || self
        .platform
        .as_ref()
        .is_some_and(|d| d.capabilities().prepare_to_sleep)
  }

  /// Full teardown: holds are dropped silently, no `ProfileReleased`
  /// is emitted (the daemon is going away; peers observe
  /// bus-disconnect instead).
  pub fn teardown(&mut self) {
    self.holds.release_all();
    self.cpu = None;
    self.platform = None;
    self.actions.clear();
  }
}

#[derive(Debug, Clone)]
pub struct ProfileEntry {
  pub profile: Profile,
  pub cpu_driver: Option<String>,
  pub platform_driver: Option<String>,
  pub driver: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::{
    BackendOps,
    Capabilities,
    DriverOps,
    ProbeOutcome,
  };
  use crate::profile::ActivationReason;

  /// A test-only driver recording every `activate_profile` call it
  /// observes, so the transactional-activation and rollback invariants
  /// can be checked directly.
  struct RecordingDriver {
    name: &'static str,
    supported: ProfileSet,
    calls: Vec<(Profile, ActivationReason)>,
    fail_on: Option<Profile>,
  }

  impl RecordingDriver {
    fn new(name: &'static str, supported: ProfileSet) -> Self {
      Self { name, supported, calls: Vec::new(), fail_on: None }
    }
  }

  #[async_trait::async_trait]
  impl BackendOps for RecordingDriver {
    fn name(&self) -> &'static str {
      self.name
    }

    fn capabilities(&self) -> Capabilities {
      Capabilities::default()
    }

    async fn probe(&mut self) -> anyhow::Result<ProbeOutcome> {
      Ok(ProbeOutcome::Success)
    }

    async fn activate_profile(
      &mut self,
      profile: Profile,
      reason: ActivationReason,
    ) -> anyhow::Result<()> {
      if self.fail_on == Some(profile) {
        anyhow::bail!("simulated failure activating {profile}");
      }
      self.calls.push((profile, reason));
      Ok(())
    }
  }

  impl DriverOps for RecordingDriver {
    fn supported_profiles(&self) -> ProfileSet {
      self.supported
    }
  }

  fn engine_with(
    cpu: RecordingDriver,
    platform: Option<RecordingDriver>,
  ) -> Engine {
    Engine {
      cpu: Some(Box::new(cpu)),
      platform: platform.map(|p| Box::new(p) as Box<dyn DriverOps>),
      actions: Vec::new(),
      holds: HoldRegistry::new(),
      active_profile: Profile::Balanced,
      selected_profile: Profile::Balanced,
      state_path: std::env::temp_dir().join("powerprofilesd-test-state.ini"),
    }
  }

  fn all_profiles() -> ProfileSet {
    Profile::all().into_iter().collect()
  }

  #[tokio::test]
  async fn user_set_drives_cpu_driver() {
    let mut engine =
      engine_with(RecordingDriver::new("cpu", all_profiles()), None);

    let outcome = engine.user_set(Profile::Performance).await.unwrap();
    assert!(outcome.result.is_ok());
    assert!(outcome.changes.active_profile);
    assert_eq!(engine.active_profile(), Profile::Performance);
    assert_eq!(engine.selected_profile(), Profile::Performance);
  }

  #[tokio::test]
  async fn platform_failure_rolls_back_cpu() {
    let mut platform = RecordingDriver::new("platform", all_profiles());
    platform.fail_on = Some(Profile::Performance);

    let mut engine =
      engine_with(RecordingDriver::new("cpu", all_profiles()), Some(platform));

    let outcome = engine.user_set(Profile::Performance).await.unwrap();
    assert!(outcome.result.is_err());
    // Active profile must not have moved.
    assert_eq!(engine.active_profile(), Profile::Balanced);
  }

  #[tokio::test]
  async fn hold_then_release_returns_to_selected() {
    let mut engine =
      engine_with(RecordingDriver::new("cpu", all_profiles()), None);

    let (cookie, outcome) = engine
      .hold_add(
        Profile::Performance,
        "video".into(),
        "vlc".into(),
        ":1.1".into(),
        HoldInterface::Modern,
      )
      .await
      .unwrap();
    assert!(outcome.result.is_ok());
    assert_eq!(engine.active_profile(), Profile::Performance);

    let outcome = engine.hold_release(cookie).await.unwrap();
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.releases.len(), 1);
    assert_eq!(engine.active_profile(), Profile::Balanced);
  }

  #[tokio::test]
  async fn power_saver_hold_dominates_performance_hold() {
    let mut engine =
      engine_with(RecordingDriver::new("cpu", all_profiles()), None);

    let (performance_cookie, _) = engine
      .hold_add(
        Profile::Performance,
        "r".into(),
        "a".into(),
        ":1.1".into(),
        HoldInterface::Modern,
      )
      .await
      .unwrap();
    let (power_saver_cookie, _) = engine
      .hold_add(
        Profile::PowerSaver,
        "r".into(),
        "b".into(),
        ":1.2".into(),
        HoldInterface::Modern,
      )
      .await
      .unwrap();

    assert_eq!(engine.active_profile(), Profile::PowerSaver);

    engine.hold_release(power_saver_cookie).await.unwrap();
    assert_eq!(engine.active_profile(), Profile::Performance);

    engine.hold_release(performance_cookie).await.unwrap();
    assert_eq!(engine.active_profile(), Profile::Balanced);
  }

  #[tokio::test]
  async fn user_set_releases_all_holds_with_notification() {
    let mut engine =
      engine_with(RecordingDriver::new("cpu", all_profiles()), None);

    engine
      .hold_add(
        Profile::Performance,
        "r".into(),
        "a".into(),
        ":1.1".into(),
        HoldInterface::Modern,
      )
      .await
      .unwrap();

    let outcome = engine.user_set(Profile::PowerSaver).await.unwrap();
    assert_eq!(outcome.releases.len(), 1);
    assert!(engine.holds().is_empty());
    assert_eq!(engine.selected_profile(), Profile::PowerSaver);
  }

  #[tokio::test]
  async fn idempotent_set_reports_no_change() {
    let mut engine =
      engine_with(RecordingDriver::new("cpu", all_profiles()), None);

    let outcome = engine.user_set(Profile::Balanced).await.unwrap();
    assert!(!outcome.changes.any());
  }

  #[tokio::test]
  async fn hold_of_balanced_is_rejected() {
    let mut engine =
      engine_with(RecordingDriver::new("cpu", all_profiles()), None);

    let error = engine
      .hold_add(
        Profile::Balanced,
        "r".into(),
        "a".into(),
        ":1.1".into(),
        HoldInterface::Modern,
      )
      .await
      .unwrap_err();

    assert!(matches!(error, CoreError::InvalidArgs(_)));
  }

  #[tokio::test]
  async fn hold_of_unsupported_profile_is_unavailable() {
    let mut engine = engine_with(
      RecordingDriver::new("cpu", Profile::Balanced.bit() | Profile::PowerSaver.bit()),
      None,
    );

    let error = engine
      .hold_add(
        Profile::Performance,
        "r".into(),
        "a".into(),
        ":1.1".into(),
        HoldInterface::Modern,
      )
      .await
      .unwrap_err();

    assert!(matches!(error, CoreError::Unavailable(_)));
  }

  #[tokio::test]
  async fn peer_gone_releases_only_that_peers_holds() {
    let mut engine =
      engine_with(RecordingDriver::new("cpu", all_profiles()), None);

    engine
      .hold_add(
        Profile::Performance,
        "r".into(),
        "a".into(),
        ":1.1".into(),
        HoldInterface::Modern,
      )
      .await
      .unwrap();
    engine
      .hold_add(
        Profile::PowerSaver,
        "r".into(),
        "b".into(),
        ":1.2".into(),
        HoldInterface::Modern,
      )
      .await
      .unwrap();

    let outcome = engine.peer_gone(":1.1").await.unwrap();
    assert_eq!(outcome.releases.len(), 1);
    assert_eq!(engine.holds().len(), 1);
  }
}
