use std::time::Instant;

/// A finite tagged power profile, plus the `Unset` sentinel meaning "no
/// current target" (used only internally, e.g. before a driver has
/// reported an effective hold profile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
  PowerSaver,
  Balanced,
  Performance,
}

impl Profile {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::PowerSaver => "power-saver",
      Self::Balanced => "balanced",
      Self::Performance => "performance",
    }
  }

  pub fn from_str(value: &str) -> Option<Self> {
    match value {
      "power-saver" => Some(Self::PowerSaver),
      "balanced" => Some(Self::Balanced),
      "performance" => Some(Self::Performance),
      _ => None,
    }
  }

  pub fn all() -> [Self; 3] {
    [Self::PowerSaver, Self::Balanced, Self::Performance]
  }

  pub fn bit(&self) -> ProfileSet {
    match self {
      Self::PowerSaver => ProfileSet(0b001),
      Self::Balanced => ProfileSet(0b010),
      Self::Performance => ProfileSet(0b100),
    }
  }
}

impl std::fmt::Display for Profile {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// A bitmask-compatible subset of the three profiles, used to declare
/// what a given driver supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileSet(u8);

impl ProfileSet {
  pub const EMPTY: Self = Self(0);

  pub fn contains(&self, profile: Profile) -> bool {
    self.0 & profile.bit().0 != 0
  }

  pub fn is_empty(&self) -> bool {
    self.0 == 0
  }

  pub fn union(&self, other: Self) -> Self {
    Self(self.0 | other.0)
  }
}

impl std::ops::BitOr for ProfileSet {
  type Output = Self;

  fn bitor(self, rhs: Self) -> Self {
    self.union(rhs)
  }
}

impl FromIterator<Profile> for ProfileSet {
  fn from_iter<T: IntoIterator<Item = Profile>>(iter: T) -> Self {
    iter.into_iter().fold(Self::EMPTY, |acc, p| acc | p.bit())
  }
}

/// Why an activation is happening; controls whether `selected_profile`
/// and the persisted state file are updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationReason {
  /// An explicit client `SetProperty(ActiveProfile, ...)` call.
  User,
  /// A driver firmware notification or a hold-driven re-activation.
  Internal,
  /// Start-up, recomputing `active_profile` from persisted state.
  Reset,
  /// Resume-from-sleep re-assertion.
  Resume,
  /// A transactional activation driven by the hold registry.
  ProgramHold,
}

impl ActivationReason {
  /// Whether this reason is allowed to update the persisted state
  /// file.
  pub fn persists(&self) -> bool {
    matches!(self, Self::User | Self::Internal)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::User => "user-action",
      Self::Internal => "internal",
      Self::Reset => "reset",
      Self::Resume => "resuming",
      Self::ProgramHold => "program-holds",
    }
  }
}

/// The system's AC/battery state, derived from upower's `OnBattery`
/// property. `Unknown` when upower is unreachable or not yet queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSource {
  Ac,
  Battery,
  Unknown,
}

/// A single active profile hold. The cookie doubles as the identifier
/// for the peer-liveness watch installed when the hold was created,
/// though the watch handle itself lives alongside the hold in
/// `hold::HoldRegistry` rather than being derived from the cookie, to
/// decouple cookie allocation from the bus library's identifier
/// scheme.
#[derive(Debug, Clone)]
pub struct Hold {
  pub cookie: u32,
  pub profile: Profile,
  pub reason: String,
  pub application_id: String,
  pub requester_peer: String,
  pub requester_interface: HoldInterface,
  pub created_at: Instant,
}

/// Which of the two concurrently-served interfaces a hold was created
/// through, so `ProfileReleased` can be emitted back on the same
/// interface/path pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldInterface {
  Modern,
  Legacy,
}

impl HoldInterface {
  pub fn object_path(&self) -> &'static str {
    match self {
      Self::Modern => "/org/freedesktop/UPower/PowerProfiles",
      Self::Legacy => "/net/hadess/PowerProfiles",
    }
  }

  pub fn interface_name(&self) -> &'static str {
    match self {
      Self::Modern => "org.freedesktop.UPower.PowerProfiles",
      Self::Legacy => "net.hadess.PowerProfiles",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_through_str() {
    for profile in Profile::all() {
      assert_eq!(Profile::from_str(profile.as_str()), Some(profile));
    }
  }

  #[test]
  fn unknown_name_parses_to_none() {
    assert_eq!(Profile::from_str("turbo"), None);
  }

  #[test]
  fn profile_set_union_contains_both_members() {
    let set = Profile::PowerSaver.bit() | Profile::Performance.bit();
    assert!(set.contains(Profile::PowerSaver));
    assert!(set.contains(Profile::Performance));
    assert!(!set.contains(Profile::Balanced));
  }

  #[test]
  fn only_user_and_internal_reasons_persist() {
    assert!(ActivationReason::User.persists());
    assert!(ActivationReason::Internal.persists());
    assert!(!ActivationReason::Reset.persists());
    assert!(!ActivationReason::Resume.persists());
    assert!(!ActivationReason::ProgramHold.persists());
  }
}
