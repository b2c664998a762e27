//! Hold Registry (C4): active profile holds keyed by an opaque cookie,
//! one per requesting peer's bus identity. Cookie allocation is a
//! monotonic counter decoupled from whatever subscription identifier
//! the bus library's peer-liveness watch uses; the bus layer is
//! responsible for keeping its own watch handle alongside the cookie
//! it was issued for.

use std::collections::HashMap;
use std::time::Instant;

use crate::profile::{Hold, HoldInterface, Profile};

#[derive(Default)]
pub struct HoldRegistry {
  holds: HashMap<u32, Hold>,
  next_cookie: u32,
}

impl HoldRegistry {
  pub fn new() -> Self {
    Self {
      holds: HashMap::new(),
      next_cookie: 1,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.holds.is_empty()
  }

  pub fn get(&self, cookie: u32) -> Option<&Hold> {
    self.holds.get(&cookie)
  }

  /// Adds a hold, returning the newly allocated cookie. Collision with
  /// an existing cookie is avoided by a wrapping-counter search that
  /// skips occupied slots rather than failing outright.
  pub fn add(
    &mut self,
    profile: Profile,
    reason: String,
    application_id: String,
    requester_peer: String,
    requester_interface: HoldInterface,
  ) -> u32 {
    let mut cookie = self.next_cookie;
    while self.holds.contains_key(&cookie) {
      cookie = cookie.wrapping_add(1);
      if cookie == 0 {
        cookie = 1;
      }
    }

    self.next_cookie = cookie.wrapping_add(1);
    if self.next_cookie == 0 {
      self.next_cookie = 1;
    }

    self.holds.insert(
      cookie,
      Hold {
        cookie,
        profile,
        reason,
        application_id,
        requester_peer,
        requester_interface,
        created_at: Instant::now(),
      },
    );

    cookie
  }

  pub fn release(&mut self, cookie: u32) -> Option<Hold> {
    self.holds.remove(&cookie)
  }

  /// Cookies whose hold was created by `peer`, for peer-disappearance
  /// cleanup. Collected up front rather than released in place, since
  /// releasing while iterating would mutate the map out from under the
  /// iterator.
  pub fn cookies_for_peer(&self, peer: &str) -> Vec<u32> {
    self
      .holds
      .values()
      .filter(|hold| hold.requester_peer == peer)
      .map(|hold| hold.cookie)
      .collect()
  }

  /// Releases every hold, returning them for per-hold notification.
  /// Used by user-initiated release-all and by full teardown, where the
  /// caller chooses whether to notify.
  pub fn release_all(&mut self) -> Vec<Hold> {
    let holds = self.holds.drain().map(|(_, hold)| hold).collect();
    holds
  }

  /// The effective hold profile across the current hold set: if any
  /// hold requests `power-saver`, that dominates unconditionally;
  /// otherwise it is the profile of any one hold, since every
  /// non-power-saver hold requests `performance` (balanced is never a
  /// hold target). `None` when the hold set is empty ("unset").
  pub fn effective_profile(&self) -> Option<Profile> {
    if self.holds.values().any(|h| h.profile == Profile::PowerSaver) {
      return Some(Profile::PowerSaver);
    }

    self.holds.values().next().map(|h| h.profile)
  }

  pub fn snapshot(&self) -> Vec<Hold> {
    let mut holds: Vec<_> = self.holds.values().cloned().collect();
    holds.sort_by_key(|h| h.cookie);
    holds
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn add(registry: &mut HoldRegistry, profile: Profile, peer: &str) -> u32 {
    registry.add(
      profile,
      "test".into(),
      "app".into(),
      peer.into(),
      HoldInterface::Modern,
    )
  }

  #[test]
  fn power_saver_dominates_regardless_of_insertion_order() {
    let mut registry = HoldRegistry::new();
    add(&mut registry, Profile::Performance, ":1.1");
    add(&mut registry, Profile::PowerSaver, ":1.2");

    assert_eq!(registry.effective_profile(), Some(Profile::PowerSaver));
  }

  #[test]
  fn empty_registry_has_no_effective_profile() {
    let registry = HoldRegistry::new();
    assert_eq!(registry.effective_profile(), None);
  }

  #[test]
  fn cookies_are_unique_even_after_release() {
    let mut registry = HoldRegistry::new();
    let first = add(&mut registry, Profile::Performance, ":1.1");
    registry.release(first);
    let second = add(&mut registry, Profile::Performance, ":1.2");

    assert_ne!(first, second);
  }

  #[test]
  fn cookies_for_peer_finds_only_that_peers_holds() {
    let mut registry = HoldRegistry::new();
    let a1 = add(&mut registry, Profile::Performance, ":1.1");
    let _b1 = add(&mut registry, Profile::PowerSaver, ":1.2");
    let a2 = add(&mut registry, Profile::Performance, ":1.1");

    let mut cookies = registry.cookies_for_peer(":1.1");
    cookies.sort();
    assert_eq!(cookies, vec![a1, a2]);
  }

  proptest::proptest! {
    /// Whatever sequence of adds/releases the caller issues, every
    /// cookie handed back while live is unique among the holds
    /// currently present.
    #[test]
    fn cookies_are_always_unique_while_live(
      ops in proptest::collection::vec(
        (proptest::bool::ANY, 0usize..8),
        0..64,
      ),
    ) {
      let mut registry = HoldRegistry::new();
      let mut live: Vec<u32> = Vec::new();

      for (should_add, release_index) in ops {
        if should_add || live.is_empty() {
          let cookie = add(&mut registry, Profile::Performance, ":1.1");
          proptest::prop_assert!(!live.contains(&cookie));
          live.push(cookie);
        } else {
          let index = release_index % live.len();
          let cookie = live.remove(index);
          proptest::prop_assert!(registry.release(cookie).is_some());
        }
      }

      let mut snapshot_cookies: Vec<u32> =
        registry.snapshot().iter().map(|h| h.cookie).collect();
      snapshot_cookies.sort_unstable();
      live.sort_unstable();
      proptest::prop_assert_eq!(snapshot_cookies, live);
    }
  }
}
