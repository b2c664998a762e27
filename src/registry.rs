//! Back-end Registry & Probe Loop (C2): instantiates the known
//! back-ends in declared order, filters by blocklist, enforces
//! at-most-one CPU and one platform driver, and tracks deferred
//! drivers so a firmware-initiated `probe-request` can trigger a full
//! restart.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::backend::{self, Backend, BackendKind, BackendOps, DriverEvents, DriverOps};
use crate::profile::Profile;

#[derive(Debug, Clone, Default)]
pub struct BlockList {
  pub drivers: HashSet<String>,
  pub actions: HashSet<String>,
}

impl BlockList {
  pub fn blocks(&self, name: &str, kind: BackendKind) -> bool {
    match kind {
      BackendKind::Cpu | BackendKind::Platform => self.drivers.contains(name),
      BackendKind::Action => self.actions.contains(name),
    }
  }
}

pub struct ProbeResult {
  pub cpu: Option<Box<dyn DriverOps>>,
  pub platform: Option<Box<dyn DriverOps>>,
  pub actions: Vec<Box<dyn BackendOps>>,
  /// Drivers that returned `defer`, retained only so their
  /// `probe-request` callback stays wired; a later `probe-request`
  /// triggers a full restart rather than an in-place retry, so these
  /// are never bound into `cpu`/`platform`.
  pub deferred: Vec<Box<dyn DriverOps>>,
}

/// Runs the probe sequence once: instantiate each known back-end in
/// order, filter by blocklist, enforce slot exclusivity, and bind
/// whatever probes successfully. Does not itself enforce the
/// required-driver gate; the caller (start-up / restart orchestration)
/// does that once a `ProbeResult` is in hand so it can produce a
/// single, clearly-attributed `StartupFailure`.
pub async fn probe_all(
  blocklist: &BlockList,
  events: Arc<dyn DriverEvents>,
) -> ProbeResult {
  let mut result = ProbeResult {
    cpu: None,
    platform: None,
    actions: Vec::new(),
    deferred: Vec::new(),
  };

  for &(name, kind) in backend::known_backend_names() {
    if blocklist.blocks(name, kind) {
      info!("backend '{name}' dropped: blocklisted");
      continue;
    }

    match kind {
      BackendKind::Cpu if result.cpu.is_some() => {
        debug!("backend '{name}' dropped: CPU slot already bound");
        continue;
      },
      BackendKind::Platform if result.platform.is_some() => {
        debug!("backend '{name}' dropped: platform slot already bound");
        continue;
      },
      _ => {},
    }

    let Some(backend) = backend::construct(name) else {
      warn!("backend '{name}' not constructible (internal error)");
      continue;
    };

    match backend {
      Backend::Cpu(mut driver) | Backend::Platform(mut driver) => {
        if driver.supported_profiles().is_empty() {
          warn!("backend '{name}' dropped: declares no supported profiles");
          continue;
        }

        match driver.probe().await {
          Ok(backend::ProbeOutcome::Success) => {
            info!("driver '{name}' bound");
            driver.set_events(events.clone());
            if kind == BackendKind::Cpu {
              result.cpu = Some(driver);
            } else {
              result.platform = Some(driver);
            }
          },

          Ok(backend::ProbeOutcome::Defer) => {
            info!("driver '{name}' deferred, will retry on probe-request");
            driver.set_events(events.clone());
            result.deferred.push(driver);
          },

          Ok(backend::ProbeOutcome::Fail) => {
            debug!("driver '{name}' probe failed, dropping");
          },

          Err(error) => {
            warn!("driver '{name}' probe errored: {error:#}");
          },
        }
      },

      Backend::Action(mut action) => match action.probe().await {
        Ok(backend::ProbeOutcome::Success) => {
          info!("action '{name}' bound");
          result.actions.push(action);
        },

        Ok(backend::ProbeOutcome::Defer) => {
          warn!("action '{name}' returned defer, which only applies to drivers; dropping");
        },

        Ok(backend::ProbeOutcome::Fail) => {
          debug!("action '{name}' probe failed, dropping");
        },

        Err(error) => {
          warn!("action '{name}' probe errored: {error:#}");
        },
      },
    }
  }

  result
}

/// Required-driver gate: at least one of `{cpu, platform}` must be
/// bound and their combined `supported-profiles` must cover
/// `{balanced, power-saver}`.
pub fn has_required_drivers(result: &ProbeResult) -> bool {
  let cpu_profiles = result
    .cpu
    .as_ref()
    .map(|d| d.supported_profiles())
    .unwrap_or_default();
  let platform_profiles = result
    .platform
    .as_ref()
    .map(|d| d.supported_profiles())
    .unwrap_or_default();

  let union = cpu_profiles | platform_profiles;

  (result.cpu.is_some() || result.platform.is_some())
    && union.contains(Profile::Balanced)
    && union.contains(Profile::PowerSaver)
}
